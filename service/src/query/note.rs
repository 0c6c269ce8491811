//! [`Query`] collection related to a single [`Note`].

use common::operations::By;

use crate::domain::{note, Note};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Note`] by its [`note::Id`], bypassing any cache.
pub type ById = DatabaseQuery<By<Option<Note>, note::Id>>;
