//! In-memory [`Database`] implementation.

use std::{collections::HashMap, sync::Arc};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use parking_lot::RwLock;
use tracerr::Traced;

use crate::{
    domain::{note, user, Note, User},
    infra::{database, Database},
};

/// In-memory [`Database`].
///
/// Writes are applied immediately, so [`Transact`] and [`Commit`] are no-ops
/// and no isolation is provided. Intended for tests and local runs only.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored state, shared between clones.
    state: Arc<RwLock<State>>,
}

/// State of the [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored [`Note`]s.
    notes: HashMap<note::Id, Note>,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Written row violates the unique constraint with the given name.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |e| e == *c),
        }
    }
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state.write();
        if state.users.contains_key(&user.id) {
            return Err(tracerr::new!(Error::UniqueViolation("users_pkey")))
                .map_err(tracerr::map_from);
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(tracerr::new!(Error::UniqueViolation(
                "users_username_unique"
            )))
            .map_err(tracerr::map_from);
        }
        drop(state.users.insert(user.id, user));
        Ok(())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.read().users.get(by.as_inner()).cloned())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Username>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Username>>,
    ) -> Result<Self::Ok, Self::Err> {
        let username = by.into_inner();
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| &u.username == username)
            .cloned())
    }
}

impl Database<Insert<Note>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(note): Insert<Note>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state.write();
        if state.notes.contains_key(&note.id) {
            return Err(tracerr::new!(Error::UniqueViolation("notes_pkey")))
                .map_err(tracerr::map_from);
        }
        drop(state.notes.insert(note.id, note));
        Ok(())
    }
}

impl Database<Update<Note>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(note): Update<Note>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(stored) = self.state.write().notes.get_mut(&note.id) {
            stored.title = note.title;
            stored.content = note.content;
        }
        Ok(())
    }
}

impl Database<Delete<By<Note, note::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Note, note::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state.write().notes.remove(by.as_inner()));
        Ok(())
    }
}

impl Database<Lock<By<Note, note::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Note, note::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Select<By<Option<Note>, note::Id>>> for Memory {
    type Ok = Option<Note>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Note>, note::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.read().notes.get(by.as_inner()).cloned())
    }
}

impl Database<Select<By<Vec<Note>, user::Id>>> for Memory {
    type Ok = Vec<Note>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Note>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let owner_id = by.into_inner();

        let mut notes = self
            .state
            .read()
            .notes
            .values()
            .filter(|n| n.is_owned_by(owner_id))
            .cloned()
            .collect::<Vec<_>>();
        notes.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        Ok(notes)
    }
}
