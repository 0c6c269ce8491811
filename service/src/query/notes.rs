//! [`Query`] collection related to multiple [`Note`]s.

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::{user, Note},
    infra::{database, kv, Database, KeyValue},
    read::note::list::{self, List},
    Service,
};

use super::Query;

/// Queries all [`Note`]s owned by the [`User`] with the given ID.
///
/// The result is served from the cache whenever possible, and populates it
/// otherwise.
#[derive(Clone, Copy, Debug)]
pub struct ByOwner(pub user::Id);

impl<Db, Kv> Query<ByOwner> for Service<Db, Kv>
where
    Db: Database<
        Select<By<Vec<Note>, user::Id>>,
        Ok = Vec<Note>,
        Err = Traced<database::Error>,
    >,
    Kv: KeyValue<
            Select<By<Option<List>, kv::Key>>,
            Ok = Option<List>,
            Err = Traced<kv::Error>,
        > + KeyValue<Insert<kv::Expiring<List>>, Err = Traced<kv::Error>>,
{
    type Ok = List;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ByOwner(owner_id): ByOwner,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let key = list::cache_key(owner_id);

        let cached = self
            .cache()
            .execute(Select(By::<Option<List>, _>::new(key.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(notes) = cached {
            tracing::debug!(%owner_id, %key, "cache hit");
            return Ok(notes);
        }
        tracing::debug!(%owner_id, %key, "cache miss");

        let notes = self
            .database()
            .execute(Select(By::<Vec<Note>, _>::new(owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.cache()
            .execute(Insert(kv::Expiring {
                key,
                value: notes.clone(),
                ttl: self.config().notes_cache_ttl,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(notes)
    }
}

/// Error of [`ByOwner`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Cache error.
    #[display("Cache operation failed: {_0}")]
    #[from]
    Cache(kv::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}
