//! [`Command`] for creating a new [`Note`].

use common::operations::{Commit, Delete, Insert, Transact, Transacted};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{
    note::{Content, Title},
    User,
};
use crate::{
    domain::{
        note::{self, CreationDateTime},
        user, Note,
    },
    infra::{database, kv, Database, KeyValue},
    read, Service,
};

use super::Command;

/// [`Command`] for creating a new [`Note`].
///
/// Invalidates the cached [`read::note::list::List`] of the owner once the
/// [`Note`] is stored.
#[derive(Clone, Debug)]
pub struct CreateNote {
    /// ID of the [`User`] owning the new [`Note`].
    pub owner_id: user::Id,

    /// [`Title`] of the new [`Note`].
    pub title: note::Title,

    /// [`Content`] of the new [`Note`].
    pub content: note::Content,
}

impl<Db, Kv> Command<CreateNote> for Service<Db, Kv>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Note>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Kv: KeyValue<Delete<kv::Key>, Err = Traced<kv::Error>>,
{
    type Ok = Note;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateNote) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateNote {
            owner_id,
            title,
            content,
        } = cmd;

        let note = Note {
            id: note::Id::new(),
            title,
            content,
            owner_id,
            created_at: CreationDateTime::now(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(note.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache()
            .execute(Delete(read::note::list::cache_key(owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(note)
    }
}

/// Error of [`CreateNote`] [`Command`] execution.
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
