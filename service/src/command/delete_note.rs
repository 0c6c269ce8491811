//! [`Command`] for deleting a [`Note`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::{note, user, Note},
    infra::{database, kv, Database, KeyValue},
    read, Service,
};

use super::Command;

/// [`Command`] for deleting a [`Note`] by its owner.
#[derive(Clone, Copy, Debug)]
pub struct DeleteNote {
    /// ID of the [`Note`] to delete.
    pub note_id: note::Id,

    /// ID of the [`User`] deleting the [`Note`].
    pub initiator_id: user::Id,
}

impl<Db, Kv> Command<DeleteNote> for Service<Db, Kv>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Note, note::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Note>, note::Id>>,
            Ok = Option<Note>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Note, note::Id>>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
    Kv: KeyValue<Delete<kv::Key>, Err = Traced<kv::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: DeleteNote) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeleteNote {
            note_id,
            initiator_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent modifications.
        tx.execute(Lock(By::<Note, _>::new(note_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let note = tx
            .execute(Select(By::<Option<Note>, _>::new(note_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoteNotExists(note_id))
            .map_err(tracerr::wrap!())?;
        if !note.is_owned_by(initiator_id) {
            return Err(tracerr::new!(E::NotNoteOwner(initiator_id)));
        }

        tx.execute(Delete(By::<Note, _>::new(note_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache()
            .execute(Delete(read::note::list::cache_key(note.owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)
    }
}

/// Error of [`DeleteNote`] [`Command`] execution.
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

    /// [`Note`] with the provided ID does not exist.
    #[display("`Note(id: {_0})` does not exist")]
    NoteNotExists(#[error(not(source))] note::Id),

    /// [`User`] is not the owner of the [`Note`].
    #[display("`User(id: {_0})` does not own the `Note`")]
    NotNoteOwner(#[error(not(source))] user::Id),
}
