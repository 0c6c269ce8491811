//! [`Command`] for updating a [`Note`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{
    note::{Content, Title},
    User,
};
use crate::{
    domain::{note, user, Note},
    infra::{database, kv, Database, KeyValue},
    read, Service,
};

use super::Command;

/// [`Command`] for partially updating a [`Note`] by its owner.
///
/// Only the provided fields are changed. The new title is validated only
/// once the [`Note`] is known to exist and to be owned by the initiator.
#[derive(Clone, Debug)]
pub struct UpdateNote {
    /// ID of the [`Note`] to update.
    pub note_id: note::Id,

    /// ID of the [`User`] updating the [`Note`].
    pub initiator_id: user::Id,

    /// New raw [`Title`] of the [`Note`], if any.
    pub title: Option<String>,

    /// New [`Content`] of the [`Note`], if any.
    pub content: Option<note::Content>,
}

impl<Db, Kv> Command<UpdateNote> for Service<Db, Kv>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Note, note::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Note>, note::Id>>,
            Ok = Option<Note>,
            Err = Traced<database::Error>,
        > + Database<Update<Note>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Kv: KeyValue<Delete<kv::Key>, Err = Traced<kv::Error>>,
{
    type Ok = Note;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpdateNote) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateNote {
            note_id,
            initiator_id,
            title,
            content,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid lost updates.
        tx.execute(Lock(By::<Note, _>::new(note_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut note = tx
            .execute(Select(By::<Option<Note>, _>::new(note_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoteNotExists(note_id))
            .map_err(tracerr::wrap!())?;
        if !note.is_owned_by(initiator_id) {
            return Err(tracerr::new!(E::NotNoteOwner(initiator_id)));
        }

        if let Some(title) = title {
            note.title = note::Title::new(&title)
                .ok_or(E::InvalidTitle(title))
                .map_err(tracerr::wrap!())?;
        }
        if let Some(content) = content {
            note.content = content;
        }

        tx.execute(Update(note.clone()))
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
            .map(drop)?;

        Ok(note)
    }
}

/// Error of [`UpdateNote`] [`Command`] execution.
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

    /// Provided [`Title`] is invalid.
    #[display("`{_0}` is not a valid `Title`")]
    InvalidTitle(#[error(not(source))] String),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::Command as _,
        domain::note,
        query::{self, Query as _},
        spec,
    };

    use super::{ExecutionError, UpdateNote};

    #[tokio::test]
    async fn updates_only_provided_fields() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;

        let updated = svc
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: alice,
                title: None,
                content: Some("milk, eggs".into()),
            })
            .await
            .unwrap();

        assert_eq!(updated.title, note.title);
        assert_eq!(AsRef::<str>::as_ref(&updated.content), "milk, eggs");
        assert_eq!(updated.created_at, note.created_at);
    }

    #[tokio::test]
    async fn invalidates_cached_list() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;
        _ = svc.execute(query::notes::ByOwner(alice)).await.unwrap();
        assert!(spec::is_cached(&svc, alice).await);

        _ = svc
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: alice,
                title: Some("Shopping".into()),
                content: None,
            })
            .await
            .unwrap();

        assert!(!spec::is_cached(&svc, alice).await);
        let list = svc.execute(query::notes::ByOwner(alice)).await.unwrap();
        assert_eq!(AsRef::<str>::as_ref(&list[0].title), "Shopping");
    }

    #[tokio::test]
    async fn forbids_foreign_note_and_keeps_it_intact() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let bob = spec::sign_up(&svc, "bob").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;
        _ = svc.execute(query::notes::ByOwner(alice)).await.unwrap();

        let err = svc
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: bob,
                title: Some("Hacked".into()),
                content: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotNoteOwner(id) if *id == bob,
        ));
        assert!(spec::is_cached(&svc, alice).await);
        let stored = svc.execute(query::note::ById::by(note.id)).await.unwrap();
        assert_eq!(stored, Some(note));
    }

    #[tokio::test]
    async fn reports_missing_note() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let missing = note::Id::new();

        let err = svc
            .execute(UpdateNote {
                note_id: missing,
                initiator_id: alice,
                title: None,
                content: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NoteNotExists(id) if *id == missing,
        ));
    }

    #[tokio::test]
    async fn checks_ownership_before_title() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let bob = spec::sign_up(&svc, "bob").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;
        let missing = note::Id::new();

        let err = svc
            .execute(UpdateNote {
                note_id: missing,
                initiator_id: bob,
                title: Some(String::new()),
                content: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NoteNotExists(_)));

        let err = svc
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: bob,
                title: Some(String::new()),
                content: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotNoteOwner(_)));

        let err = svc
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: alice,
                title: Some(String::new()),
                content: Some("milk".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidTitle(t) if t.is_empty(),
        ));
        let stored = svc.execute(query::note::ById::by(note.id)).await.unwrap();
        assert_eq!(stored, Some(note));
    }

    #[tokio::test]
    async fn keeps_cached_list_on_failed_write() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;
        _ = svc.execute(query::notes::ByOwner(alice)).await.unwrap();

        let err = spec::failing_writes(&svc)
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: alice,
                title: Some("Shopping".into()),
                content: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Db(_)));
        assert!(spec::is_cached(&svc, alice).await);
        let list = svc.execute(query::notes::ByOwner(alice)).await.unwrap();
        assert_eq!(AsRef::<str>::as_ref(&list[0].title), "Groceries");
    }

    #[tokio::test]
    async fn reports_cache_failure_after_commit() {
        let svc = spec::service();
        let alice = spec::sign_up(&svc, "alice").await;
        let note = spec::create_note(&svc, alice, "Groceries").await;

        let err = spec::unreachable_kv(&svc)
            .execute(UpdateNote {
                note_id: note.id,
                initiator_id: alice,
                title: Some("Shopping".into()),
                content: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Cache(_)));
        let stored = svc
            .execute(query::note::ById::by(note.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(AsRef::<str>::as_ref(&stored.title), "Shopping");
    }
}
