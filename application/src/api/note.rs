//! [`Note`] endpoints.

use axum::Extension;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, delete_note, update_note, Command as _},
    domain::{note, Note},
    query::{self, notes, Query as _},
};
use tracing as log;

use crate::{
    api::{Json, Path, SPAN_NAME},
    define_error, AsError, Error, Service, Session,
};

/// Request of [`create()`].
#[derive(Clone, Debug, Deserialize)]
pub struct NoteInput {
    /// Title of the new [`Note`].
    pub title: String,

    /// Content of the new [`Note`].
    #[serde(default)]
    pub content: String,
}

/// Request of [`update()`].
#[derive(Clone, Debug, Deserialize)]
pub struct NotePatch {
    /// New title of the [`Note`], if any.
    #[serde(default)]
    pub title: Option<String>,

    /// New content of the [`Note`], if any.
    #[serde(default)]
    pub content: Option<String>,
}

/// [`Note`] as returned by the API.
#[derive(Clone, Debug, Serialize)]
pub struct NoteOutput {
    /// ID of the [`Note`].
    pub id: note::Id,

    /// Title of the [`Note`].
    pub title: String,

    /// Content of the [`Note`].
    pub content: String,
}

impl From<Note> for NoteOutput {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title.into(),
            content: note.content.to_string(),
        }
    }
}

/// Lists all [`Note`]s of the current [`Session`].
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "listNotes",
        otel.name = SPAN_NAME,
        user_id = %session.user_id,
    ),
)]
pub async fn list(
    Extension(service): Extension<Service>,
    session: Session,
) -> Result<Json<Vec<NoteOutput>>, Error> {
    let notes = service
        .execute(notes::ByOwner(session.user_id))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(notes.into_iter().map(Into::into).collect()))
}

/// Creates a new [`Note`] owned by the current [`Session`].
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_TITLE` - provided title is empty or too long.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "createNote",
        otel.name = SPAN_NAME,
        user_id = %session.user_id,
    ),
)]
pub async fn create(
    Extension(service): Extension<Service>,
    session: Session,
    Json(input): Json<NoteInput>,
) -> Result<(http::StatusCode, Json<NoteOutput>), Error> {
    let title = note::Title::new(input.title)
        .ok_or(Error::from(NoteError::InvalidTitle))?;

    let note = service
        .execute(command::CreateNote {
            owner_id: session.user_id,
            title,
            content: input.content.into(),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((http::StatusCode::CREATED, Json(note.into())))
}

/// Returns a single [`Note`] of the current [`Session`].
///
/// # Errors
///
/// Possible error codes:
/// - `NOTE_NOT_EXISTS` - [`Note`] does not exist;
/// - `NOT_NOTE_OWNER` - [`Note`] belongs to another user.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "getNote",
        otel.name = SPAN_NAME,
        note_id = %id,
        user_id = %session.user_id,
    ),
)]
pub async fn get(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<note::Id>,
) -> Result<Json<NoteOutput>, Error> {
    let note = service
        .execute(query::note::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| {
            log::debug!("note not found");
            Error::from(NoteError::NotExists)
        })?;
    if !note.is_owned_by(session.user_id) {
        log::warn!("access to a foreign note rejected");
        return Err(NoteError::NotOwner.into());
    }

    Ok(Json(note.into()))
}

/// Partially updates a [`Note`] of the current [`Session`].
///
/// # Errors
///
/// Possible error codes:
/// - `NOTE_NOT_EXISTS` - [`Note`] does not exist;
/// - `NOT_NOTE_OWNER` - [`Note`] belongs to another user;
/// - `INVALID_TITLE` - provided title is empty or too long.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "updateNote",
        otel.name = SPAN_NAME,
        note_id = %id,
        user_id = %session.user_id,
    ),
)]
pub async fn update(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<note::Id>,
    Json(patch): Json<NotePatch>,
) -> Result<Json<NoteOutput>, Error> {
    let NotePatch { title, content } = patch;

    let note = service
        .execute(command::UpdateNote {
            note_id: id,
            initiator_id: session.user_id,
            title,
            content: content.map(Into::into),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(note.into()))
}

/// Deletes a [`Note`] of the current [`Session`].
///
/// # Errors
///
/// Possible error codes:
/// - `NOTE_NOT_EXISTS` - [`Note`] does not exist;
/// - `NOT_NOTE_OWNER` - [`Note`] belongs to another user.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "deleteNote",
        otel.name = SPAN_NAME,
        note_id = %id,
        user_id = %session.user_id,
    ),
)]
pub async fn delete(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<note::Id>,
) -> Result<http::StatusCode, Error> {
    service
        .execute(command::DeleteNote {
            note_id: id,
            initiator_id: session.user_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(http::StatusCode::NO_CONTENT)
}

impl AsError for command::create_note::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for update_note::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::NoteNotExists(_) => {
                log::debug!("{self}");
                Some(NoteError::NotExists.into())
            }
            Self::NotNoteOwner(_) => {
                log::warn!("{self}");
                Some(NoteError::NotOwner.into())
            }
            Self::InvalidTitle(_) => Some(NoteError::InvalidTitle.into()),
        }
    }
}

impl AsError for delete_note::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::NoteNotExists(_) => {
                log::debug!("{self}");
                Some(NoteError::NotExists.into())
            }
            Self::NotNoteOwner(_) => {
                log::warn!("{self}");
                Some(NoteError::NotOwner.into())
            }
        }
    }
}

impl AsError for notes::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

define_error! {
    enum NoteError {
        #[code = "INVALID_TITLE"]
        #[status = BAD_REQUEST]
        #[message = "Title must be 1 to 128 characters long"]
        InvalidTitle,

        #[code = "NOTE_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "Note does not exist"]
        NotExists,

        #[code = "NOT_NOTE_OWNER"]
        #[status = FORBIDDEN]
        #[message = "Note belongs to another user"]
        NotOwner,
    }
}
