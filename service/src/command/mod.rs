//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_note;
pub mod create_user;
pub mod create_user_session;
pub mod delete_note;
pub mod revoke_user_session;
pub mod update_note;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession, create_note::CreateNote,
    create_user::CreateUser, create_user_session::CreateUserSession,
    delete_note::DeleteNote, revoke_user_session::RevokeUserSession,
    update_note::UpdateNote,
};
