//! Domain definitions.

pub mod note;
pub mod user;

pub use self::{note::Note, user::User};
