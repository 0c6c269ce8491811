//! [`Note`] read models.

#[cfg(doc)]
use crate::domain::Note;

pub mod list {
    //! Cached list of [`Note`]s owned by a single [`User`].
    //!
    //! [`User`]: crate::domain::User

    use crate::{
        domain::{user, Note},
        infra::kv,
    };

    /// [`Note`]s of a single owner, ordered by their creation.
    pub type List = Vec<Note>;

    /// Returns the [`kv::Key`] the [`List`] of the given owner is cached
    /// under.
    #[must_use]
    pub fn cache_key(owner_id: user::Id) -> kv::Key {
        kv::Key::new("notes:user", owner_id)
    }
}
