//! [`KeyValue`] store implementations.
//!
//! A [`KeyValue`] store backs both the registry of active session tokens and
//! the cache of read models. Values are stored as JSON with a TTL, so every
//! entry eventually disappears on its own.

pub mod memory;
pub mod redis;

use std::{fmt, time::Duration};

use derive_more::{AsRef, Display, Error as StdError, From};
use tracerr::Traced;

pub use self::{memory::Memory, redis::Redis};

/// Key-value store operation.
pub use common::Handler as KeyValue;

/// Key of a [`KeyValue`] entry, in the `<namespace>:<id>` form.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
pub struct Key(String);

impl Key {
    /// Creates a new [`Key`] identifying the given `id` inside the given
    /// `namespace`.
    #[must_use]
    pub fn new(namespace: &str, id: impl fmt::Display) -> Self {
        Self(format!("{namespace}:{id}"))
    }
}

/// Value stored under a [`Key`] for the limited time.
#[derive(Clone, Debug)]
pub struct Expiring<V> {
    /// [`Key`] to store the value under.
    pub key: Key,

    /// Stored value.
    pub value: V,

    /// Time the value is kept for, counting from its insertion.
    pub ttl: Duration,
}

/// [`KeyValue`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Redis`] error.
    #[display("`Redis` operation failed: {_0}")]
    Redis(self::redis::Error),

    /// Stored value cannot be (de)serialized.
    #[display("Failed to (de)serialize a value: {_0}")]
    Serialization(serde_json::Error),
}

/// [`KeyValue`] store with the implementation chosen at runtime.
#[derive(Clone, Debug, From)]
pub enum Backend {
    /// In-process [`Memory`] store.
    ///
    /// Evicts expired entries only when they are read, so entries never read
    /// again are kept for the whole process lifetime.
    Memory(Memory),

    /// [`Redis`] store.
    Redis(Redis),
}

impl<Op> KeyValue<Op> for Backend
where
    Memory: KeyValue<Op, Err = Traced<Error>>,
    Redis: KeyValue<
        Op,
        Ok = <Memory as KeyValue<Op>>::Ok,
        Err = Traced<Error>,
    >,
{
    type Ok = <Memory as KeyValue<Op>>::Ok;
    type Err = Traced<Error>;

    async fn execute(&self, op: Op) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Memory(kv) => kv.execute(op).await,
            Self::Redis(kv) => kv.execute(op).await,
        }
    }
}

#[cfg(test)]
mod spec {
    use super::Key;

    #[test]
    fn namespaces_key() {
        assert_eq!(Key::new("notes:user", 42).as_ref(), "notes:user:42");
        assert_eq!(Key::new("jwt", "a.b.c").to_string(), "jwt:a.b.c");
    }
}
