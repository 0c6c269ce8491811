//! [Redis] [`KeyValue`] store.
//!
//! [Redis]: https://redis.io

use std::fmt;

use ::redis::AsyncCommands as _;
use common::operations::{By, Delete, Insert, Select};
use deadpool_redis::Runtime;
use derive_more::{Display, Error as StdError, From};
use serde::{de::DeserializeOwned, Serialize};
use tracerr::Traced;

use crate::infra::kv::{self, Expiring, Key, KeyValue};

pub use deadpool_redis::Config;

/// [Redis] [`KeyValue`] store backed by a connection pool.
///
/// Expiration is delegated to [Redis] itself.
///
/// [Redis]: https://redis.io
#[derive(Clone)]
pub struct Redis {
    /// Pool of [Redis] connections.
    ///
    /// [Redis]: https://redis.io
    pool: deadpool_redis::Pool,
}

impl fmt::Debug for Redis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redis")
            .field("status", &self.pool.status())
            .finish_non_exhaustive()
    }
}

impl Redis {
    /// Creates a new [`Redis`] store with the provided [`Config`].
    ///
    /// Connections are established lazily, on first use.
    ///
    /// # Errors
    ///
    /// If failed to create a new connection pool.
    pub fn new(conf: &Config) -> Result<Self, Traced<kv::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1))
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self { pool })
    }

    /// Retrieves a pooled connection.
    async fn connection(
        &self,
    ) -> Result<deadpool_redis::Connection, Traced<kv::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

/// [`Redis`] store error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Command failed to execute.
    #[display("Command failed: {_0}")]
    Command(::redis::RedisError),

    /// Error of creating a new [`deadpool_redis::Pool`].
    #[display("Failed to create a new `Pool`: {_0}")]
    PoolCreation(deadpool_redis::CreatePoolError),

    /// [`deadpool_redis::Pool`] error.
    #[display("`Pool` error: {_0}")]
    Pool(deadpool_redis::PoolError),
}

impl<V> KeyValue<Insert<Expiring<V>>> for Redis
where
    V: Serialize,
{
    type Ok = ();
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<Expiring<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Expiring { key, value, ttl } = entry;

        let value = serde_json::to_vec(&value)
            .map_err(tracerr::from_and_wrap!(=> kv::Error))?;
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .pset_ex::<_, _, ()>(key.as_ref(), value, millis)
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

impl<V> KeyValue<Select<By<Option<V>, Key>>> for Redis
where
    V: DeserializeOwned,
{
    type Ok = Option<V>;
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<V>, Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();

        let raw = self
            .connection()
            .await
            .map_err(tracerr::wrap!())?
            .get::<_, Option<Vec<u8>>>(key.as_ref())
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        raw.map(|raw| serde_json::from_slice(&raw))
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> kv::Error))
    }
}

impl KeyValue<Select<By<bool, Key>>> for Redis {
    type Ok = bool;
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<bool, Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();

        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .exists::<_, bool>(key.as_ref())
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

impl KeyValue<Delete<Key>> for Redis {
    type Ok = ();
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Delete(key): Delete<Key>,
    ) -> Result<Self::Ok, Self::Err> {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .del::<_, ()>(key.as_ref())
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}
