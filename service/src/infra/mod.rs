//! Infrastructure layer.

pub mod database;
pub mod kv;

#[cfg(any(test, feature = "memory"))]
pub use self::database::Memory;
pub use self::{database::Database, kv::KeyValue};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
