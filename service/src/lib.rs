//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;

use std::time::Duration;

use derive_more::Debug;
// Used by in-memory `Database` only.
#[cfg(not(any(test, feature = "memory")))]
use parking_lot as _;

#[cfg(doc)]
use infra::{Database, KeyValue};

pub use self::{command::Command, query::Query};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] encoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,

    /// [JWT] decoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// Lifetime of an access token.
    pub access_token_lifetime: Duration,

    /// Lifetime of a refresh token.
    pub refresh_token_lifetime: Duration,

    /// Time an issued access token stays registered in the token store.
    pub token_store_ttl: Duration,

    /// Time a [`read::note::list::List`] stays cached.
    pub notes_cache_ttl: Duration,
}

impl Config {
    /// Creates a new [`Config`] signing tokens with the given HMAC `secret`
    /// and using the default lifetimes.
    #[must_use]
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(secret),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(secret),
            access_token_lifetime: Duration::from_secs(60 * 60),
            refresh_token_lifetime: Duration::from_secs(24 * 60 * 60),
            token_store_ttl: Duration::from_secs(60 * 60),
            notes_cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Kv = infra::kv::Backend> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`KeyValue`] store registering active access tokens.
    token_store: Kv,

    /// [`KeyValue`] store caching read models.
    cache: Kv,
}

impl<Db, Kv> Service<Db, Kv> {
    /// Creates a new [`Service`] with the provided parameters.
    #[must_use]
    pub fn new(
        config: Config,
        database: Db,
        token_store: Kv,
        cache: Kv,
    ) -> Self {
        Self {
            config,
            database,
            token_store,
            cache,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the token store of this [`Service`].
    ///
    /// An access token authenticates only while it is present here.
    #[must_use]
    pub fn token_store(&self) -> &Kv {
        &self.token_store
    }

    /// Returns the read model cache of this [`Service`].
    #[must_use]
    pub fn cache(&self) -> &Kv {
        &self.cache
    }
}

#[cfg(test)]
mod spec {
    //! Shared fixtures of [`Service`] tests.

    use common::operations::{
        By, Commit, Delete, Insert, Lock, Select, Transact, Update,
    };
    use secrecy::SecretBox;
    use tracerr::Traced;

    use crate::{
        command::{self, Command as _},
        domain::{note, user, Note},
        infra::{
            database::{self, memory},
            kv, Database, KeyValue, Memory,
        },
        Config, Service,
    };

    /// [`Service`] over in-memory infrastructure.
    pub(crate) type TestService = Service<Memory, kv::Memory>;

    /// Creates a new [`TestService`] with the default [`Config`].
    pub(crate) fn service() -> TestService {
        Service::new(
            Config::with_secret(b"test-secret"),
            Memory::new(),
            kv::Memory::new(),
            kv::Memory::new(),
        )
    }

    /// Registers a new user with the given `username`.
    pub(crate) async fn sign_up(
        svc: &TestService,
        username: &str,
    ) -> user::Id {
        svc.execute(command::CreateUser {
            username: user::Username::new(username).unwrap(),
            password: password(),
            email: None,
        })
        .await
        .unwrap()
        .id
    }

    /// Password every test user signs up with.
    pub(crate) fn password() -> SecretBox<user::Password> {
        SecretBox::new(Box::new(user::Password::new("s3cret").unwrap()))
    }

    /// Creates a new [`Note`] owned by the given user.
    pub(crate) async fn create_note(
        svc: &TestService,
        owner_id: user::Id,
        title: &str,
    ) -> Note {
        svc.execute(command::CreateNote {
            owner_id,
            title: note::Title::new(title).unwrap(),
            content: note::Content::default(),
        })
        .await
        .unwrap()
    }

    /// Checks whether the notes of the given user are cached.
    pub(crate) async fn is_cached(
        svc: &TestService,
        owner_id: user::Id,
    ) -> bool {
        svc.cache()
            .execute(Select(By::<bool, _>::new(
                crate::read::note::list::cache_key(owner_id),
            )))
            .await
            .unwrap()
    }

    /// [`Memory`] database failing every [`Note`] write, while reading and
    /// transacting normally.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct FailingWrites(pub(crate) Memory);

    impl FailingWrites {
        fn fail() -> Traced<database::Error> {
            tracerr::new!(database::Error::from(
                memory::Error::UniqueViolation("notes_pkey"),
            ))
        }
    }

    impl Database<Transact> for FailingWrites {
        type Ok = Self;
        type Err = Traced<database::Error>;

        async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
            Ok(self.clone())
        }
    }

    impl Database<Commit> for FailingWrites {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(&self, op: Commit) -> Result<Self::Ok, Self::Err> {
            self.0.execute(op).await
        }
    }

    impl Database<Lock<By<Note, note::Id>>> for FailingWrites {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            op: Lock<By<Note, note::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            self.0.execute(op).await
        }
    }

    impl Database<Select<By<Option<Note>, note::Id>>> for FailingWrites {
        type Ok = Option<Note>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            op: Select<By<Option<Note>, note::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            self.0.execute(op).await
        }
    }

    impl Database<Insert<Note>> for FailingWrites {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Insert<Note>,
        ) -> Result<Self::Ok, Self::Err> {
            Err(Self::fail())
        }
    }

    impl Database<Update<Note>> for FailingWrites {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Update<Note>,
        ) -> Result<Self::Ok, Self::Err> {
            Err(Self::fail())
        }
    }

    impl Database<Delete<By<Note, note::Id>>> for FailingWrites {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Delete<By<Note, note::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            Err(Self::fail())
        }
    }

    /// Creates a new [`Service`] sharing the [`kv::Memory`] stores of the
    /// given one, whose [`Note`] writes always fail.
    pub(crate) fn failing_writes(
        svc: &TestService,
    ) -> Service<FailingWrites, kv::Memory> {
        Service::new(
            svc.config().clone(),
            FailingWrites(svc.database().clone()),
            svc.token_store().clone(),
            svc.cache().clone(),
        )
    }

    /// [`KeyValue`] store which cannot be reached.
    #[derive(Clone, Copy, Debug, Default)]
    pub(crate) struct Unreachable;

    impl Unreachable {
        fn fail() -> Traced<kv::Error> {
            tracerr::new!(kv::Error::from(kv::redis::Error::Pool(
                deadpool_redis::PoolError::Closed,
            )))
        }
    }

    impl KeyValue<Select<By<bool, kv::Key>>> for Unreachable {
        type Ok = bool;
        type Err = Traced<kv::Error>;

        async fn execute(
            &self,
            _: Select<By<bool, kv::Key>>,
        ) -> Result<Self::Ok, Self::Err> {
            Err(Self::fail())
        }
    }

    impl KeyValue<Delete<kv::Key>> for Unreachable {
        type Ok = ();
        type Err = Traced<kv::Error>;

        async fn execute(
            &self,
            _: Delete<kv::Key>,
        ) -> Result<Self::Ok, Self::Err> {
            Err(Self::fail())
        }
    }

    /// Creates a new [`Service`] sharing the [`Memory`] database of the given
    /// one, whose token store and cache cannot be reached.
    pub(crate) fn unreachable_kv(
        svc: &TestService,
    ) -> Service<Memory, Unreachable> {
        Service::new(
            svc.config().clone(),
            svc.database().clone(),
            Unreachable,
            Unreachable,
        )
    }
}
