//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use service::infra::kv;
use smart_default::SmartDefault;
use tracerr::Traced;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Token store configuration.
    pub token_store: KeyValue,

    /// Read model cache configuration.
    pub cache: KeyValue,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] HMAC secret.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("secret".to_owned())]
    pub jwt_secret: String,

    /// Lifetime of an issued access token.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: time::Duration,

    /// Lifetime of an issued refresh token.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: time::Duration,

    /// Time an access token stays registered in the token store.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub token_store_ttl: time::Duration,

    /// Time a list of notes stays cached.
    #[default(time::Duration::from_secs(15 * 60))]
    #[serde(with = "humantime_serde")]
    pub notes_cache_ttl: time::Duration,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            access_token_lifetime,
            refresh_token_lifetime,
            token_store_ttl,
            notes_cache_ttl,
        } = value;
        Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            access_token_lifetime,
            refresh_token_lifetime,
            token_store_ttl,
            notes_cache_ttl,
        }
    }
}

/// Key-value store configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct KeyValue {
    /// Backend to store the values in.
    pub backend: KeyValueBackend,

    /// [Redis] connection URL, used by [`KeyValueBackend::Redis`] only.
    ///
    /// [Redis]: https://redis.io
    #[default("redis://127.0.0.1:6379".to_owned())]
    pub url: String,
}

impl KeyValue {
    /// Builds the configured [`kv::Backend`].
    ///
    /// # Errors
    ///
    /// If the [Redis] connection pool cannot be created.
    ///
    /// [Redis]: https://redis.io
    pub fn build(self) -> Result<kv::Backend, Traced<kv::Error>> {
        let Self { backend, url } = self;

        Ok(match backend {
            KeyValueBackend::Memory => kv::Memory::new().into(),
            KeyValueBackend::Redis => {
                kv::Redis::new(&kv::redis::Config::from_url(url))?.into()
            }
        })
    }
}

/// Backend of a [`KeyValue`] store.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyValueBackend {
    /// In-process store, lost on restart and not shared between instances.
    Memory,

    /// [Redis] server.
    ///
    /// [Redis]: https://redis.io
    #[default]
    Redis,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{Config, KeyValueBackend};

    #[test]
    fn defaults_lifetimes() {
        let conf = Config::default();

        assert_eq!(
            conf.service.access_token_lifetime,
            Duration::from_secs(60 * 60),
        );
        assert_eq!(
            conf.service.refresh_token_lifetime,
            Duration::from_secs(24 * 60 * 60),
        );
        assert_eq!(conf.service.notes_cache_ttl, Duration::from_secs(15 * 60));
        assert!(matches!(conf.cache.backend, KeyValueBackend::Redis));
    }

    #[test]
    fn builds_memory_backend() {
        let conf = Config::default();
        let mut kv = conf.cache;
        kv.backend = KeyValueBackend::Memory;

        assert!(matches!(
            kv.build(),
            Ok(service::infra::kv::Backend::Memory(_)),
        ));
    }
}
