//! [`Session`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::User;
use crate::{domain::user, infra::kv};

/// Claims of a [JWT] issued to a [`User`].
///
/// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Session {
    /// ID of the [`User`] this [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`DateTime`] when this [`Session`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,

    /// [`DateTime`] when this [`Session`] was issued.
    #[serde(rename = "iat", with = "common::datetime::serde::unix_timestamp")]
    pub issued_at: IssuanceDateTime,

    /// Unique ID of the token, so no two minted tokens are equal.
    #[serde(rename = "jti")]
    pub id: Id,

    /// [`Kind`] of the token.
    #[serde(rename = "token_type")]
    pub kind: Kind,
}

impl Session {
    /// Creates a new [`Session`] of the given [`Kind`] for the given [`User`],
    /// valid for the given `lifetime` from now.
    #[must_use]
    pub fn new(
        user_id: user::Id,
        kind: Kind,
        lifetime: std::time::Duration,
    ) -> Self {
        // Claims carry whole seconds only.
        let now = IssuanceDateTime::now();
        let issued_at = IssuanceDateTime::from_unix_timestamp(
            now.unix_timestamp(),
        )
        .unwrap_or(now);
        Self {
            user_id,
            expires_at: (issued_at + lifetime).coerce(),
            issued_at,
            id: Id::new(),
            kind,
        }
    }

    /// Signs this [`Session`] into a [`Token`].
    ///
    /// # Errors
    ///
    /// If [`jsonwebtoken`] fails to encode the claims.
    pub fn encode(
        &self,
        key: &EncodingKey,
    ) -> Result<Token, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), self, key)
            .map(Token)
    }

    /// Verifies the signature and expiration of the given [`Token`] and
    /// decodes its [`Session`], requiring it to be of the `expected` [`Kind`].
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Jwt`] if the [`Token`] is malformed, forged or expired.
    /// - [`DecodeError::WrongKind`] if the [`Token`] is of another [`Kind`].
    pub fn decode(
        token: &Token,
        key: &DecodingKey,
        expected: Kind,
    ) -> Result<Self, DecodeError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let session =
            jsonwebtoken::decode::<Self>(token.as_ref(), key, &validation)?
                .claims;
        if session.kind != expected {
            return Err(DecodeError::WrongKind(expected));
        }
        Ok(session)
    }
}

/// Error of decoding a [`Session`] from a [`Token`].
#[derive(Debug, Display, Error, From)]
pub enum DecodeError {
    /// [`jsonwebtoken`] rejected the [`Token`].
    #[display("Failed to decode a JSON Web Token: {_0}")]
    Jwt(jsonwebtoken::errors::Error),

    /// [`Token`] is valid, but of an unexpected [`Kind`].
    #[display("Expected `{_0}` token")]
    #[from(ignore)]
    WrongKind(#[error(not(source))] Kind),
}

impl DecodeError {
    /// Indicates whether the [`Token`] was rejected only because it expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            Self::Jwt(e) if matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature,
            ),
        )
    }
}

/// Purpose of a [`Session`] token.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Short-lived token authenticating requests.
    #[display("access")]
    Access,

    /// Long-lived token exchangeable for a new [`Kind::Access`] token.
    #[display("refresh")]
    Refresh,
}

/// Unique ID of a [`Session`] token.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Signed [JWT] representation of a [`Session`].
///
/// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
#[derive(AsRef, Clone, Debug, Display, Eq, FromStr, Hash, PartialEq)]
#[as_ref(str)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }

    /// Returns the [`kv::Key`] this [`Token`] is registered under while it
    /// stays active.
    #[must_use]
    pub fn store_key(&self) -> kv::Key {
        kv::Key::new("jwt", &self.0)
    }
}

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

/// [`DateTime`] of a [`Session`] issuance.
pub type IssuanceDateTime = DateTimeOf<(Session, unit::Issuance)>;
