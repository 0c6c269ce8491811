//! [`Session`]-related definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use common::DateTime;
use service::{
    command::{self, authorize_user_session, Command as _},
    domain::user::{self, session},
};
use tracing as log;

use crate::{define_error, AsError, Error, Service};

/// Authenticated session of the current HTTP request.
///
/// Extracting it verifies the `Authorization: Bearer <token>` header, so
/// handlers accepting a [`Session`] are protected.
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of the authenticated [`User`].
    ///
    /// [`User`]: service::domain::User
    pub user_id: user::Id,

    /// Access token the request is authenticated with.
    pub token: session::Token,

    /// [`DateTime`] when this [`Session`] expires.
    pub expires_at: DateTime,
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| -> Error {
                if e.is_missing() {
                    AuthError::AuthorizationRequired.into()
                } else {
                    AuthError::TokenInvalid.into()
                }
            })?;

        #[expect(unsafe_code, reason = "specified in correct header")]
        let token =
            unsafe { session::Token::new_unchecked(bearer.token().to_owned()) };

        let output = service
            .execute(command::AuthorizeUserSession {
                token: token.clone(),
            })
            .await
            .map_err(|e| {
                if let authorize_user_session::ExecutionError::TokenStore(_) =
                    e.as_ref()
                {
                    log::error!("cannot verify token registration: {e}");
                }
                e.into_error()
            })?;

        Ok(Self {
            user_id: output.user.id,
            token,
            expires_at: output.session.expires_at.coerce(),
        })
    }
}

impl AsError for authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Decode(e) => Some(decode_error(e)),
            Self::Revoked => Some(AuthError::TokenRevoked.into()),
            // Token store outage fails authentication closed.
            Self::TokenStore(_) => Some(AuthError::Unverifiable.into()),
            Self::UserNotExists(_) => Some(AuthError::UserNotExists.into()),
        }
    }
}

/// Converts the provided [`session::DecodeError`] into an [`Error`].
pub(crate) fn decode_error(e: &session::DecodeError) -> Error {
    if e.is_expired() {
        AuthError::TokenExpired.into()
    } else {
        AuthError::TokenInvalid.into()
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "TOKEN_EXPIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Token has expired"]
        TokenExpired,

        #[code = "TOKEN_INVALID"]
        #[status = UNAUTHORIZED]
        #[message = "Token is invalid"]
        TokenInvalid,

        #[code = "TOKEN_REVOKED"]
        #[status = UNAUTHORIZED]
        #[message = "Token is invalid or has been revoked."]
        TokenRevoked,

        #[code = "TOKEN_UNVERIFIABLE"]
        #[status = UNAUTHORIZED]
        #[message = "Token cannot be verified at the moment"]
        Unverifiable,

        #[code = "USER_NOT_EXISTS"]
        #[status = UNAUTHORIZED]
        #[message = "`User` of the token does not exist"]
        UserNotExists,
    }
}
