//! Authentication endpoints.

use axum::Extension;
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use service::{
    command::{
        self, create_user, create_user_session, revoke_user_session,
        Command as _,
    },
    domain::user::{self, session},
};

use crate::{
    api::{Json, SPAN_NAME},
    define_error,
    session::decode_error,
    AsError, Error, Service, Session,
};

/// Request of [`sign_up()`].
#[derive(Clone, Debug, Deserialize)]
pub struct SignUpRequest {
    /// Desired username.
    pub username: String,

    /// Password to sign in with.
    pub password: String,

    /// Optional email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Registered user, as returned by [`sign_up()`].
#[derive(Clone, Debug, Serialize)]
pub struct UserResponse {
    /// ID of the user.
    pub id: user::Id,

    /// Username of the user.
    pub username: String,

    /// Email address of the user, if any.
    pub email: Option<String>,
}

/// Request of [`log_in()`].
#[derive(Clone, Debug, Deserialize)]
pub struct LogInRequest {
    /// Username to sign in with.
    pub username: String,

    /// Password to sign in with.
    pub password: String,
}

/// Token pair issued by [`log_in()`].
#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
    /// Access token.
    pub access: String,

    /// Refresh token.
    pub refresh: String,
}

/// Request of [`refresh()`].
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token issued by [`log_in()`].
    pub refresh: String,
}

/// Access token issued by [`refresh()`].
#[derive(Clone, Debug, Serialize)]
pub struct AccessToken {
    /// Access token.
    pub access: String,
}

/// Registers a new user.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_USERNAME`, `INVALID_PASSWORD`, `INVALID_EMAIL` - provided field
///   is malformed;
/// - `USERNAME_OCCUPIED` - provided username is taken by another user.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "signUp",
        otel.name = SPAN_NAME,
        username = %req.username,
    ),
)]
pub async fn sign_up(
    Extension(service): Extension<Service>,
    Json(req): Json<SignUpRequest>,
) -> Result<(http::StatusCode, Json<UserResponse>), Error> {
    let SignUpRequest {
        username,
        password,
        email,
    } = req;

    let username = user::Username::new(username)
        .ok_or(Error::from(SignUpError::InvalidUsername))?;
    let password = user::Password::new(password)
        .ok_or(Error::from(SignUpError::InvalidPassword))?;
    let email = email
        .map(|e| user::Email::new(e).ok_or(SignUpError::InvalidEmail))
        .transpose()?;

    let user = service
        .execute(command::CreateUser {
            username,
            password: SecretBox::new(Box::new(password)),
            email,
        })
        .await
        .map_err(AsError::into_error)?;

    tracing::info!(user_id = %user.id, "user signed up");

    Ok((
        http::StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username.to_string(),
            email: user.email.map(|e| e.to_string()),
        }),
    ))
}

/// Issues a new token pair for the provided credentials.
///
/// # Errors
///
/// Possible error codes:
/// - `WRONG_CREDENTIALS` - provided credentials do not match any user.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "logIn",
        otel.name = SPAN_NAME,
        username = %req.username,
    ),
)]
pub async fn log_in(
    Extension(service): Extension<Service>,
    Json(req): Json<LogInRequest>,
) -> Result<Json<TokenPair>, Error> {
    let LogInRequest { username, password } = req;

    // Malformed credentials cannot match any user.
    let (Some(username), Some(password)) =
        (user::Username::new(username), user::Password::new(password))
    else {
        return Err(LogInError::WrongCredentials.into());
    };

    let output = service
        .execute(command::CreateUserSession::ByCredentials {
            username,
            password: SecretBox::new(Box::new(password)),
        })
        .await
        .map_err(AsError::into_error)?;

    let refresh = output
        .refresh_token
        .ok_or_else(|| Error::internal(&"refresh token is not issued"))?;
    Ok(Json(TokenPair {
        access: output.access_token.to_string(),
        refresh: refresh.to_string(),
    }))
}

/// Revokes the access token of the current [`Session`].
///
/// # Errors
///
/// Errors if the request is not authenticated.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "logOut",
        otel.name = SPAN_NAME,
        user_id = %session.user_id,
    ),
)]
pub async fn log_out(
    Extension(service): Extension<Service>,
    session: Session,
) -> Result<http::StatusCode, Error> {
    service
        .execute(command::RevokeUserSession {
            token: session.token,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(http::StatusCode::OK)
}

/// Exchanges a refresh token for a new access token.
///
/// # Errors
///
/// Possible error codes:
/// - `TOKEN_EXPIRED`, `TOKEN_INVALID` - provided refresh token is rejected;
/// - `USER_NOT_EXISTS` - user of the refresh token does not exist anymore.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "refresh", otel.name = SPAN_NAME),
)]
pub async fn refresh(
    Extension(service): Extension<Service>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AccessToken>, Error> {
    #[expect(unsafe_code, reason = "verified by the command")]
    let token = unsafe { session::Token::new_unchecked(req.refresh) };

    let output = service
        .execute(command::CreateUserSession::ByRefreshToken(token))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(AccessToken {
        access: output.access_token.to_string(),
    }))
}

impl AsError for create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PasswordHashing(_) => None,
            Self::UsernameOccupied(_) => {
                Some(SignUpError::UsernameOccupied.into())
            }
        }
    }
}

impl AsError for create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::TokenStore(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::RefreshTokenInvalid(e) => Some(decode_error(e)),
            Self::UserNotExists(_) => Some(LogInError::UserNotExists.into()),
            Self::WrongCredentials => Some(LogInError::WrongCredentials.into()),
        }
    }
}

impl AsError for revoke_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::TokenStore(e) => e.try_as_error(),
        }
    }
}

define_error! {
    enum SignUpError {
        #[code = "INVALID_USERNAME"]
        #[status = BAD_REQUEST]
        #[message = "Username must be 1 to 150 letters, digits or @/./+/-/_ \
                     characters"]
        InvalidUsername,

        #[code = "INVALID_PASSWORD"]
        #[status = BAD_REQUEST]
        #[message = "Password must be 1 to 128 characters long"]
        InvalidPassword,

        #[code = "INVALID_EMAIL"]
        #[status = BAD_REQUEST]
        #[message = "Email address is malformed"]
        InvalidEmail,

        #[code = "USERNAME_OCCUPIED"]
        #[status = BAD_REQUEST]
        #[message = "Username is occupied by another user"]
        UsernameOccupied,
    }
}

define_error! {
    enum LogInError {
        #[code = "WRONG_CREDENTIALS"]
        #[status = UNAUTHORIZED]
        #[message = "Provided credentials do not match any user"]
        WrongCredentials,

        #[code = "USER_NOT_EXISTS"]
        #[status = UNAUTHORIZED]
        #[message = "User of the token does not exist"]
        UserNotExists,
    }
}
