//! [`Command`] for creating a [`Session`].

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Password, Username};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, kv, Database, KeyValue},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
#[derive(Clone, Debug)]
pub enum CreateUserSession {
    /// Create a new [`Session`] by [`User`] credentials.
    ByCredentials {
        /// [`Username`] of a [`User`].
        username: user::Username,

        /// [`Password`] of a [`User`].
        password: SecretBox<user::Password>,
    },

    /// Create a new [`Session`] by a [`session::Kind::Refresh`] token.
    ByRefreshToken(session::Token),
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`User`] whose [`Session`] has been created.
    pub user: User,

    /// Access [`session::Token`], registered in the token store already.
    pub access_token: session::Token,

    /// [`DateTime`] when the access token expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: session::ExpirationDateTime,

    /// Refresh [`session::Token`], if a new one has been issued.
    ///
    /// Only [`CreateUserSession::ByCredentials`] issues it.
    pub refresh_token: Option<session::Token>,
}

impl<Db, Kv> Command<CreateUserSession> for Service<Db, Kv>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Select<By<Option<User>, &'l user::Username>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
    Kv: KeyValue<Insert<kv::Expiring<()>>, Err = Traced<kv::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateUserSession as Cmd;
        use ExecutionError as E;

        let (user, issue_refresh) = match cmd {
            Cmd::ByCredentials { username, password } => {
                // Unknown `Username` is indistinguishable from a wrong
                // `Password`.
                let user = self
                    .database()
                    .execute(Select(By::<Option<User>, _>::new(&username)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .filter(|u| u.password_hash.verify(password.expose_secret()))
                    .ok_or(E::WrongCredentials)
                    .map_err(tracerr::wrap!())?;
                (user, true)
            }
            Cmd::ByRefreshToken(token) => {
                let claims = Session::decode(
                    &token,
                    &self.config().jwt_decoding_key,
                    session::Kind::Refresh,
                )
                .map_err(tracerr::from_and_wrap!(=> E))?;

                let user = self
                    .database()
                    .execute(Select(By::<Option<User>, _>::new(claims.user_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::UserNotExists(claims.user_id))
                    .map_err(tracerr::wrap!())?;
                (user, false)
            }
        };

        let config = self.config();
        let access = Session::new(
            user.id,
            session::Kind::Access,
            config.access_token_lifetime,
        );
        let access_token = access
            .encode(&config.jwt_encoding_key)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let refresh_token = issue_refresh
            .then(|| {
                Session::new(
                    user.id,
                    session::Kind::Refresh,
                    config.refresh_token_lifetime,
                )
                .encode(&config.jwt_encoding_key)
            })
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        // Token authenticates only while registered, so it is never handed
        // out unregistered.
        self.token_store()
            .execute(Insert(kv::Expiring {
                key: access_token.store_key(),
                value: (),
                ttl: config.token_store_ttl,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tracing::debug!(
            user_id = %user.id,
            expires_at = %access.expires_at.to_rfc3339(),
            "access token issued",
        );

        Ok(Output {
            user,
            access_token,
            expires_at: access.expires_at,
            refresh_token,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    #[from]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// Refresh [`session::Token`] is invalid or expired.
    #[display("Invalid refresh token: {_0}")]
    #[from]
    RefreshTokenInvalid(session::DecodeError),

    /// Token store error.
    #[display("Token store operation failed: {_0}")]
    #[from]
    TokenStore(kv::Error),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`CreateUserSession::ByCredentials`] contains wrong credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}
