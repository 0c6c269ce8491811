//! [`Command`] for authorizing a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, kv, Database, KeyValue},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`] by an access [`session::Token`].
///
/// The [`session::Token`] must be properly signed, not expired, and still
/// registered in the token store.
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

/// Output of [`AuthorizeUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Claims of the authorized [`session::Token`].
    pub session: Session,

    /// Authorized [`User`].
    pub user: User,
}

impl<Db, Kv> Command<AuthorizeUserSession> for Service<Db, Kv>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
    Kv: KeyValue<
        Select<By<bool, kv::Key>>,
        Ok = bool,
        Err = Traced<kv::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = Session::decode(
            &token,
            &self.config().jwt_decoding_key,
            session::Kind::Access,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        let registered = self
            .token_store()
            .execute(Select(By::<bool, _>::new(token.store_key())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !registered {
            return Err(tracerr::new!(E::Revoked));
        }

        let user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(session.user_id))
            .map_err(tracerr::wrap!())?;

        Ok(Output { session, user })
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`session::Token`] cannot be decoded or has expired.
    #[display("Invalid token: {_0}")]
    #[from]
    Decode(session::DecodeError),

    /// [`session::Token`] is not registered in the token store, so it has
    /// been revoked or has never been issued.
    #[display("Token is invalid or has been revoked.")]
    Revoked,

    /// Token store error.
    #[display("Token store operation failed: {_0}")]
    #[from]
    TokenStore(kv::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{Delete, Insert};

    use crate::{
        command::{Command as _, CreateUserSession},
        domain::user::{self, session, Session},
        infra::{kv, KeyValue as _},
        spec,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    async fn login(svc: &spec::TestService) -> session::Token {
        svc.execute(CreateUserSession::ByCredentials {
            username: user::Username::new("alice").unwrap(),
            password: spec::password(),
        })
        .await
        .unwrap()
        .access_token
    }

    #[tokio::test]
    async fn authorizes_registered_token() {
        let svc = spec::service();
        let user_id = spec::sign_up(&svc, "alice").await;
        let token = login(&svc).await;

        let out = svc.execute(AuthorizeUserSession { token }).await.unwrap();

        assert_eq!(out.session.user_id, user_id);
        assert_eq!(AsRef::<str>::as_ref(&out.user.username), "alice");
    }

    #[tokio::test]
    async fn rejects_unregistered_token() {
        let svc = spec::service();
        _ = spec::sign_up(&svc, "alice").await;
        let token = login(&svc).await;

        svc.token_store()
            .execute(Delete(token.store_key()))
            .await
            .unwrap();
        let err = svc
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Revoked));
        assert_eq!(err.to_string(), "Token is invalid or has been revoked.");
    }

    #[tokio::test]
    async fn rejects_expired_token_before_token_store() {
        let svc = spec::service();
        let user_id = spec::sign_up(&svc, "alice").await;

        let mut claims =
            Session::new(user_id, session::Kind::Access, Duration::from_secs(1));
        claims.expires_at = claims.expires_at - Duration::from_secs(60);
        let token = claims.encode(&svc.config().jwt_encoding_key).unwrap();
        svc.token_store()
            .execute(Insert(kv::Expiring {
                key: token.store_key(),
                value: (),
                ttl: Duration::from_secs(60),
            }))
            .await
            .unwrap();

        let err = svc
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Decode(e) if e.is_expired(),
        ));
    }

    #[tokio::test]
    async fn rejects_refresh_token() {
        let svc = spec::service();
        _ = spec::sign_up(&svc, "alice").await;
        let refresh = svc
            .execute(CreateUserSession::ByCredentials {
                username: user::Username::new("alice").unwrap(),
                password: spec::password(),
            })
            .await
            .unwrap()
            .refresh_token
            .unwrap();

        let err = svc
            .execute(AuthorizeUserSession { token: refresh })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Decode(session::DecodeError::WrongKind(_)),
        ));
    }

    #[tokio::test]
    async fn rejects_token_of_missing_user() {
        let svc = spec::service();
        let claims = Session::new(
            user::Id::new(),
            session::Kind::Access,
            Duration::from_secs(60),
        );
        let token = claims.encode(&svc.config().jwt_encoding_key).unwrap();
        svc.token_store()
            .execute(Insert(kv::Expiring {
                key: token.store_key(),
                value: (),
                ttl: Duration::from_secs(60),
            }))
            .await
            .unwrap();

        let err = svc
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
    }

    #[tokio::test]
    async fn fails_closed_when_token_store_is_unreachable() {
        let svc = spec::service();
        _ = spec::sign_up(&svc, "alice").await;
        let token = login(&svc).await;

        let err = spec::unreachable_kv(&svc)
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TokenStore(_)));
    }
}
