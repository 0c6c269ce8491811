//! [`Command`] for revoking a [`Session`].

use common::operations::Delete;
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::Session;
use crate::{
    domain::user::session,
    infra::{kv, KeyValue},
    Service,
};

use super::Command;

/// [`Command`] for revoking a [`Session`] by unregistering its access
/// [`session::Token`] from the token store.
///
/// Revoking an unknown or already revoked [`session::Token`] is a no-op.
#[derive(Clone, Debug, From)]
pub struct RevokeUserSession {
    /// Access [`session::Token`] to revoke.
    pub token: session::Token,
}

impl<Db, Kv> Command<RevokeUserSession> for Service<Db, Kv>
where
    Kv: KeyValue<Delete<kv::Key>, Err = Traced<kv::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RevokeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RevokeUserSession { token } = cmd;

        self.token_store()
            .execute(Delete(token.store_key()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)
    }
}

/// Error of [`RevokeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Token store error.
    #[display("Token store operation failed: {_0}")]
    TokenStore(kv::Error),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            authorize_user_session, AuthorizeUserSession, Command as _,
            CreateUserSession,
        },
        domain::user,
        spec,
    };

    use super::RevokeUserSession;

    #[tokio::test]
    async fn revoked_token_no_longer_authorizes() {
        let svc = spec::service();
        _ = spec::sign_up(&svc, "alice").await;
        let token = svc
            .execute(CreateUserSession::ByCredentials {
                username: user::Username::new("alice").unwrap(),
                password: spec::password(),
            })
            .await
            .unwrap()
            .access_token;

        svc.execute(RevokeUserSession {
            token: token.clone(),
        })
        .await
        .unwrap();
        let err = svc
            .execute(AuthorizeUserSession {
                token: token.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            authorize_user_session::ExecutionError::Revoked,
        ));

        // Repeated revocation is fine.
        svc.execute(RevokeUserSession { token }).await.unwrap();
    }
}
