//! [`Command`] for authorizing a [`Session`] of a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`Session`] issued by the identity provider.
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db, N> Command<AuthorizeUserSession> for Service<Db, N>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        self.database()
            .execute(Select(By::<Option<User>, _>::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(session.user_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        Ok(session)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{operations::Insert, DateTime};
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{
        domain::{
            user::{self, session, Session},
            User,
        },
        infra::Database as _,
        Command as _,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    #[expect(unsafe_code, reason = "encoded right here")]
    fn token(user_id: user::Id, expires_in_secs: i64) -> session::Token {
        let session = Session {
            user_id,
            expires_at: DateTime::from_unix_timestamp(
                DateTime::now().unix_timestamp() + expires_in_secs,
            )
            .unwrap()
            .coerce(),
        };
        let raw = jsonwebtoken::encode(
            &Header::default(),
            &session,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        unsafe { session::Token::new_unchecked(raw) }
    }

    #[tokio::test]
    async fn authorizes_existing_user() {
        let svc = crate::spec::service();
        let user = User::new(user::Name::new("jane").unwrap());
        svc.database().execute(Insert(user.clone())).await.unwrap();

        let session = svc
            .execute(AuthorizeUserSession::from(token(user.id, 3600)))
            .await
            .unwrap();

        assert_eq!(session.user_id, user.id);
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let svc = crate::spec::service();
        let user = User::new(user::Name::new("jane").unwrap());
        svc.database().execute(Insert(user.clone())).await.unwrap();

        let err = svc
            .execute(AuthorizeUserSession::from(token(user.id, -3600)))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let svc = crate::spec::service();

        let err = svc
            .execute(AuthorizeUserSession::from(token(user::Id::new(), 3600)))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
    }
}
