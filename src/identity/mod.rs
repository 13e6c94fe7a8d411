//! Identity Provider - external authentication and sessions, consumed
//! through a trait so the service never touches credentials itself.
//!
//! The in-memory implementation backs tests and single-node
//! deployments; production points the same trait at the hosted
//! provider the login relay forwards to.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account already exists for this email")]
    EmailTaken,
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// A stable, opaque user identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Bearer session returned on login.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_in(&self, email: &str, password: &str)
        -> Result<(AuthUser, Session), AuthError>;

    /// Resolve a bearer token to its user, if the session is live.
    async fn current_user(&self, access_token: &str) -> Option<AuthUser>;

    async fn sign_out(&self, access_token: &str);
}

struct Account {
    user: AuthUser,
    password_hash: [u8; 32],
}

/// In-memory identity provider with hashed credentials and expiring
/// bearer sessions.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, Session>>,
    session_ttl_hours: i64,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        MemoryIdentity {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            session_ttl_hours: 24,
        }
    }

    fn hash_password(password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password_hash: Self::hash_password(password),
            },
        );
        Ok(user)
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(AuthUser, Session), AuthError> {
        let accounts = self.accounts.read().await;
        let account = accounts.get(email).ok_or(AuthError::InvalidCredentials)?;
        if account.password_hash != Self::hash_password(password) {
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            user_id: account.user.id.clone(),
            expires_at: Utc::now() + Duration::hours(self.session_ttl_hours.max(1)),
        };
        let user = account.user.clone();
        drop(accounts);

        self.sessions
            .write()
            .await
            .insert(session.access_token.clone(), session.clone());
        Ok((user, session))
    }

    async fn current_user(&self, access_token: &str) -> Option<AuthUser> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(access_token)?;
        if session.expires_at < Utc::now() {
            return None;
        }
        let user_id = session.user_id.clone();
        drop(sessions);

        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    async fn sign_out(&self, access_token: &str) {
        self.sessions.write().await.remove(access_token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let identity = MemoryIdentity::new();
        let user = identity.sign_up("a@example.com", "secret").await.unwrap();

        let (signed_in, session) = identity.sign_in("a@example.com", "secret").await.unwrap();
        assert_eq!(signed_in.id, user.id);
        assert_eq!(session.user_id, user.id);

        let current = identity.current_user(&session.access_token).await.unwrap();
        assert_eq!(current.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_rejected() {
        let identity = MemoryIdentity::new();
        identity.sign_up("a@example.com", "secret").await.unwrap();

        let err = identity.sign_in("a@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let identity = MemoryIdentity::new();
        identity.sign_up("a@example.com", "one").await.unwrap();
        let err = identity.sign_up("a@example.com", "two").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn sign_out_invalidates_session() {
        let identity = MemoryIdentity::new();
        identity.sign_up("a@example.com", "secret").await.unwrap();
        let (_, session) = identity.sign_in("a@example.com", "secret").await.unwrap();

        identity.sign_out(&session.access_token).await;
        assert!(identity.current_user(&session.access_token).await.is_none());
    }
}
