//! Credential Provider seam.
//!
//! Credential acquisition and refresh are owned by an external identity
//! provider. The sync core only looks up a bearer credential per account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::info;

/// A bearer credential for one mailbox.
#[derive(Clone)]
pub struct Credential {
    token: Arc<SecretString>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(SecretString::from(token.into())),
        }
    }

    /// Raw bearer token, for the HTTP Authorization header only.
    pub fn bearer(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Looks up the credential bound to an account.
///
/// `None` means the account is unauthenticated and the operator must run the
/// external authorization flow again.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_credential(&self, account: &str) -> Option<Credential>;
}

/// In-memory credential store, volatile for the process lifetime.
#[derive(Default)]
pub struct TokenStore {
    tokens: RwLock<HashMap<String, Credential>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store preloaded with `(account, token)` pairs.
    pub fn with_tokens(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|(account, token)| (account, Credential::new(token)))
            .collect();
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    /// Bind (or replace) the credential for an account.
    pub async fn bind(&self, account: &str, credential: Credential) {
        self.tokens
            .write()
            .await
            .insert(account.to_string(), credential);
        info!(account = %account, "Credential bound");
    }

    /// Number of accounts with a bound credential.
    pub async fn account_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl CredentialProvider for TokenStore {
    async fn get_credential(&self, account: &str) -> Option<Credential> {
        self.tokens.read().await.get(account).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_lookup() {
        let store = TokenStore::new();
        assert!(store.get_credential("a@example.com").await.is_none());

        store.bind("a@example.com", Credential::new("tok-1")).await;
        let cred = store.get_credential("a@example.com").await.unwrap();
        assert_eq!(cred.bearer(), "tok-1");
        assert_eq!(store.account_count().await, 1);
    }

    #[tokio::test]
    async fn lookup_is_case_sensitive() {
        let store = TokenStore::with_tokens([("a@example.com".to_string(), "t".to_string())]);
        assert!(store.get_credential("A@example.com").await.is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let cred = Credential::new("super-secret");
        assert!(!format!("{cred:?}").contains("super-secret"));
    }
}
