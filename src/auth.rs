//! Authentication seam
//!
//! Token validation belongs to an external identity provider; the pipelines
//! only need the validated identity and the roles it holds for this client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::AuthError;

/// Identity attached to a validated bearer token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user: String,
    /// Realm-wide roles
    #[serde(default)]
    pub realm_roles: Vec<String>,
    /// client id -> roles granted for that client
    #[serde(default)]
    pub client_roles: BTreeMap<String, Vec<String>>,
}

impl AuthContext {
    /// Roles the user holds for `client_id`; empty when none were granted
    pub fn roles_for_client(&self, client_id: &str) -> Vec<String> {
        self.client_roles.get(client_id).cloned().unwrap_or_default()
    }
}

/// Validates bearer tokens
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError>;
}

/// Validator with a fixed token table, for development and tests
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, AuthContext>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, context: AuthContext) -> Self {
        self.tokens.insert(token.into(), context);
        self
    }

    /// Load a `token: {user, realmRoles, clientRoles}` table from YAML
    pub fn load_from_file(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))?;
        let tokens: HashMap<String, AuthContext> =
            serde_yaml::from_str(&content).map_err(|e| AuthError::Config(e.to_string()))?;
        Ok(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}
