use super::{AuthError, AuthRequest, AuthenticationStrategy, Principal};
use crate::errors::Violation;
use async_trait::async_trait;
use std::collections::HashMap;

/// Strategy backed by a fixed token → principal table.
///
/// Rejects unknown tokens, principals scoped to a different account than the
/// one in the path, and principals lacking a required permission. All three
/// are `AuthenticationFailed`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStrategy {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthenticationStrategy for StaticTokenStrategy {
    async fn authenticate(&self, request: AuthRequest) -> Result<Principal, AuthError> {
        let principal = self
            .tokens
            .get(&request.credential.token)
            .ok_or_else(AuthError::failed)?;

        if let (Some(scoped), Some(requested)) = (&principal.account_id, &request.account_id) {
            if scoped != requested {
                return Err(AuthError::failed().with_violation(Violation::new(
                    "account_id",
                    format!("account_id {requested} is not accessible with this credential"),
                )));
            }
        }

        if let Some(missing) = request
            .required_permissions
            .iter()
            .find(|p| !principal.has_permission(p))
        {
            return Err(AuthError::failed().with_violation(Violation::new(
                "permissions",
                format!("permissions missing '{missing}'"),
            )));
        }

        Ok(principal.clone())
    }
}
