//! # Security Module
//!
//! The authenticator gate sits in front of every route that declares an
//! `authentication` reference. It resolves the request's credential, hands it
//! to the named [`AuthenticationStrategy`] and either attaches the returned
//! [`Principal`] or short-circuits the pipeline.
//!
//! ## Credential extraction
//!
//! 1. `Authorization: Bearer <token>` uses the token as-is.
//! 2. `Authorization: ClientBearer <payload>` decodes the base64 JSON payload
//!    and uses its inner `token` field.
//! 3. Without an `Authorization` header, the route's `token_parameter`
//!    (default `access_token`) is read from the query or body.
//!
//! Any other scheme is rejected with `InvalidAuthenticationScheme` before a
//! strategy is consulted; an undecodable client-bearer payload is rejected
//! with `InvalidClientBearerToken`.
//!
//! ## Strategies
//!
//! Strategies are registered by name in [`AuthStrategies`]. Errors they return
//! are propagated verbatim; the gate never reinterprets them and never caches
//! results.
//!
//! ```rust,ignore
//! let mut strategies = AuthStrategies::new();
//! strategies.register("default", StaticTokenStrategy::new().token("token123", Principal::new("alice")));
//! let gate = AuthGate::new(strategies);
//! ```

mod credentials;
mod static_token;

pub use credentials::{
    decode_client_bearer, extract_credential, parse_authorization, Credential, CredentialScheme,
    BEARER_SCHEME, CLIENT_BEARER_SCHEME,
};
pub use static_token::StaticTokenStrategy;

use crate::envelope::{HeaderVec, ResponseEnvelope};
use crate::errors::{ErrorCode, Violation};
use crate::router::ParamVec;
use crate::spec::AuthSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    /// Account the identity is scoped to, if any.
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            account_id: None,
            permissions: Vec::new(),
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// What a strategy receives.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub credential: Credential,
    /// Path-bound account identifier, when the route has one.
    pub account_id: Option<String>,
    pub required_permissions: Vec<String>,
}

/// Structured rejection from the gate or a strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("authentication rejected: {code}")]
pub struct AuthError {
    pub code: ErrorCode,
    pub violations: Vec<Violation>,
    pub debug_info: Option<String>,
}

impl AuthError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            violations: Vec::new(),
            debug_info: None,
        }
    }

    pub fn failed() -> Self {
        Self::new(ErrorCode::AuthenticationFailed)
    }

    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.violations.push(violation);
        self
    }

    pub fn into_envelope(self) -> ResponseEnvelope {
        let mut envelope = ResponseEnvelope::error(self.code).with_violations(self.violations);
        envelope.debug_info = self.debug_info;
        envelope
    }
}

#[async_trait]
pub trait AuthenticationStrategy: Send + Sync {
    async fn authenticate(&self, request: AuthRequest) -> Result<Principal, AuthError>;
}

/// Strategies by name.
#[derive(Clone, Default)]
pub struct AuthStrategies {
    strategies: HashMap<String, Arc<dyn AuthenticationStrategy>>,
}

impl AuthStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S>(&mut self, name: impl Into<String>, strategy: S)
    where
        S: AuthenticationStrategy + 'static,
    {
        self.register_arc(name, Arc::new(strategy));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, strategy: Arc<dyn AuthenticationStrategy>) {
        let name = name.into();
        info!(strategy = %name, "Authentication strategy registered");
        self.strategies.insert(name, strategy);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthenticationStrategy>> {
        self.strategies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Outcome of the authenticator gate for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The route declares no authentication.
    NotRequired,
    Authenticated(Principal),
    Rejected(AuthError),
}

/// Borrowed view of the request parts the gate reads.
pub struct AuthInput<'a> {
    pub headers: &'a HeaderVec,
    pub params: &'a Map<String, Value>,
    pub path_params: &'a ParamVec,
    pub required_permissions: &'a [String],
}

#[derive(Clone, Default)]
pub struct AuthGate {
    strategies: AuthStrategies,
}

impl AuthGate {
    pub fn new(strategies: AuthStrategies) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &AuthStrategies {
        &self.strategies
    }

    pub async fn authenticate(&self, spec: Option<&AuthSpec>, input: AuthInput<'_>) -> AuthOutcome {
        let Some(spec) = spec else {
            return AuthOutcome::NotRequired;
        };

        let credential = match extract_credential(input.headers, input.params, &spec.token_parameter) {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                debug!(auth = %spec.name, "No credential presented");
                return AuthOutcome::Rejected(AuthError::failed());
            }
            Err(code) => {
                warn!(auth = %spec.name, code = %code, "Credential rejected before strategy");
                return AuthOutcome::Rejected(AuthError::new(code));
            }
        };

        let Some(strategy) = self.strategies.get(&spec.strategy) else {
            error!(strategy = %spec.strategy, auth = %spec.name, "Authentication strategy not registered");
            let mut err = AuthError::new(ErrorCode::InternalError);
            err.debug_info = Some(format!(
                "authentication strategy '{}' is not registered",
                spec.strategy
            ));
            return AuthOutcome::Rejected(err);
        };

        let account_id = input
            .path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == spec.account_parameter)
            .map(|(_, v)| v.clone());

        let request = AuthRequest {
            credential,
            account_id,
            required_permissions: input.required_permissions.to_vec(),
        };
        debug!(
            strategy = %spec.strategy,
            scheme = ?request.credential.scheme,
            account_id = ?request.account_id,
            "Dispatching credential to strategy"
        );

        match strategy.authenticate(request).await {
            Ok(principal) => {
                debug!(subject = %principal.subject, "Authenticated");
                AuthOutcome::Authenticated(principal)
            }
            Err(e) => {
                warn!(strategy = %spec.strategy, code = %e.code, "Authentication failed");
                AuthOutcome::Rejected(e)
            }
        }
    }
}
