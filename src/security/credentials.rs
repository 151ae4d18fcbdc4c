use crate::envelope::{HeaderVec, HeaderVecExt};
use crate::errors::ErrorCode;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};
use tracing::debug;

pub const BEARER_SCHEME: &str = "Bearer";
pub const CLIENT_BEARER_SCHEME: &str = "ClientBearer";

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: ClientBearer <base64 payload>`; the token is the
    /// payload's inner `token` field.
    ClientBearer,
    /// Query/body fallback parameter.
    Parameter,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: CredentialScheme,
    pub token: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Parse an `Authorization` header value into a credential.
///
/// An unknown scheme, or a header without a token part, is
/// `InvalidAuthenticationScheme`; a client-bearer payload that does not decode
/// is `InvalidClientBearerToken`.
pub fn parse_authorization(header: &str) -> Result<Credential, ErrorCode> {
    let mut parts = header.trim().splitn(2, char::is_whitespace);
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        debug!(scheme = %scheme, "Authorization header without token");
        return Err(ErrorCode::InvalidAuthenticationScheme);
    }

    if scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        Ok(Credential {
            scheme: CredentialScheme::Bearer,
            token: token.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case(CLIENT_BEARER_SCHEME) {
        let inner = decode_client_bearer(token).ok_or(ErrorCode::InvalidClientBearerToken)?;
        Ok(Credential {
            scheme: CredentialScheme::ClientBearer,
            token: inner,
        })
    } else {
        debug!(scheme = %scheme, "Unrecognized authentication scheme");
        Err(ErrorCode::InvalidAuthenticationScheme)
    }
}

/// Decode a client-bearer payload: base64 (standard or URL-safe, padding
/// optional) of a JSON object with a non-empty string `token` field.
pub fn decode_client_bearer(payload: &str) -> Option<String> {
    let engines = [
        &general_purpose::STANDARD,
        &general_purpose::STANDARD_NO_PAD,
        &general_purpose::URL_SAFE,
        &general_purpose::URL_SAFE_NO_PAD,
    ];
    let bytes = engines.iter().find_map(|engine| engine.decode(payload).ok())?;
    let json: Value = serde_json::from_slice(&bytes).ok()?;
    json.get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolve the request's credential: the `Authorization` header first, then
/// the `token_parameter` request parameter. `Ok(None)` means no credential
/// was presented at all.
pub fn extract_credential(
    headers: &HeaderVec,
    params: &Map<String, Value>,
    token_parameter: &str,
) -> Result<Option<Credential>, ErrorCode> {
    if let Some(header) = headers.get_header("authorization") {
        return parse_authorization(header).map(Some);
    }
    let token = params
        .get(token_parameter)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    Ok(token.map(|t| Credential {
        scheme: CredentialScheme::Parameter,
        token: t.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bearer_token_is_taken_verbatim() {
        let c = parse_authorization("Bearer token123").unwrap();
        assert_eq!(c.scheme, CredentialScheme::Bearer);
        assert_eq!(c.token, "token123");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert_eq!(
            parse_authorization("Foo token123").unwrap_err(),
            ErrorCode::InvalidAuthenticationScheme
        );
        assert_eq!(
            parse_authorization("Bearer").unwrap_err(),
            ErrorCode::InvalidAuthenticationScheme
        );
    }

    #[test]
    fn client_bearer_yields_inner_token() {
        let payload = general_purpose::STANDARD.encode(r#"{"token":"inner-1","client":"web"}"#);
        let c = parse_authorization(&format!("ClientBearer {payload}")).unwrap();
        assert_eq!(c.scheme, CredentialScheme::ClientBearer);
        assert_eq!(c.token, "inner-1");

        let unpadded = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"token":"inner-2"}"#);
        assert_eq!(decode_client_bearer(&unpadded).as_deref(), Some("inner-2"));
    }

    #[test]
    fn malformed_client_bearer_is_distinct_error() {
        assert_eq!(
            parse_authorization("ClientBearer %%%").unwrap_err(),
            ErrorCode::InvalidClientBearerToken
        );
        let no_token = general_purpose::STANDARD.encode(r#"{"client":"web"}"#);
        assert_eq!(
            parse_authorization(&format!("ClientBearer {no_token}")).unwrap_err(),
            ErrorCode::InvalidClientBearerToken
        );
    }

    #[test]
    fn query_parameter_is_the_fallback() {
        let params = json!({"access_token": "q-1"});
        let params = params.as_object().unwrap();
        let c = extract_credential(&HeaderVec::new(), params, "access_token")
            .unwrap()
            .unwrap();
        assert_eq!(c.scheme, CredentialScheme::Parameter);
        assert_eq!(c.token, "q-1");

        assert!(extract_credential(&HeaderVec::new(), &Map::new(), "access_token")
            .unwrap()
            .is_none());
    }
}
