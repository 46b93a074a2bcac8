//! Bearer credential extraction from the gateway handshake.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::AuthError;

/// The three places a client may put its token, captured at upgrade time and
/// from the first handshake frame.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// `auth.token` from the handshake frame.
    pub auth_field: Option<String>,
    /// `?token=` on the upgrade request.
    pub query: Option<String>,
    /// Token part of `Authorization: Bearer <token>`.
    pub header: Option<String>,
}

impl Credentials {
    /// Read the query and header sources from the upgrade request.
    pub fn from_request(query_token: Option<String>, headers: &HeaderMap) -> Self {
        Self {
            auth_field: None,
            query: query_token,
            header: bearer_token(headers),
        }
    }

    pub fn with_auth_field(mut self, token: Option<String>) -> Self {
        self.auth_field = token;
        self
    }

    /// Pick the credential by precedence: auth field, query, header.
    pub fn resolve(&self) -> Result<&str, AuthError> {
        [&self.auth_field, &self.query, &self.header]
            .into_iter()
            .filter_map(|source| source.as_deref())
            .find(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredential)
    }
}

/// Extract the second whitespace-separated part of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn auth_field_wins_over_query_and_header() {
        let creds = Credentials::from_request(Some("q".into()), &headers_with("Bearer h"))
            .with_auth_field(Some("a".into()));
        assert_eq!(creds.resolve().unwrap(), "a");
    }

    #[test]
    fn query_wins_over_header() {
        let creds = Credentials::from_request(Some("q".into()), &headers_with("Bearer h"));
        assert_eq!(creds.resolve().unwrap(), "q");
    }

    #[test]
    fn header_is_last_resort() {
        let creds = Credentials::from_request(None, &headers_with("Bearer h"));
        assert_eq!(creds.resolve().unwrap(), "h");
    }

    #[test]
    fn empty_sources_are_skipped() {
        let creds = Credentials::from_request(Some(String::new()), &headers_with("Bearer h"))
            .with_auth_field(Some(String::new()));
        assert_eq!(creds.resolve().unwrap(), "h");
    }

    #[test]
    fn missing_everywhere_is_missing_credential() {
        let creds = Credentials::from_request(None, &HeaderMap::new());
        assert_eq!(creds.resolve().unwrap_err(), AuthError::MissingCredential);
    }

    #[test]
    fn header_without_scheme_yields_nothing() {
        let creds = Credentials::from_request(None, &headers_with("justatoken"));
        assert_eq!(creds.resolve().unwrap_err(), AuthError::MissingCredential);
    }
}
