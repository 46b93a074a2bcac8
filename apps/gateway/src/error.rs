//! Error types shared across the gateway, stores, and mail scheduler.

use thiserror::Error;

use crate::gateway::connection::ConnectionState;

/// Handshake rejection. Both variants are terminal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential in the handshake auth field, query, or header.
    #[error("Authentication error: No token")]
    MissingCredential,
    /// A credential was found but failed verification.
    #[error("Authentication error: Invalid token")]
    InvalidCredential(String),
}

impl AuthError {
    /// WebSocket close code sent with the rejection.
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::MissingCredential => 4003,
            AuthError::InvalidCredential(_) => 4004,
        }
    }
}

/// Why a connection could not be brought online.
///
/// Credential problems are reported to the client as is; a lifecycle error
/// means the gateway itself drove the connection out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ConnectError {
    /// WebSocket close code: the credential codes for auth failures,
    /// protocol error (4000) otherwise.
    pub fn close_code(&self) -> u16 {
        match self {
            ConnectError::Auth(e) => e.close_code(),
            ConnectError::Lifecycle(_) => 4000,
        }
    }
}

/// Failure talking to the durable or ephemeral store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure handing a message to the mail transport.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message: {0}")]
    Rejected(String),
}

/// Failure reported by the media capability hook.
#[derive(Debug, Error)]
#[error("media initialization failed: {0}")]
pub struct MediaError(pub String);

/// Attempted an illegal connection state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("connection cannot move from {from:?} to {to:?}")]
pub struct LifecycleError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_have_distinct_reasons_and_codes() {
        let missing = AuthError::MissingCredential;
        let invalid = AuthError::InvalidCredential("bad signature".into());

        assert_eq!(missing.to_string(), "Authentication error: No token");
        assert_eq!(invalid.to_string(), "Authentication error: Invalid token");
        assert_ne!(missing.close_code(), invalid.close_code());
    }

    #[test]
    fn lifecycle_errors_are_not_reported_as_bad_credentials() {
        let err = ConnectError::from(LifecycleError {
            from: ConnectionState::Active,
            to: ConnectionState::Authenticating,
        });

        assert_eq!(err.close_code(), 4000);
        assert!(!err.to_string().starts_with("Authentication error"));
        assert_eq!(
            ConnectError::from(AuthError::MissingCredential).close_code(),
            4003
        );
    }
}
