use std::time::Duration;

/// Secret used when `AUTH_SECRET` is not set. Fine for local development only.
pub const DEFAULT_AUTH_SECRET: &str = "jwt-default-secret";

/// How often the mail scheduler drains the unsent queue.
pub const MAIL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before the single re-listen attempt after an address-in-use error.
pub const LISTEN_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Upper bound on one mail relay request, so a hung relay cannot hold the
/// drain forever.
pub const MAIL_RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Time a new socket has to send its handshake frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Shared HMAC secret for verifying bearer tokens.
    pub auth_secret: String,
    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    /// Allowed CORS origin for the browser client.
    pub frontend_url: Option<String>,
    /// Reported at startup.
    pub app_version: String,
    pub mail: MailConfig,
}

/// Outbound mail settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Whether the mail scheduler runs at all.
    pub enabled: bool,
    /// HTTP relay that performs the actual delivery.
    pub relay_url: Option<String>,
    /// Sender used for queued messages without one.
    pub default_from: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            auth_secret: optional_var("AUTH_SECRET")
                .unwrap_or_else(|| DEFAULT_AUTH_SECRET.to_string()),
            database_url: optional_var("DATABASE_URL"),
            frontend_url: optional_var("FRONTEND_URL"),
            app_version: optional_var("APP_VERSION").unwrap_or_else(|| "2.9.1".to_string()),
            mail: MailConfig {
                enabled: std::env::var("MAIL_ENABLED").is_ok_and(|v| v == "true"),
                relay_url: optional_var("MAIL_RELAY_URL"),
                default_from: optional_var("MAIL_FROM")
                    .unwrap_or_else(|| "admin@example.com".to_string()),
            },
        }
    }

    /// True when the shared secret is still the development default.
    pub fn uses_default_secret(&self) -> bool {
        self.auth_secret == DEFAULT_AUTH_SECRET
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_secret_is_detected() {
        let config = Config {
            port: 4000,
            auth_secret: DEFAULT_AUTH_SECRET.to_string(),
            database_url: None,
            frontend_url: None,
            app_version: "test".to_string(),
            mail: MailConfig {
                enabled: false,
                relay_url: None,
                default_from: "admin@example.com".to_string(),
            },
        };
        assert!(config.uses_default_secret());

        let config = Config {
            auth_secret: "something-else".to_string(),
            ..config
        };
        assert!(!config.uses_default_secret());
    }
}
