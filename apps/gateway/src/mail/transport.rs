//! Outbound mail delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MailError;

/// A message as handed to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers a single message. Implementations must not retry internally;
/// the scheduler retries on its next tick.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Clone)]
pub struct HttpRelayTransport {
    url: String,
    http: reqwest::Client,
}

impl HttpRelayTransport {
    /// Every request, connect included, is abandoned after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            http,
        })
    }
}

#[async_trait]
impl MailTransport for HttpRelayTransport {
    async fn send(&self, envelope: &Envelope) -> Result<(), MailError> {
        let resp = self.http.post(&self.url).json(envelope).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    fn envelope() -> Envelope {
        Envelope {
            from: "admin@example.com".into(),
            to: "x@example.com".into(),
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
        }
    }

    async fn relay(status: StatusCode) -> String {
        let app = Router::new().route(
            "/send",
            post(move |Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["to"], "x@example.com");
                (status, "relay says no")
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/send")
    }

    #[tokio::test]
    async fn accepted_by_relay() {
        let url = relay(StatusCode::OK).await;
        let transport = HttpRelayTransport::new(&url, Duration::from_secs(5)).unwrap();
        transport.send(&envelope()).await.unwrap();
    }

    #[tokio::test]
    async fn error_status_is_rejected() {
        let url = relay(StatusCode::INTERNAL_SERVER_ERROR).await;
        let transport = HttpRelayTransport::new(&url, Duration::from_secs(5)).unwrap();

        let err = transport.send(&envelope()).await.unwrap_err();
        match err {
            MailError::Rejected(reason) => assert!(reason.contains("relay says no")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_relay_times_out() {
        // Accepts the connection and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport =
            HttpRelayTransport::new(&format!("http://{addr}/send"), Duration::from_millis(200))
                .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), transport.send(&envelope()))
            .await
            .expect("relay request must not hang")
            .unwrap_err();

        match err {
            MailError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
