//! TCP listener setup.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

/// Bind `addr`. If the port is taken, wait `retry_after` and try exactly once
/// more; any other error, or a second failure, is returned as is.
pub async fn bind_with_retry(addr: SocketAddr, retry_after: Duration) -> io::Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            tracing::warn!(
                %addr,
                retry_secs = retry_after.as_secs_f64(),
                "specified port unavailable, retrying"
            );
            tokio::time::sleep(retry_after).await;
            TcpListener::bind(addr).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_free_port_immediately() {
        let listener = bind_with_retry("127.0.0.1:0".parse().unwrap(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn retries_once_after_port_frees_up() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = holder.local_addr().unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(holder);
        });

        let listener = bind_with_retry(addr, Duration::from_millis(300)).await.unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn gives_up_after_single_retry() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = holder.local_addr().unwrap();

        let err = bind_with_retry(addr, Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
        drop(holder);
    }
}
