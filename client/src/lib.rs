pub mod adapter;
pub mod client;

pub use adapter::{AdapterEvent, WagerAdapter, DEFAULT_CALL_TIMEOUT};
pub use client::Client;
pub use client::RetryPolicy;
use arcade_execution::GameError;
use arcade_types::{GameKind, ERROR_DEPOSIT_ALREADY_RECORDED, ERROR_INSUFFICIENT_BALANCE};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The house answered with an `{error}` body.
    #[error("rejected: {status}: {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("game error: {0}")]
    Game(#[from] GameError),
    #[error("game not open: {0}")]
    NotOpen(GameKind),
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Error::Rejected { message, .. } if message == ERROR_INSUFFICIENT_BALANCE)
    }

    pub fn is_duplicate_deposit(&self) -> bool {
        matches!(self, Error::Rejected { message, .. } if message == ERROR_DEPOSIT_ALREADY_RECORDED)
    }

    /// Whether the house definitely turned the request down. Anything else, including a bare
    /// 5xx from a proxy in front of it, leaves the fate of a write unknown.
    pub fn is_rejection(&self) -> bool {
        match self {
            Error::Rejected { .. } => true,
            Error::Failed(status) | Error::FailedWithBody { status, .. } => {
                status.is_client_error()
            }
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_only_house_answers_are_rejections() {
        assert!(Error::Rejected {
            status: StatusCode::PAYMENT_REQUIRED,
            message: ERROR_INSUFFICIENT_BALANCE.to_string(),
        }
        .is_rejection());
        assert!(Error::Failed(StatusCode::UNPROCESSABLE_ENTITY).is_rejection());

        // A gateway may have forwarded the request before giving up
        assert!(!Error::Failed(StatusCode::GATEWAY_TIMEOUT).is_rejection());
        assert!(!Error::FailedWithBody {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream connect error".to_string(),
        }
        .is_rejection());
        assert!(!Error::Timeout.is_rejection());
        assert!(!Error::UnexpectedResponse.is_rejection());
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use arcade_house::{Api, House, HouseConfig};
    use std::{net::SocketAddr, sync::Arc};
    use tokio::time::{sleep, Duration};

    pub struct TestServer {
        pub house: Arc<House>,
        pub base_url: String,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestServer {
        pub async fn start(config: HouseConfig) -> Self {
            let house = Arc::new(House::new(HouseConfig {
                allow_no_origin: true,
                http_rate_limit_per_second: None,
                http_rate_limit_burst: None,
                ..config
            }));
            let api = Api::new(house.clone());

            // Start server on random port
            let addr = SocketAddr::from(([127, 0, 0, 1], 0));
            let router = api.router();
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            let actual_addr = listener.local_addr().unwrap();
            let base_url = format!("http://{actual_addr}");

            let server_handle = tokio::spawn(async move {
                axum::serve(
                    listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .await
                .unwrap();
            });

            // Give server time to start
            sleep(Duration::from_millis(50)).await;

            Self {
                house,
                base_url,
                server_handle,
            }
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.server_handle.abort();
        }
    }
}
