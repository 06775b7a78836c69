use crate::{Error, Result};
use arcade_types::{
    BalancesResponse, DepositRequest, DepositResponse, ErrorResponse, GuessRequest, GuessResponse,
    PlaceBetRequest, PlaceBetResponse, ReportOutcomeRequest, ReportOutcomeResponse,
    WagerHistoryResponse, WalletAddress, WithdrawalRequest, WithdrawalResponse,
};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

/// Timeout for connections and requests
const TIMEOUT: Duration = Duration::from_secs(10);

/// Retry policy for transient HTTP failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether non-idempotent requests (e.g., POST) may be retried.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

/// Wager protocol client
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub http_client: HttpClient,

    retry_policy: RetryPolicy,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            http_client,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Returns a copy of the current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Sets the retry policy for subsequent HTTP requests.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Returns a new client with the provided retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Liveness of the house.
    pub async fn healthz(&self) -> Result<bool> {
        let url = self.base_url.join("healthz")?;
        let response = self.get_with_retry(url).await?;
        Ok(response.status().is_success())
    }

    /// Every balance held by `wallet`.
    pub async fn balances(&self, wallet: &WalletAddress) -> Result<BalancesResponse> {
        let mut url = self.base_url.join("balance")?;
        url.query_pairs_mut().append_pair("wallet", wallet.as_str());
        self.get_json(url).await
    }

    /// Debit a stake and open a round.
    pub async fn place_bet(&self, request: &PlaceBetRequest) -> Result<PlaceBetResponse> {
        self.post_json("bet", request).await
    }

    /// Draw the next card of an open card streak.
    pub async fn guess(&self, request: &GuessRequest) -> Result<GuessResponse> {
        self.post_json("guess", request).await
    }

    /// Report the outcome of a round and receive its settlement.
    pub async fn report_outcome(
        &self,
        request: &ReportOutcomeRequest,
    ) -> Result<ReportOutcomeResponse> {
        self.post_json("win", request).await
    }

    pub async fn record_deposit(&self, request: &DepositRequest) -> Result<DepositResponse> {
        self.post_json("deposit", request).await
    }

    pub async fn request_withdrawal(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse> {
        self.post_json("withdraw", request).await
    }

    /// Settled wagers for `wallet`, newest first.
    pub async fn wager_history(
        &self,
        wallet: &WalletAddress,
        limit: Option<usize>,
    ) -> Result<WagerHistoryResponse> {
        let mut url = self.base_url.join("wagers")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("wallet", wallet.as_str());
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get_with_retry(url).await?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        debug!("Posting to {}", url);
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                self.http_client.post(url.clone()).json(body)
            })
            .await?;
        decode(response).await
    }

    async fn get_with_retry(&self, url: Url) -> Result<reqwest::Response> {
        self.send_with_retry(reqwest::Method::GET, || self.http_client.get(url.clone()))
            .await
    }

    async fn send_with_retry(
        &self,
        method: reqwest::Method,
        make_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let max_attempts =
            if method == reqwest::Method::GET || self.retry_policy.retry_non_idempotent {
                self.retry_policy.max_attempts.max(1)
            } else {
                1
            };

        let mut attempt = 0usize;
        let mut backoff = self.retry_policy.initial_backoff;
        loop {
            attempt += 1;
            let result = make_request().send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(Error::Reqwest(err));
                    }
                }
            }

            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = std::cmp::min(backoff.saturating_mul(2), self.retry_policy.max_backoff);
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await?;
        return serde_json::from_slice(&body).map_err(|_| Error::UnexpectedResponse);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) => Err(Error::Rejected {
            status,
            message: error.error,
        }),
        Err(_) if body.is_empty() => Err(Error::Failed(status)),
        Err(_) => Err(Error::FailedWithBody { status, body }),
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
