use axum::{
    extract::{DefaultBodyLimit, Request, State as AxumState},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use governor::middleware::NoOpMiddleware;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{House, HouseConfig};

mod http;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

pub struct Api {
    house: Arc<House>,
}

/// Which browser origins may call the house.
#[derive(Clone, Debug)]
struct OriginPolicy {
    allowed: Arc<HashSet<String>>,
    any: bool,
    /// Admit requests without an `Origin` header (bots, curl, server-side callers).
    no_origin: bool,
}

impl OriginPolicy {
    fn from_config(config: &HouseConfig) -> Self {
        let allowed: HashSet<String> = config
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if allowed.is_empty() {
            tracing::warn!("no allowed origins configured; browser requests will be rejected");
        }
        Self {
            any: allowed.contains("*"),
            allowed: Arc::new(allowed),
            no_origin: config.allow_no_origin,
        }
    }

    fn admits(&self, origin: Option<&str>) -> Result<(), &'static str> {
        match origin {
            Some(origin) if self.any || self.allowed.contains(origin) => Ok(()),
            Some(_) => Err("Origin not allowed"),
            None if self.no_origin => Ok(()),
            None => Err("Origin required"),
        }
    }

    fn cors(&self) -> CorsLayer {
        let cors = if self.any {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            let origins = self
                .allowed
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "ignoring invalid allowed origin");
                        None
                    }
                })
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        };
        cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, REQUEST_ID])
            .expose_headers([REQUEST_ID])
    }
}

/// Per-IP limiter, when both the rate and the burst are set.
fn rate_limit(config: &HouseConfig) -> Option<Arc<IpGovernorConfig>> {
    let (Some(per_second), Some(burst)) = (
        config.http_rate_limit_per_second,
        config.http_rate_limit_burst,
    ) else {
        return None;
    };
    if per_second == 0 || burst == 0 {
        return None;
    }
    let period = Duration::from_nanos((1_000_000_000u64 / per_second).max(1));
    let limiter = GovernorConfigBuilder::default()
        .period(period)
        .burst_size(burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish();
    if limiter.is_none() {
        tracing::warn!(per_second, burst, "invalid rate limit; requests are not limited");
    }
    limiter.map(Arc::new)
}

impl Api {
    pub fn new(house: Arc<House>) -> Self {
        Self { house }
    }

    pub fn router(&self) -> Router {
        let config = &self.house.config;
        let origins = OriginPolicy::from_config(config);
        let cors = origins.cors();

        let router = Router::new()
            .route("/healthz", get(http::healthz))
            .route("/config", get(http::config))
            .route("/metrics", get(http::metrics))
            .route("/balance", get(http::balance))
            .route("/wagers", get(http::wagers))
            .route("/bet", post(http::place_bet))
            .route("/guess", post(http::guess))
            .route("/win", post(http::report_outcome))
            .route("/deposit", post(http::record_deposit))
            .route("/withdraw", post(http::request_withdrawal));

        let router = match rate_limit(config) {
            Some(config) => router.layer(GovernorLayer { config }),
            None => router,
        };

        let router = router.layer(cors);
        let router = router.layer(middleware::from_fn(move |req, next| {
            let origins = origins.clone();
            async move { enforce_origin(origins, req, next).await }
        }));
        let router = match config.http_body_limit_bytes {
            Some(limit) if limit > 0 => router.layer(DefaultBodyLimit::max(limit)),
            _ => router,
        };
        let router = router.layer(middleware::from_fn_with_state(
            self.house.clone(),
            observe_request,
        ));
        let router = router.layer(TraceLayer::new_for_http());

        router.with_state(self.house.clone())
    }
}

async fn enforce_origin(origins: OriginPolicy, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    if let Err(reason) = origins.admits(origin) {
        return (StatusCode::FORBIDDEN, reason).into_response();
    }
    next.run(req).await
}

/// Tags every response with a request id, counts rejections and logs one line per request.
async fn observe_request(
    AxumState(house): AxumState<Arc<House>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    house.http_metrics().observe(response.status());
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID, header_value);
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}
