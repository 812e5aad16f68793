use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use skrubb_waitlist::config::{CorsConfig, RateLimitConfig};
use skrubb_waitlist::waitlist::router::SUBMIT_PATH;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Per-address sliding-window limiter for the submission endpoint.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    config: RateLimitConfig,
    log: Arc<Mutex<HitLog>>,
}

#[derive(Default)]
struct HitLog {
    by_ip: HashMap<IpAddr, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl HitLog {
    /// Drop addresses with no hit inside the window, at most once per window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        let due = self
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= window);
        if !due {
            return;
        }
        self.by_ip.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        self.last_sweep = Some(now);
    }
}

impl RateLimiter {
    pub(crate) fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            log: Arc::new(Mutex::new(HitLog::default())),
        }
    }

    /// Record a hit, or return how long the caller should wait.
    pub(crate) fn check(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let window = self.config.window;
        let mut log = self
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        log.sweep(now, window);

        let hits = log.by_ip.entry(ip).or_default();
        while hits
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests as usize {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return Err(retry_after);
        }

        hits.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .by_ip
            .len()
    }
}

pub(crate) async fn rate_limit(
    State(limiter): State<RateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match connect_info {
        Some(ConnectInfo(addr)) if request.uri().path() == SUBMIT_PATH => addr.ip(),
        _ => return next.run(request).await,
    };

    match limiter.check(ip, Instant::now()) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            info!(%ip, "rate limit exceeded");
            let seconds = retry_after.as_secs().max(1).to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, seconds)],
                Json(json!({
                    "success": false,
                    "message": "Too many requests from this IP, please try again later.",
                })),
            )
                .into_response()
        }
    }
}

/// CORS for browser callers: only configured origins receive allow headers.
pub(crate) fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(window_secs),
            max_requests,
        })
    }

    #[test]
    fn allows_up_to_the_threshold_within_a_window() {
        let limiter = limiter(3, 60);
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4));
        let start = Instant::now();

        for offset in 0..3 {
            assert!(limiter.check(ip, start + Duration::from_secs(offset)).is_ok());
        }
        let retry = limiter
            .check(ip, start + Duration::from_secs(10))
            .expect_err("fourth hit is limited");
        assert_eq!(retry, Duration::from_secs(50));
    }

    #[test]
    fn window_slides_as_old_hits_expire() {
        let limiter = limiter(2, 60);
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 5));
        let start = Instant::now();

        assert!(limiter.check(ip, start).is_ok());
        assert!(limiter.check(ip, start + Duration::from_secs(30)).is_ok());
        assert!(limiter.check(ip, start + Duration::from_secs(45)).is_err());
        assert!(limiter.check(ip, start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn addresses_are_limited_independently() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter
            .check(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), now)
            .is_ok());
        assert!(limiter
            .check(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2)), now)
            .is_ok());
        assert!(limiter
            .check(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), now)
            .is_err());
    }

    #[test]
    fn idle_addresses_are_swept_once_per_window() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        for last in 1..=3 {
            let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, last));
            assert!(limiter.check(ip, start).is_ok());
        }
        assert_eq!(limiter.tracked(), 3);

        let active = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9));
        assert!(limiter.check(active, start + Duration::from_secs(30)).is_ok());
        assert_eq!(limiter.tracked(), 4, "no sweep before a window has passed");

        assert!(limiter.check(active, start + Duration::from_secs(61)).is_ok());
        assert_eq!(limiter.tracked(), 1, "only the active address survives");

        let late = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        assert!(limiter.check(late, start + Duration::from_secs(62)).is_ok());
        assert_eq!(limiter.tracked(), 2, "next sweep waits for another window");
    }
}
