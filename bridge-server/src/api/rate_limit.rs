//! Fixed-window rate limiting per client IP and route class

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::ProblemDetails;
use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Webhook,
    CopyTrade,
    Api,
}

#[derive(Debug, Clone, Copy)]
struct Limit {
    max: u32,
    window: Duration,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    limits: HashMap<RouteClass, Limit>,
    windows: Mutex<HashMap<(IpAddr, RouteClass), Window>>,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let minute = Duration::from_secs(60);
        let hour = Duration::from_secs(3600);
        let limits = HashMap::from([
            (
                RouteClass::Webhook,
                Limit {
                    max: config.webhook_per_minute,
                    window: minute,
                },
            ),
            (
                RouteClass::CopyTrade,
                Limit {
                    max: config.copy_trade_per_minute,
                    window: minute,
                },
            ),
            (
                RouteClass::Api,
                Limit {
                    max: config.api_per_hour,
                    window: hour,
                },
            ),
        ]);
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request. `Err` carries the time left in the current window.
    pub fn check(&self, ip: IpAddr, class: RouteClass) -> Result<(), Duration> {
        self.check_at(ip, class, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, class: RouteClass, now: Instant) -> Result<(), Duration> {
        let Some(limit) = self.limits.get(&class).copied() else {
            return Ok(());
        };

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Expired windows of other clients are dropped as we go
        windows.retain(|(_, c), w| {
            let window = self.limits.get(c).map_or(limit.window, |l| l.window);
            now.duration_since(w.started) < window
        });

        let window = windows.entry((ip, class)).or_insert(Window {
            started: now,
            count: 0,
        });
        if window.count >= limit.max {
            return Err(limit.window.saturating_sub(now.duration_since(window.started)));
        }
        window.count += 1;
        Ok(())
    }
}

/// Client address from the connection, or loopback when unavailable (tests)
pub(crate) fn client_ip(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Middleware; state is the shared limiter and the class of the routes it wraps
pub async fn rate_limit(
    State((limiter, class)): State<(Arc<RateLimiter>, RouteClass)>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    match limiter.check(ip, class) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(ip = %ip, class = ?class, path = %request.uri().path(), "Rate limit exceeded");
            ProblemDetails::too_many_requests(retry_after.as_secs().max(1)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(webhook_per_minute: u32) -> RateLimiter {
        RateLimiter::from_config(&RateLimitConfig {
            webhook_per_minute,
            copy_trade_per_minute: 100,
            api_per_hour: 100,
        })
    }

    #[test]
    fn test_limit_per_ip_and_class() {
        let limiter = limiter(2);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let now = Instant::now();

        assert!(limiter.check_at(a, RouteClass::Webhook, now).is_ok());
        assert!(limiter.check_at(a, RouteClass::Webhook, now).is_ok());
        assert!(limiter.check_at(a, RouteClass::Webhook, now).is_err());

        // Other clients and other classes have their own windows
        assert!(limiter.check_at(b, RouteClass::Webhook, now).is_ok());
        assert!(limiter.check_at(a, RouteClass::CopyTrade, now).is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(ip, RouteClass::Webhook, start).is_ok());
        let retry = limiter
            .check_at(ip, RouteClass::Webhook, start + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(40));

        assert!(limiter
            .check_at(ip, RouteClass::Webhook, start + Duration::from_secs(61))
            .is_ok());
    }
}
