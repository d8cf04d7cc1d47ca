/// Request rate limiting
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{MarketError, MarketResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide quotas: one for `/login`, one for everything else
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    login: Arc<DirectLimiter>,
    general: Arc<DirectLimiter>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let burst = non_zero(config.burst_size);

        let login_quota =
            Quota::per_second(non_zero(config.login_requests_per_second)).allow_burst(burst);
        let general_quota =
            Quota::per_second(non_zero(config.requests_per_second)).allow_burst(burst);

        Self {
            enabled: config.enabled,
            login: Arc::new(GovernorLimiter::direct(login_quota)),
            general: Arc::new(GovernorLimiter::direct(general_quota)),
            clock: DefaultClock::default(),
        }
    }

    pub fn check_login(&self) -> MarketResult<()> {
        self.check(&self.login)
    }

    pub fn check_general(&self) -> MarketResult<()> {
        self.check(&self.general)
    }

    fn check(&self, limiter: &DirectLimiter) -> MarketResult<()> {
        if !self.enabled {
            return Ok(());
        }

        limiter
            .check()
            .map_err(|not_until| MarketError::RateLimitExceeded {
                retry_after: not_until.wait_time_from(self.clock.now()),
            })
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, MarketError> {
    if request.uri().path() == "/login" {
        ctx.rate_limiter.check_login()?;
    } else {
        ctx.rate_limiter.check_general()?;
    }

    Ok(next.run(request).await)
}
