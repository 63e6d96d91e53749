//! Per-client sliding-window rate limiter.
//!
//! Each `(client, budget)` pair keeps the instants of its admitted requests
//! within the last window. A request is admitted while fewer than `limit`
//! instants remain; otherwise it is rejected with the time until the oldest
//! one leaves the window.
//!
//! Clients with nothing inside the window are swept out at most once per
//! window, on whichever check comes first after it elapses.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Which allowance a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Budget {
    Single,
    Bulk,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Rate limit exceeded; retry in {}s", retry_after_secs(*.retry_after))]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Whole seconds to wait, rounded up, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        retry_after_secs(self.retry_after)
    }
}

fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

#[derive(Default)]
struct Log {
    admitted: HashMap<(IpAddr, Budget), VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Log {
    fn sweep(&mut self, now: Instant, window: Duration) {
        let before = self.admitted.len();
        self.admitted.retain(|_, admitted| {
            admitted
                .back()
                .is_some_and(|&last| now.saturating_duration_since(last) < window)
        });
        self.last_sweep = Some(now);
        let dropped = before - self.admitted.len();
        if dropped > 0 {
            log::debug!("rate limiter forgot {dropped} idle clients");
        }
    }
}

pub struct RateLimiter {
    single: u32,
    bulk: u32,
    window: Duration,
    log: Mutex<Log>,
}

impl RateLimiter {
    pub fn new(single: u32, bulk: u32, window: Duration) -> Self {
        Self {
            single,
            bulk,
            window,
            log: Mutex::new(Log::default()),
        }
    }

    pub fn limit(&self, budget: Budget) -> u32 {
        match budget {
            Budget::Single => self.single,
            Budget::Bulk => self.bulk,
        }
    }

    /// Admit or reject a request from `client` now.
    pub fn check(&self, client: IpAddr, budget: Budget) -> Result<(), RateLimitExceeded> {
        self.check_at(client, budget, Instant::now())
    }

    /// Admit or reject a request from `client` at `now`.
    pub fn check_at(
        &self,
        client: IpAddr,
        budget: Budget,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let limit = self.limit(budget) as usize;
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if log
            .last_sweep
            .is_none_or(|last| now.saturating_duration_since(last) >= self.window)
        {
            log.sweep(now, self.window);
        }
        let admitted = log.admitted.entry((client, budget)).or_default();
        while let Some(&oldest) = admitted.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
        if admitted.len() >= limit {
            let oldest = admitted.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            log::info!("rate limited {client} ({budget:?}), retry in {retry_after:?}");
            return Err(RateLimitExceeded { retry_after });
        }
        admitted.push_back(now);
        Ok(())
    }

    /// Forget clients with no request inside the window.
    pub fn prune(&self, now: Instant) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sweep(now, self.window);
    }

    /// Number of `(client, budget)` pairs currently tracked.
    pub fn tracked(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admitted
            .len()
    }
}
