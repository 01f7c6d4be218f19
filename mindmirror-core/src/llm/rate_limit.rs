//! Dual sliding-window quota for outbound generative calls.
//!
//! One [`RateLimitedGate`] exists per credential and is shared (via `Arc`)
//! by every invoker. [`RateLimitedGate::acquire`] blocks the calling thread
//! until both the request window and the token window have headroom.
//!
//! # Algorithm
//!
//! - **Requests:** timestamps of admitted calls are kept in a queue; entries
//!   older than the window are expired on every check. A call is admitted
//!   when fewer than `requests_per_window` timestamps remain.
//! - **Tokens:** a running counter that resets once the window length has
//!   passed since it was last reset. A call is admitted when its estimate
//!   fits in what is left.
//!
//! Waiting always happens with the lock released; the waiter re-locks and
//! re-validates on wake because other threads may have taken the freed
//! capacity. Admission order across waiters is not FIFO.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Extra sleep past the computed expiry so the re-check observes it.
const WAKE_SLACK: Duration = Duration::from_millis(10);

/// Quota limits for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub requests_per_window: usize,
    pub tokens_per_window: u64,
    pub window: Duration,
}

impl RateLimits {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            requests_per_window: config.requests_per_minute.max(1),
            tokens_per_window: config.tokens_per_minute.max(1),
            window: Duration::from_secs(config.window_secs.max(1)),
        }
    }
}

/// Point-in-time view of the gate's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Request timestamps still inside the window
    pub requests_in_window: usize,
    /// Tokens charged to the current token window
    pub tokens_in_window: u64,
    /// Calls admitted since the gate was created
    pub total_admitted: u64,
}

#[derive(Debug)]
struct RateWindow {
    requests: VecDeque<Instant>,
    tokens_in_window: u64,
    token_window_start: Instant,
    total_admitted: u64,
}

impl RateWindow {
    fn expire_requests(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Blocking admission gate enforcing requests-per-window and tokens-per-window.
#[derive(Debug)]
pub struct RateLimitedGate {
    limits: RateLimits,
    state: Mutex<RateWindow>,
}

impl RateLimitedGate {
    pub fn new(limits: RateLimits) -> Self {
        tracing::info!(
            requests_per_window = limits.requests_per_window,
            tokens_per_window = limits.tokens_per_window,
            window_secs = limits.window.as_secs_f64(),
            "Rate gate initialized"
        );
        Self {
            limits,
            state: Mutex::new(RateWindow {
                requests: VecDeque::with_capacity(limits.requests_per_window.min(1024)),
                tokens_in_window: 0,
                token_window_start: Instant::now(),
                total_admitted: 0,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimits::from_config(config))
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Block until one call costing `estimated_tokens` may proceed.
    ///
    /// Estimates above the per-window token limit are clamped to the limit:
    /// such a call waits for a fresh window and then consumes all of it,
    /// instead of waiting forever.
    pub fn acquire(&self, estimated_tokens: u64) {
        let tokens = if estimated_tokens > self.limits.tokens_per_window {
            tracing::warn!(
                estimated_tokens,
                limit = self.limits.tokens_per_window,
                "Token estimate exceeds per-window limit, clamping"
            );
            self.limits.tokens_per_window
        } else {
            estimated_tokens
        };

        self.admit_request();
        self.admit_tokens(tokens);
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let mut window = self.lock();
        window.expire_requests(Instant::now(), self.limits.window);
        GateSnapshot {
            requests_in_window: window.requests.len(),
            tokens_in_window: window.tokens_in_window,
            total_admitted: window.total_admitted,
        }
    }

    fn admit_request(&self) {
        loop {
            let wait = {
                let mut window = self.lock();
                let now = Instant::now();
                window.expire_requests(now, self.limits.window);

                if window.requests.len() < self.limits.requests_per_window {
                    window.requests.push_back(now);
                    return;
                }

                let oldest = window.requests.front().copied().unwrap_or(now);
                (oldest + self.limits.window).saturating_duration_since(now) + WAKE_SLACK
            };

            tracing::warn!(
                wait_ms = wait.as_millis() as u64,
                limit = self.limits.requests_per_window,
                "Request quota reached, waiting"
            );
            std::thread::sleep(wait);
        }
    }

    fn admit_tokens(&self, tokens: u64) {
        loop {
            let wait = {
                let mut window = self.lock();
                let now = Instant::now();

                if now.saturating_duration_since(window.token_window_start) >= self.limits.window {
                    window.tokens_in_window = 0;
                    window.token_window_start = now;
                }

                if window.tokens_in_window.saturating_add(tokens) <= self.limits.tokens_per_window {
                    window.tokens_in_window += tokens;
                    window.total_admitted += 1;
                    tracing::debug!(
                        requests_in_window = window.requests.len(),
                        tokens_in_window = window.tokens_in_window,
                        "Call admitted"
                    );
                    return;
                }

                (window.token_window_start + self.limits.window).saturating_duration_since(now)
                    + WAKE_SLACK
            };

            tracing::warn!(
                wait_ms = wait.as_millis() as u64,
                tokens,
                limit = self.limits.tokens_per_window,
                "Token quota reached, waiting"
            );
            std::thread::sleep(wait);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        // Counters stay consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limits(requests: usize, tokens: u64, window_ms: u64) -> RateLimits {
        RateLimits {
            requests_per_window: requests,
            tokens_per_window: tokens,
            window: Duration::from_millis(window_ms),
        }
    }

    #[test]
    fn admits_immediately_under_limit() {
        let gate = RateLimitedGate::new(limits(5, 1_000, 60_000));
        let start = Instant::now();
        for _ in 0..5 {
            gate.acquire(10);
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        let snap = gate.snapshot();
        assert_eq!(snap.requests_in_window, 5);
        assert_eq!(snap.tokens_in_window, 50);
        assert_eq!(snap.total_admitted, 5);
    }

    #[test]
    fn request_over_limit_waits_for_window() {
        let window = Duration::from_millis(200);
        let gate = RateLimitedGate::new(limits(3, 1_000_000, 200));
        let start = Instant::now();
        for _ in 0..4 {
            gate.acquire(1);
        }
        assert!(start.elapsed() >= window);
        assert_eq!(gate.snapshot().total_admitted, 4);
    }

    #[test]
    fn token_over_limit_waits_for_reset() {
        let start = Instant::now();
        let gate = RateLimitedGate::new(limits(100, 100, 200));
        gate.acquire(80);
        gate.acquire(80);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(gate.snapshot().tokens_in_window, 80);
    }

    #[test]
    fn oversized_estimate_is_clamped() {
        let gate = RateLimitedGate::new(limits(10, 100, 60_000));
        let start = Instant::now();
        gate.acquire(5_000);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(gate.snapshot().tokens_in_window, 100);
    }

    #[test]
    fn concurrent_callers_respect_request_quota() {
        let gate = Arc::new(RateLimitedGate::new(limits(5, 1_000_000, 300)));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || gate.acquire(1))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(300));
        let snap = gate.snapshot();
        assert_eq!(snap.total_admitted, 8);
        assert!(snap.requests_in_window <= 5);
    }
}
