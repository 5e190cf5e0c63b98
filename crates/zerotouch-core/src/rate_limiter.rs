//! Sliding-window admission control for remote calls.
//!
//! At most `quota` acquisitions are admitted within any trailing window of
//! `window` length. Expired timestamps are evicted on every call, so the
//! record never holds more than `quota` entries.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::OrchestratorConfig;

#[derive(Debug)]
pub struct RateLimiter {
    quota: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(quota: usize, window: Duration) -> Self {
        Self {
            quota,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(quota)),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            config.rate_limit_quota,
            Duration::from_millis(config.rate_limit_window_ms),
        )
    }

    /// Admit one call now, or return `false` without blocking.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Admission check against an explicit clock reading.
    ///
    /// Check-and-record happens under one lock, so two callers can never
    /// both take the last free slot.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.quota {
            tracing::debug!(
                "[RateLimiter] Denied: {} admissions within {:?}",
                timestamps.len(),
                self.window
            );
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Number of admissions still inside the window at `now`.
    pub fn in_flight_at(&self, now: Instant) -> usize {
        let timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        timestamps
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count()
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
