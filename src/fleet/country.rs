//! Verification of an egress country change.
//!
//! Applying a new country only means the VPN client accepted it; the
//! reconnect happens asynchronously. [`verify_reconnection`] polls the
//! gateway's status a bounded number of times and stops early once the
//! public IP differs from the one seen before the change. When the budget
//! runs out it does one last fetch and reports that, unconfirmed.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::control::ContainerStatus;

pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ReconnectPolicy {
    /// Worst-case time spent sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryChange {
    pub status: ContainerStatus,
    /// True only when a poll reported a public IP different from the one seen before the change.
    pub confirmed: bool,
    /// Polls made inside the verification loop, not counting the final fallback fetch.
    #[serde(skip)]
    pub polls: u32,
}

/// Runs the bounded verify loop. `fetch_status` never fails; transport
/// problems show up as [`ContainerStatus::Unavailable`] and the loop keeps
/// going. Without a known `old_ip` nothing can be confirmed, so the full
/// budget is spent before the fallback fetch.
pub async fn verify_reconnection<F, Fut>(
    policy: &ReconnectPolicy,
    sleeper: &dyn Sleeper,
    old_ip: Option<&str>,
    mut fetch_status: F,
) -> CountryChange
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ContainerStatus>,
{
    for attempt in 1..=policy.attempts {
        sleeper.sleep(policy.interval).await;
        let status = fetch_status().await;

        match (old_ip, status.public_ip()) {
            (Some(old), Some(new)) if old != new => {
                info!(attempt, old_ip = %old, new_ip = %new, "VPN reconnected with a new public IP.");
                return CountryChange {
                    status,
                    confirmed: true,
                    polls: attempt,
                };
            }
            _ => debug!(attempt, available = status.is_available(), "Still waiting for reconnection."),
        }
    }

    warn!(
        attempts = policy.attempts,
        "VPN reconnection taking longer than expected, but change was submitted."
    );
    CountryChange {
        status: fetch_status().await,
        confirmed: false,
        polls: policy.attempts,
    }
}
