//! Blocking, polling waits on cloud resource state.
//!
//! Snapshot completion and instance availability share the same shape: probe
//! a status endpoint until a predicate holds or a deadline passes. There is
//! no cancellation path once a wait has started; killing the process is the
//! only way out, and no cleanup runs in that case.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::errors::Result;

/// Poll interval and overall deadline for one wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl WaitPolicy {
    /// Snapshot completion: 30s polls for up to an hour.
    pub const SNAPSHOT: WaitPolicy = WaitPolicy {
        interval: Duration::from_secs(30),
        deadline: Duration::from_secs(3600),
    };

    /// Instance availability: 30s polls for up to an hour. Restores of large
    /// snapshots routinely take tens of minutes.
    pub const INSTANCE: WaitPolicy = WaitPolicy {
        interval: Duration::from_secs(30),
        deadline: Duration::from_secs(3600),
    };
}

#[derive(Debug)]
pub enum WaitOutcome {
    Ready,
    TimedOut { waited: Duration },
}

/// Polls `probe` until it returns `true` or the policy's deadline passes.
/// Errors from the probe propagate immediately; a timeout is reported as an
/// outcome so the caller can attach its own error kind.
pub async fn wait_until<F, Fut>(what: &str, policy: &WaitPolicy, mut probe: F) -> Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let started = Instant::now();
    loop {
        if probe().await? {
            return Ok(WaitOutcome::Ready);
        }
        let waited = started.elapsed();
        if waited >= policy.deadline {
            return Ok(WaitOutcome::TimedOut { waited });
        }
        debug!("{} not ready after {:?}, polling again", what, waited);
        sleep(policy.interval).await;
    }
}
