use crate::error::{Result, TerminalResourceStateSnafu, WaitTimeoutSnafu};
use snafu::ensure;
use std::future::Future;
use std::time::Duration;

/// Default polling cadence when no heartbeat budget constrains the wait.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(120);

/// Margin reserved for a heartbeat to reach the orchestrator before its
/// timeout: 20% of the budget, at most 5 seconds.
const HEARTBEAT_MARGIN_CAP: Duration = Duration::from_secs(5);

/// What one poll of the external status source observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WaitState {
    /// The operation is still in progress.
    Pending,
    /// The target state was reached.
    Ready,
    /// An explicit failure or rollback state was reached; retrying the wait
    /// cannot succeed.
    Terminal { state: String },
}

/// Polling delay bounds derived from a step's heartbeat budget.
///
/// A wait that sleeps longer than the heartbeat budget never gets a liveness
/// signal out in time, and the orchestrator presumes the step dead and
/// redispatches it. The max delay therefore stays below the budget by a small
/// margin. The min delay keeps the default floor when it fits under the max,
/// and drops to 20% of the max for tight budgets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitDelays {
    pub min: Duration,
    pub max: Duration,
}

impl Default for WaitDelays {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl WaitDelays {
    pub fn for_heartbeat(heartbeat_timeout: Duration) -> Self {
        if heartbeat_timeout.is_zero() {
            return Self::default();
        }

        let margin = heartbeat_timeout.mul_f64(0.2).min(HEARTBEAT_MARGIN_CAP);
        let max = heartbeat_timeout.saturating_sub(margin);
        if max.is_zero() {
            return Self::default();
        }

        let min = if max >= DEFAULT_MIN_DELAY {
            DEFAULT_MIN_DELAY
        } else {
            max.mul_f64(0.2)
        };

        Self { min, max }
    }

    /// Exponential backoff from `min` to `max`, doubling per attempt.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.min;
        for _ in 1..attempt {
            if delay >= self.max {
                break;
            }
            delay = delay.saturating_mul(2);
        }
        delay.min(self.max)
    }
}

/// The time and liveness budget of one dispatched step, injected so waits can
/// run against a fake clock and a fake orchestrator in tests.
#[async_trait::async_trait]
pub trait StepBudget: Send + Sync {
    /// Zero when the step carries no heartbeat budget.
    fn heartbeat_timeout(&self) -> Duration;

    /// Time left until the step's deadline.
    fn remaining(&self) -> Duration;

    /// Emit one liveness signal to the orchestrator.
    async fn record_heartbeat(&self);
}

/// Repeatedly poll an external status source until it reports the target
/// state, a terminal state, or the step's deadline elapses.
///
/// When the step carries a heartbeat budget, one liveness signal is emitted
/// before every poll. Transport errors from the poll pass through unchanged;
/// the orchestrator's own step-level retry handles them.
pub async fn wait_until<B, F, Fut>(budget: &B, what: &str, mut poll: F) -> Result<()>
where
    B: StepBudget + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WaitState>>,
{
    let delays = WaitDelays::for_heartbeat(budget.heartbeat_timeout());
    let emit_liveness = !budget.heartbeat_timeout().is_zero();
    let mut attempt: u32 = 0;

    loop {
        ensure!(
            !budget.remaining().is_zero(),
            WaitTimeoutSnafu { resource: what }
        );

        if emit_liveness {
            budget.record_heartbeat().await;
        }

        match poll().await? {
            WaitState::Ready => return Ok(()),
            WaitState::Terminal { state } => {
                return TerminalResourceStateSnafu {
                    resource: what,
                    state,
                }
                .fail()
            }
            WaitState::Pending => {}
        }

        attempt += 1;
        let delay = delays.delay_for_attempt(attempt).min(budget.remaining());
        tokio::time::sleep(delay).await;
    }
}
