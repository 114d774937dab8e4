use crate::wait::StepBudget;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives the liveness signals emitted during long-running steps. The
/// orchestrator adapter forwards them as heartbeats; tests record them.
#[async_trait::async_trait]
pub trait LivenessSink: Send + Sync {
    async fn record_heartbeat(&self);
}

/// Identity and capabilities for one workflow run.
///
/// Step identities are handed out sequentially, so replaying the same
/// deterministic workflow code yields the same identity for every step, and
/// with it the same request token.
pub struct RunContext {
    run_id: String,
    liveness: Arc<dyn LivenessSink>,
    next_step: AtomicU64,
}

impl RunContext {
    pub fn new<S: Into<String>>(run_id: S, liveness: Arc<dyn LivenessSink>) -> Self {
        Self {
            run_id: run_id.into(),
            liveness,
            next_step: AtomicU64::new(1),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Dispatch context for a step that completes in one request.
    pub fn step(&self, name: &str, timeout: Duration) -> StepContext {
        self.step_with_heartbeat(name, timeout, Duration::ZERO)
    }

    /// Dispatch context for a step that waits on an async operation and must
    /// report liveness within `heartbeat_timeout`.
    pub fn waiting_step(
        &self,
        name: &str,
        timeout: Duration,
        heartbeat_timeout: Duration,
    ) -> StepContext {
        self.step_with_heartbeat(name, timeout, heartbeat_timeout)
    }

    /// A fixed pause between steps. Goes through the run context so a
    /// substrate adapter can turn it into a durable timer.
    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn step_with_heartbeat(
        &self,
        name: &str,
        timeout: Duration,
        heartbeat_timeout: Duration,
    ) -> StepContext {
        let sequence = self.next_step.fetch_add(1, Ordering::SeqCst);
        StepContext {
            run_id: self.run_id.clone(),
            step_id: format!("{}-{}", sequence, name),
            heartbeat_timeout,
            deadline: Instant::now() + timeout,
            liveness: Arc::clone(&self.liveness),
        }
    }
}

/// Identity and budgets for one dispatched step attempt.
pub struct StepContext {
    run_id: String,
    step_id: String,
    heartbeat_timeout: Duration,
    deadline: Instant,
    liveness: Arc<dyn LivenessSink>,
}

impl StepContext {
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Request token for this step attempt, derived purely from run and step
    /// identity. Redispatching the same attempt derives the same token, so a
    /// retried create or delete is a no-op on the provider side. Distinct
    /// steps and distinct runs derive distinct tokens.
    pub fn request_token(&self) -> String {
        format!("{}-{}", self.run_id, self.step_id)
    }
}

#[async_trait::async_trait]
impl StepBudget for StepContext {
    fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    async fn record_heartbeat(&self) {
        self.liveness.record_heartbeat().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct NullLiveness;

    #[async_trait::async_trait]
    impl LivenessSink for NullLiveness {
        async fn record_heartbeat(&self) {}
    }

    fn run(run_id: &str) -> RunContext {
        RunContext::new(run_id, Arc::new(NullLiveness))
    }

    #[test]
    fn same_run_and_step_derive_the_same_token() {
        let first = run("run-1");
        let second = run("run-1");
        let timeout = Duration::from_secs(15);
        assert_eq!(
            first.step("create-network-stack", timeout).request_token(),
            second.step("create-network-stack", timeout).request_token(),
        );
    }

    #[test]
    fn different_steps_derive_different_tokens() {
        let run = run("run-1");
        let timeout = Duration::from_secs(15);
        let first = run.step("create-network-stack", timeout);
        let second = run.step("create-network-stack", timeout);
        assert_ne!(first.request_token(), second.request_token());
    }

    #[test]
    fn different_runs_derive_different_tokens() {
        let timeout = Duration::from_secs(15);
        let first = run("run-1").step("create-cluster", timeout);
        let second = run("run-2").step("create-cluster", timeout);
        assert_ne!(first.request_token(), second.request_token());
    }
}
