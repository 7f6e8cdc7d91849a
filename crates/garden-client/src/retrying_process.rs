//! Process wrapper that retries `wait`.

use garden_proto::{GardenResult, Signal, TtySpec};
use tracing::{debug, warn};

use crate::connection::{BoxFuture, Process};
use crate::retry::RetryPolicy;

/// Exit code reported when no valid exit code could be obtained.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Wraps a remote process and retries [`Process::wait`] on failure.
///
/// `signal` and `set_tty` go through exactly once: repeating them could act
/// twice on the remote side, while asking again for an exit status cannot.
pub struct RetryingProcess {
    inner: Box<dyn Process>,
    policy: RetryPolicy,
}

impl RetryingProcess {
    /// Wrap `inner` with the default policy.
    #[must_use]
    pub fn new(inner: Box<dyn Process>) -> Self {
        Self::with_valid_policy(inner, RetryPolicy::default())
    }

    /// Wrap `inner` with a custom policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the policy fails [`RetryPolicy::validate`].
    pub fn with_policy(inner: Box<dyn Process>, policy: RetryPolicy) -> GardenResult<Self> {
        policy.validate()?;
        Ok(Self::with_valid_policy(inner, policy))
    }

    /// Wrap `inner` with a policy that has already been validated.
    pub(crate) fn with_valid_policy(inner: Box<dyn Process>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The policy applied to `wait`.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Unwrap the underlying process.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Process> {
        self.inner
    }

    /// Collapse a `wait` result to a plain exit code, using
    /// [`UNKNOWN_EXIT_CODE`] for errors.
    #[must_use]
    pub fn exit_code_or_unknown(result: &GardenResult<i32>) -> i32 {
        result.as_ref().map_or(UNKNOWN_EXIT_CODE, |code| *code)
    }

    async fn wait_with_retry(&self) -> GardenResult<i32> {
        let process_id = self.inner.id();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.inner.wait().await {
                Ok(exit_code) => {
                    if attempt > 1 {
                        debug!(
                            process_id,
                            attempts = attempt,
                            exit_code,
                            "wait succeeded after retry"
                        );
                    }
                    return Ok(exit_code);
                }
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            process_id,
                            attempts = attempt,
                            error = %e,
                            "wait failed after max attempts"
                        );
                        return Err(e);
                    }

                    if !self.policy.should_retry(&e) {
                        debug!(
                            process_id,
                            attempt,
                            error = %e,
                            "wait failed with non-retryable error"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        process_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "wait failed, will retry"
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

impl Process for RetryingProcess {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn wait(&self) -> BoxFuture<'_, GardenResult<i32>> {
        Box::pin(self.wait_with_retry())
    }

    fn set_tty(&self, spec: TtySpec) -> BoxFuture<'_, GardenResult<()>> {
        self.inner.set_tty(spec)
    }

    fn signal(&self, signal: Signal) -> BoxFuture<'_, GardenResult<()>> {
        self.inner.signal(signal)
    }
}

impl std::fmt::Debug for RetryingProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingProcess")
            .field("id", &self.inner.id())
            .field("policy", &self.policy)
            .finish()
    }
}
