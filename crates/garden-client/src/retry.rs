//! Retry policy for re-querying process exit status.
//!
//! Only `wait` is ever retried. The policy decides how many attempts a single
//! `wait` call may make, how long to pause between them, and which errors are
//! worth another attempt.

use std::time::Duration;

use garden_proto::{GardenError, GardenResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of `wait` attempts: the first call plus four retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default cap on the delay between attempts.
const DEFAULT_MAX_DELAY_SECS: u64 = 5;

/// Standard exponential backoff multiplier.
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Which failed attempts are retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Retry every error until the budget runs out.
    #[default]
    AnyError,
    /// Retry only errors for which [`GardenError::is_transient`] holds.
    TransientOnly,
}

/// Configuration for retrying `wait`.
///
/// The default makes five immediate attempts and retries any error.
/// Deserialization runs [`RetryPolicy::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryPolicyFields")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt. Zero disables backoff.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Draw each delay uniformly from `[delay / 2, delay]`.
    pub jitter: bool,
    /// Which errors are retried.
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            backoff_multiplier: BACKOFF_MULTIPLIER,
            jitter: false,
            retry_on: RetryOn::AnyError,
        }
    }
}

/// Unvalidated wire form of [`RetryPolicy`]; missing fields take defaults.
#[derive(Deserialize)]
#[serde(default)]
struct RetryPolicyFields {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    retry_on: RetryOn,
}

impl Default for RetryPolicyFields {
    fn default() -> Self {
        let RetryPolicy {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            jitter,
            retry_on,
        } = RetryPolicy::default();
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            jitter,
            retry_on,
        }
    }
}

impl TryFrom<RetryPolicyFields> for RetryPolicy {
    type Error = GardenError;

    fn try_from(fields: RetryPolicyFields) -> GardenResult<Self> {
        let policy = Self {
            max_attempts: fields.max_attempts,
            initial_delay: fields.initial_delay,
            max_delay: fields.max_delay,
            backoff_multiplier: fields.backoff_multiplier,
            jitter: fields.jitter,
            retry_on: fields.retry_on,
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl RetryPolicy {
    /// `max_attempts` attempts with no delay in between.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Exponential backoff starting at `initial_delay`.
    #[must_use]
    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }

    /// Randomize each delay.
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Only retry transient errors.
    #[must_use]
    pub fn transient_only(mut self) -> Self {
        self.retry_on = RetryOn::TransientOnly;
        self
    }

    /// Check that the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no attempt would ever be made, the delay
    /// would shrink between attempts, or the first delay exceeds the cap.
    pub fn validate(&self) -> GardenResult<()> {
        if self.max_attempts == 0 {
            return Err(GardenError::invalid_config(
                "max_attempts must be at least 1",
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(GardenError::invalid_config(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(GardenError::invalid_config(format!(
                "initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Whether `err` may be retried under this policy.
    #[must_use]
    pub fn should_retry(&self, err: &GardenError) -> bool {
        match self.retry_on {
            RetryOn::AnyError => true,
            RetryOn::TransientOnly => err.is_transient(),
        }
    }

    /// How long to pause after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = (self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_nanos() as f64);
        let delay = Duration::from_nanos(nanos.round() as u64);

        if self.jitter {
            let floor = delay / 2;
            rand::thread_rng().gen_range(floor..=delay)
        } else {
            delay
        }
    }
}
