use std::time::Duration;

/// How long to wait for a single nameserver reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// How many times a query is sent before giving up.
pub const DEFAULT_MAX_TRIALS: usize = 3;

/// Settings for talking to upstream nameservers.
///
/// Both fields are guaranteed to be positive.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResolverConfig {
    timeout: Duration,
    max_trials: usize,
}

impl ResolverConfig {
    pub fn new(timeout: Duration, max_trials: usize) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout { seconds: 0.0 });
        }
        if max_trials == 0 {
            return Err(ConfigError::NonPositiveTrials);
        }

        Ok(Self {
            timeout,
            max_trials,
        })
    }

    /// Like `new`, but takes the timeout as (possibly fractional)
    /// seconds, as given on the command line.
    pub fn from_secs_f64(seconds: f64, max_trials: usize) -> Result<Self, ConfigError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ConfigError::NonPositiveTimeout { seconds });
        }

        let timeout = Duration::try_from_secs_f64(seconds)
            .map_err(|_| ConfigError::TimeoutTooLarge { seconds })?;

        Self::new(timeout, max_trials)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_trials(&self) -> usize {
        self.max_trials
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_trials: DEFAULT_MAX_TRIALS,
        }
    }
}

/// Errors that can arise when building a `ResolverConfig`.
#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("timeout must be positive, not {seconds}")]
    NonPositiveTimeout { seconds: f64 },
    #[error("timeout of {seconds} seconds is too large")]
    TimeoutTooLarge { seconds: f64 },
    #[error("number of trials must be positive")]
    NonPositiveTrials,
}
