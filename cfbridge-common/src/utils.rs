/// Bounded retry utilities
pub mod poll {
    use crate::config::PollConfig;
    use std::time::Duration;
    use tracing::trace;

    /// Fixed-interval, bounded retry policy
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollPolicy {
        pub interval: Duration,
        pub max_attempts: u32,
    }

    impl PollPolicy {
        pub fn new(interval: Duration, max_attempts: u32) -> Self {
            Self {
                interval,
                max_attempts,
            }
        }

        /// Upper bound on the time a full poll can sleep
        pub fn window(&self) -> Duration {
            self.interval * self.max_attempts
        }
    }

    impl Default for PollPolicy {
        fn default() -> Self {
            Self::from(&PollConfig::default())
        }
    }

    impl From<&PollConfig> for PollPolicy {
        fn from(config: &PollConfig) -> Self {
            Self::new(config.interval(), config.max_attempts)
        }
    }

    /// Result of a bounded poll
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PollOutcome {
        /// Predicate held; `checks` is how many evaluations it took
        Success { checks: u32 },
        /// Predicate never held
        Timeout { checks: u32 },
    }

    impl PollOutcome {
        pub fn is_success(&self) -> bool {
            matches!(self, PollOutcome::Success { .. })
        }
    }

    /// Evaluate `predicate` until it holds, sleeping `policy.interval` between
    /// checks.
    ///
    /// The predicate is checked before each of the `max_attempts` sleeps and
    /// once more after the last one.
    pub fn poll_until<F>(policy: PollPolicy, mut predicate: F) -> PollOutcome
    where
        F: FnMut() -> bool,
    {
        let mut checks = 0;
        for _ in 0..policy.max_attempts {
            checks += 1;
            if predicate() {
                return PollOutcome::Success { checks };
            }
            trace!("Condition not met after {} checks, sleeping {:?}", checks, policy.interval);
            std::thread::sleep(policy.interval);
        }

        checks += 1;
        if predicate() {
            PollOutcome::Success { checks }
        } else {
            PollOutcome::Timeout { checks }
        }
    }
}

/// Host identification
pub mod host {
    use tracing::warn;

    /// Name of this machine, or an empty string if it cannot be read
    pub fn host_name() -> String {
        match whoami::fallible::hostname() {
            Ok(name) => name,
            Err(e) => {
                warn!("Unable to read host name: {}", e);
                String::new()
            }
        }
    }
}
