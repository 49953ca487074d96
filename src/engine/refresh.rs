use std::time::Duration;

use crate::config::types::RefreshConfig;

/// Observable state of a coordinator's polling session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PollingState {
    Idle,
    Polling,
    /// A refresh cycle is running (entered on every tick, and on manual
    /// refreshes).
    Refreshing,
}

/// Bounded exponential backoff applied when a polling cycle fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Consecutive failures tolerated before polling gives up.
    pub max_restarts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from_config(&RefreshConfig::default())
    }
}

impl RestartPolicy {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self {
            max_restarts: config.max_restarts,
            initial_backoff: Duration::from_secs(config.restart_backoff_secs),
            max_backoff: Duration::from_secs(config.max_restart_backoff_secs),
        }
    }

    /// Delay before restart number `attempt` (1-based), or `None` when the
    /// retry budget is spent.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_restarts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(
            self.initial_backoff
                .saturating_mul(factor)
                .min(self.max_backoff),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_restarts: u32) -> RestartPolicy {
        RestartPolicy {
            max_restarts,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let p = policy(6);
        let delays: Vec<u64> = (1..=6)
            .map(|n| p.backoff(n).unwrap().as_secs())
            .collect();
        assert_eq!(delays, [2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn budget_is_bounded() {
        let p = policy(2);
        assert!(p.backoff(2).is_some());
        assert!(p.backoff(3).is_none());
        assert!(policy(0).backoff(1).is_none());
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let p = policy(u32::MAX);
        assert_eq!(p.backoff(64), Some(Duration::from_secs(10)));
    }
}
