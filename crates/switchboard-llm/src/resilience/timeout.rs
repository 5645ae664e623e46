use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use switchboard_config::TimeoutConfig;

/// Label selecting a timeout budget
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Completion,
    Embedding,
    Image,
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Completion => "completion",
            Self::Embedding => "embedding",
            Self::Image => "image",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-aware timeout budgets
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    default: Duration,
    budgets: HashMap<String, Duration>,
}

impl TimeoutPolicy {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            budgets: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_budget(mut self, operation: &OperationKind, budget: Duration) -> Self {
        self.budgets.insert(operation.as_str().to_owned(), budget);
        self
    }

    /// Budget for an operation, falling back to the default
    pub fn budget_for(&self, operation: &OperationKind) -> Duration {
        self.budgets.get(operation.as_str()).copied().unwrap_or(self.default)
    }
}

impl From<&TimeoutConfig> for TimeoutPolicy {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            default: config.default,
            budgets: config.operations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_budget_wins_over_default() {
        let policy = TimeoutPolicy::new(Duration::from_secs(60))
            .with_budget(&OperationKind::Embedding, Duration::from_secs(5));

        assert_eq!(policy.budget_for(&OperationKind::Embedding), Duration::from_secs(5));
        assert_eq!(policy.budget_for(&OperationKind::Completion), Duration::from_secs(60));
        assert_eq!(
            policy.budget_for(&OperationKind::Other("rerank".to_owned())),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn config_keys_match_operation_labels() {
        let mut config = TimeoutConfig::default();
        config.operations.insert("completion".to_owned(), Duration::from_secs(120));

        let policy = TimeoutPolicy::from(&config);
        assert_eq!(policy.budget_for(&OperationKind::Completion), Duration::from_secs(120));
        assert_eq!(policy.budget_for(&OperationKind::Image), config.default);
    }
}
