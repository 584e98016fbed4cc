use rc_types::model::{HistoryInput, HistoryPlan, HistoryPreference, HistoryStrategy, Truncation};

const DEFAULT_DENSE_THRESHOLD: u64 = 500;

pub struct HistoryPlanner {
    context_window_tokens: u64,
    dense_threshold: u64,
}

impl HistoryPlanner {
    pub fn new(context_window_tokens: u64) -> Self {
        Self {
            context_window_tokens,
            dense_threshold: DEFAULT_DENSE_THRESHOLD,
        }
    }

    pub fn with_dense_threshold(mut self, dense_threshold: u64) -> Self {
        self.dense_threshold = dense_threshold;
        self
    }

    /// `Plan`, per spec.md §4.8.
    pub fn plan(&self, input: HistoryInput) -> HistoryPlan {
        if input.truncation == Truncation::Disabled
            && input.estimated_tokens > self.context_window_tokens
        {
            return HistoryPlan {
                strategy: HistoryStrategy::Vendor,
                trimmed_events: 0,
                warnings: vec![format!(
                    "Truncation disabled with estimated tokens ({}) exceeding the context window ({}).",
                    input.estimated_tokens, self.context_window_tokens
                )],
            };
        }

        let prefers_replay = matches!(input.preference, Some(HistoryPreference::PreferReplay));
        let is_dense = input.event_count >= self.dense_threshold
            && input.estimated_tokens as f64 > 0.6 * self.context_window_tokens as f64;
        if !prefers_replay && is_dense {
            return HistoryPlan {
                strategy: HistoryStrategy::Vendor,
                trimmed_events: 0,
                warnings: Vec::new(),
            };
        }

        if input.estimated_tokens > self.context_window_tokens {
            let denom = input.event_count.max(1) as f64;
            let tokens_per_event = input.estimated_tokens as f64 / denom;
            let excess_tokens = (input.estimated_tokens - self.context_window_tokens) as f64;
            let trimmed = (excess_tokens / tokens_per_event).ceil() as u64;
            let trimmed = trimmed.min(input.event_count);
            return HistoryPlan {
                strategy: HistoryStrategy::Replay,
                trimmed_events: trimmed,
                warnings: vec![format!("Trimmed {trimmed} events to fit the context window.")],
            };
        }

        HistoryPlan {
            strategy: HistoryStrategy::Replay,
            trimmed_events: 0,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_truncation_over_window_forces_vendor() {
        let planner = HistoryPlanner::new(128_000);
        let plan = planner.plan(HistoryInput {
            estimated_tokens: 150_000,
            event_count: 200,
            truncation: Truncation::Disabled,
            preference: None,
        });
        assert_eq!(plan.strategy, HistoryStrategy::Vendor);
        assert_eq!(plan.trimmed_events, 0);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn auto_truncation_over_window_trims_events() {
        let planner = HistoryPlanner::new(1_000);
        let plan = planner.plan(HistoryInput {
            estimated_tokens: 2_000,
            event_count: 100,
            truncation: Truncation::Auto,
            preference: None,
        });
        assert_eq!(plan.strategy, HistoryStrategy::Replay);
        assert!(plan.trimmed_events >= 1);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn dense_history_without_prefer_replay_forces_vendor() {
        let planner = HistoryPlanner::new(100_000).with_dense_threshold(10);
        let plan = planner.plan(HistoryInput {
            estimated_tokens: 70_000,
            event_count: 20,
            truncation: Truncation::Auto,
            preference: None,
        });
        assert_eq!(plan.strategy, HistoryStrategy::Vendor);
    }

    #[test]
    fn prefer_replay_overrides_dense_threshold() {
        let planner = HistoryPlanner::new(100_000).with_dense_threshold(10);
        let plan = planner.plan(HistoryInput {
            estimated_tokens: 70_000,
            event_count: 20,
            truncation: Truncation::Auto,
            preference: Some(HistoryPreference::PreferReplay),
        });
        assert_eq!(plan.strategy, HistoryStrategy::Replay);
    }
}
