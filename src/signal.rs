pub mod rules;
pub mod vote;

pub use rules::{CompactRule, RuleSet, RuleThresholds, SignalRule};
pub use vote::aggregate;
