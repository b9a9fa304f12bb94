//! The five session stages.

use std::fmt;

/// Stages in flow order.
///
/// ```text
/// Landing ─▶ Setup ─▶ Interview ─(auto)─▶ Questionnaire ─▶ Results
///    ▲                                                        │
///    └──────────────────────── reset (from any) ──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Landing,
    Setup,
    Interview,
    Questionnaire,
    Results,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Landing,
        Stage::Setup,
        Stage::Interview,
        Stage::Questionnaire,
        Stage::Results,
    ];

    /// Zero-based position in the flow, for step indicators.
    pub fn step(&self) -> usize {
        match self {
            Stage::Landing => 0,
            Stage::Setup => 1,
            Stage::Interview => 2,
            Stage::Questionnaire => 3,
            Stage::Results => 4,
        }
    }

    /// The only stage a forward transition may lead to.
    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.step() + 1).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Landing => "Welcome",
            Stage::Setup => "Setup",
            Stage::Interview => "Interview",
            Stage::Questionnaire => "PHQ-8",
            Stage::Results => "Results",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_strict() {
        assert_eq!(Stage::Landing.next(), Some(Stage::Setup));
        assert_eq!(Stage::Interview.next(), Some(Stage::Questionnaire));
        assert_eq!(Stage::Results.next(), None);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.step(), i);
        }
    }
}
