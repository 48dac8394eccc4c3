//! Agent stages and optimization modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named unit of work within a pipeline.
///
/// Variant order is the fixed dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStage {
    Analyze,
    Docs,
    Demo,
    Pitch,
    Supervisor,
}

impl AgentStage {
    /// All stages in dispatch order
    pub const ALL: [AgentStage; 5] = [
        AgentStage::Analyze,
        AgentStage::Docs,
        AgentStage::Demo,
        AgentStage::Pitch,
        AgentStage::Supervisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStage::Analyze => "analyze",
            AgentStage::Docs => "docs",
            AgentStage::Demo => "demo",
            AgentStage::Pitch => "pitch",
            AgentStage::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("Unknown agent stage: {}", s))
    }
}

/// Optimization mode selecting which optional stages run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Hackathon,
    Placement,
    Refactor,
}

/// Mode dispatch table. Supervisor is always last.
const HACKATHON_STAGES: &[AgentStage] = &[
    AgentStage::Analyze,
    AgentStage::Docs,
    AgentStage::Demo,
    AgentStage::Pitch,
    AgentStage::Supervisor,
];
const PLACEMENT_STAGES: &[AgentStage] = &[
    AgentStage::Analyze,
    AgentStage::Docs,
    AgentStage::Demo,
    AgentStage::Supervisor,
];
const REFACTOR_STAGES: &[AgentStage] = &[
    AgentStage::Analyze,
    AgentStage::Docs,
    AgentStage::Supervisor,
];

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Hackathon, Mode::Placement, Mode::Refactor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Hackathon => "hackathon",
            Mode::Placement => "placement",
            Mode::Refactor => "refactor",
        }
    }

    /// Stages dispatched for this mode, in order
    pub fn active_stages(&self) -> &'static [AgentStage] {
        match self {
            Mode::Hackathon => HACKATHON_STAGES,
            Mode::Placement => PLACEMENT_STAGES,
            Mode::Refactor => REFACTOR_STAGES,
        }
    }

    pub fn is_active(&self, stage: AgentStage) -> bool {
        self.active_stages().contains(&stage)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown mode '{}' (expected one of: hackathon, placement, refactor)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_is_last_in_every_mode() {
        for mode in Mode::ALL {
            let stages = mode.active_stages();
            assert_eq!(stages.first(), Some(&AgentStage::Analyze));
            assert_eq!(stages.last(), Some(&AgentStage::Supervisor));
        }
    }

    #[test]
    fn test_active_stages_follow_dispatch_order() {
        for mode in Mode::ALL {
            let stages = mode.active_stages();
            assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_refactor_skips_demo_and_pitch() {
        assert!(!Mode::Refactor.is_active(AgentStage::Demo));
        assert!(!Mode::Refactor.is_active(AgentStage::Pitch));
        assert!(Mode::Refactor.is_active(AgentStage::Docs));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("hackathon".parse::<Mode>(), Ok(Mode::Hackathon));
        assert!("Hackathon".parse::<Mode>().is_err());
        assert!("speedrun".parse::<Mode>().is_err());
    }

    #[test]
    fn test_stage_serializes_as_snake_case() {
        let json = serde_json::to_string(&AgentStage::Supervisor).unwrap();
        assert_eq!(json, "\"supervisor\"");
    }
}
