//! Pipeline phases and the workflow kinds that run them
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Rankings,
    Reports,
    Builds,
    EquipmentAnalysis,
    TalentAnalysis,
    StatAnalysis,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Rankings,
        Phase::Reports,
        Phase::Builds,
        Phase::EquipmentAnalysis,
        Phase::TalentAnalysis,
        Phase::StatAnalysis,
    ];

    pub const ANALYSIS: [Phase; 3] = [
        Phase::EquipmentAnalysis,
        Phase::TalentAnalysis,
        Phase::StatAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Rankings => "rankings",
            Phase::Reports => "reports",
            Phase::Builds => "builds",
            Phase::EquipmentAnalysis => "equipment_analysis",
            Phase::TalentAnalysis => "talent_analysis",
            Phase::StatAnalysis => "stat_analysis",
        }
    }

    pub fn is_analysis(&self) -> bool {
        Self::ANALYSIS.contains(self)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid phase: {}", s))
    }
}

/// Kind of run recorded in a workflow state row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Global rankings sync
    Rankings,
    /// Report and build extraction for one class
    Extraction,
    /// One statistics analysis phase
    Analysis(Phase),
}

impl WorkflowType {
    pub fn as_string(&self) -> String {
        match self {
            WorkflowType::Rankings => "rankings".to_string(),
            WorkflowType::Extraction => "extraction".to_string(),
            WorkflowType::Analysis(phase) => format!("analysis:{}", phase),
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl std::str::FromStr for WorkflowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rankings" => Ok(WorkflowType::Rankings),
            "extraction" => Ok(WorkflowType::Extraction),
            other => match other.strip_prefix("analysis:") {
                Some(phase) => {
                    let phase: Phase = phase.parse()?;
                    if phase.is_analysis() {
                        Ok(WorkflowType::Analysis(phase))
                    } else {
                        Err(format!("Phase {} is not an analysis phase", phase))
                    }
                }
                None => Err(format!("Invalid workflow type: {}", s)),
            },
        }
    }
}
