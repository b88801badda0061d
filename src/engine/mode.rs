// ABOUTME: Execution modes selecting how far a workflow run goes
// ABOUTME: dry-run validates only, run executes missing work, compare re-executes and diffs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    DryRun,
    Run,
    Compare,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::DryRun => "dry-run",
            ExecutionMode::Run => "run",
            ExecutionMode::Compare => "compare",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry-run" | "dryrun" | "dry_run" => Ok(ExecutionMode::DryRun),
            "run" => Ok(ExecutionMode::Run),
            "compare" => Ok(ExecutionMode::Compare),
            other => Err(format!(
                "unknown mode '{}' (expected dry-run, run or compare)",
                other
            )),
        }
    }
}
