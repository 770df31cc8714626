//! Legacy (v1) models: sources, scenario definitions and execution history.
//!
//! Executions own their runs, runs own their executed scenarios and executed
//! scenarios own their step errors, so one `Execution` value is a fully loaded
//! history graph.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separator between the country codes of a legacy scenario.
pub const COUNTRY_CODES_SEPARATOR: &str = ",";

/// Country-codes value meaning "every country".
pub const COUNTRY_ALL: &str = "all";

/// Placeholder replaced by a branch name in a source VCS URL.
pub const BRANCH_VARIABLE: &str = "{{branch}}";

static FUNCTIONALITY_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)functionalit(?:y|ies)").expect("valid keyword regex"));

/// Technology of the tests stored in a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Technology {
    Cucumber,
    Postman,
    Cypress,
    Generic,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cucumber => "CUCUMBER",
            Self::Postman => "POSTMAN",
            Self::Cypress => "CYPRESS",
            Self::Generic => "GENERIC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUCUMBER" => Some(Self::Cucumber),
            "POSTMAN" => Some(Self::Postman),
            "CYPRESS" => Some(Self::Cypress),
            "GENERIC" => Some(Self::Generic),
            _ => None,
        }
    }
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Legacy project, as handed over by the migration orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyProject {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
}

/// Version-control location and technology of test files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub project_id: i64,
    /// Short code used by the build system when indexing files
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub technology: Option<Technology>,
    /// Base URL of the files; `{{branch}}` is replaced by a branch name
    #[serde(default)]
    pub vcs_url: String,
    pub default_branch: String,
}

/// Business key of a source: two sources are the same when they share project and code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub project_id: i64,
    pub code: String,
}

impl Source {
    pub fn key(&self) -> SourceKey {
        SourceKey {
            project_id: self.project_id,
            code: self.code.clone(),
        }
    }
}

/// Scenario definition as indexed from a source repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub feature_file: String,
    #[serde(default)]
    pub feature_name: String,
    /// Raw name, possibly prefixed by functionality codes
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub ignored: bool,
    /// Comma-separated country codes, or "all"
    #[serde(default)]
    pub country_codes: String,
    #[serde(default)]
    pub line: i32,
    /// One step per line, formatted `line:state[:value]:content`
    #[serde(default)]
    pub content: String,
}

impl Scenario {
    pub fn name_and_functionality_codes(&self) -> (String, Vec<String>) {
        name_and_functionality_codes(&self.name)
    }

    pub fn steps(&self) -> Vec<ScenarioStep> {
        stateless_steps(&self.content)
    }
}

/// A step without execution state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub line: i32,
    pub content: String,
}

/// A step as it ran, with its state and optional value (e.g. a duration).
///
/// Equality ignores the value: two runs of a step are the same step when line,
/// content and state agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedScenarioStep {
    pub line: i32,
    pub content: String,
    pub value: Option<String>,
    pub state: String,
}

impl PartialEq for ExecutedScenarioStep {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.content == other.content && self.state == other.state
    }
}

impl Eq for ExecutedScenarioStep {}

impl std::hash::Hash for ExecutedScenarioStep {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.line.hash(state);
        self.content.hash(state);
        self.state.hash(state);
    }
}

/// Failure of one step in one executed scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub id: i64,
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub step_definition: String,
    #[serde(default)]
    pub step_line: i32,
    #[serde(default)]
    pub exception: String,
}

/// One concrete run of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedScenario {
    pub id: i64,
    #[serde(default)]
    pub feature_file: String,
    #[serde(default)]
    pub feature_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub line: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub start_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<StepError>,
}

impl ExecutedScenario {
    pub fn name_and_functionality_codes(&self) -> (String, Vec<String>) {
        name_and_functionality_codes(&self.name)
    }

    /// Steps without value nor state, i.e. what the scenario file contained when it ran.
    pub fn stateless_steps(&self) -> Vec<ScenarioStep> {
        stateless_steps(&self.content)
    }

    pub fn executed_steps(&self) -> Vec<ExecutedScenarioStep> {
        split_step_contents(&self.content)
            .into_iter()
            .map(|parts| ExecutedScenarioStep {
                line: parts.line,
                content: parts.content,
                value: parts.value,
                state: parts.state,
            })
            .collect()
    }
}

/// Type of a run (browser, mobile, API...) and where its scenarios come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunType {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_browser: bool,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub source: Option<Source>,
}

/// Scenarios run for one country and one run type within an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub country_code: String,
    pub run_type: RunType,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub executed_scenarios: Vec<ExecutedScenario>,
}

/// One CI execution of a cycle on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub project_id: i64,
    pub branch: String,
    #[serde(default)]
    pub cycle: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub test_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// Split a raw scenario name into its display name and functionality codes.
///
/// `"functionality 3, 1 & 2: Buy a product"` gives `("Buy a product", ["1", "2", "3"])`.
/// Codes are the numeric tokens following the functionality keyword, in
/// numeric order, without duplicates.
pub fn name_and_functionality_codes(raw_name: &str) -> (String, Vec<String>) {
    if raw_name.trim().is_empty() {
        return (String::new(), Vec::new());
    }

    let Some((prefix, name)) = raw_name.split_once(':') else {
        return (raw_name.trim().to_string(), Vec::new());
    };

    let codes = match FUNCTIONALITY_KEYWORD.find(prefix) {
        Some(keyword) => {
            let mut codes: Vec<u64> = prefix[keyword.end()..]
                .split([',', '&'])
                .filter_map(|token| token.trim().parse::<u64>().ok())
                .collect();
            codes.sort_unstable();
            codes.dedup();
            codes.iter().map(u64::to_string).collect()
        }
        None => Vec::new(),
    };

    (name.trim().to_string(), codes)
}

struct StepParts {
    line: i32,
    state: String,
    value: Option<String>,
    content: String,
}

/// Parse `line:state[:value]:content` lines, skipping malformed ones.
fn split_step_contents(content: &str) -> Vec<StepParts> {
    content
        .lines()
        .filter_map(|raw_line| {
            let parts: Vec<&str> = raw_line.split(':').map(str::trim).collect();
            if parts.len() != 3 && parts.len() != 4 {
                return None;
            }
            let line = parts[0].parse::<i32>().ok()?;
            Some(StepParts {
                line,
                state: parts[1].to_string(),
                value: (parts.len() == 4).then(|| parts[2].to_string()),
                content: parts[parts.len() - 1].to_string(),
            })
        })
        .collect()
}

fn stateless_steps(content: &str) -> Vec<ScenarioStep> {
    split_step_contents(content)
        .into_iter()
        .map(|parts| ScenarioStep {
            line: parts.line,
            content: parts.content,
        })
        .collect()
}
