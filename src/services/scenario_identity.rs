//! Equivalence keys of legacy scenarios and executed scenarios.
//!
//! Keys are plain values computed once per record and used as map keys, so two
//! records are "the same scenario" exactly when their keys are equal.

use crate::models::legacy::{ExecutedScenario, ExecutedScenarioStep, Scenario, Source, SourceKey};

/// An executed scenario carried with the branch of its execution and the
/// source of its run.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedExecutedScenario<'a> {
    pub executed_scenario: &'a ExecutedScenario,
    pub branch: &'a str,
    pub legacy_source: Option<&'a Source>,
}

/// Logical scenario: source, feature file and name without functionality codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioIdentity {
    pub source: Option<SourceKey>,
    pub feature_file: String,
    pub name: String,
}

impl ScenarioIdentity {
    pub fn of_scenario(scenario: &Scenario) -> Self {
        let (name, _) = scenario.name_and_functionality_codes();
        ScenarioIdentity {
            source: scenario.source.as_ref().map(Source::key),
            feature_file: scenario.feature_file.clone(),
            name,
        }
    }

    pub fn of_executed(extended: &ExtendedExecutedScenario<'_>) -> Self {
        let ExecutedScenarioIdentity {
            feature_file,
            name,
            legacy_source,
        } = ExecutedScenarioIdentity::of(extended);
        ScenarioIdentity {
            source: legacy_source,
            feature_file,
            name,
        }
    }
}

/// Logical scenario of an executed scenario, whatever its version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutedScenarioIdentity {
    pub feature_file: String,
    pub name: String,
    pub legacy_source: Option<SourceKey>,
}

impl ExecutedScenarioIdentity {
    pub fn of(extended: &ExtendedExecutedScenario<'_>) -> Self {
        let (name, _) = extended.executed_scenario.name_and_functionality_codes();
        ExecutedScenarioIdentity {
            feature_file: extended.executed_scenario.feature_file.clone(),
            name,
            legacy_source: extended.legacy_source.map(Source::key),
        }
    }
}

/// One version of a logical scenario as it ran.
///
/// Step values (durations) are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutedScenarioVersionIdentity {
    pub scenario: ExecutedScenarioIdentity,
    pub branch: String,
    pub severity: String,
    pub steps: Vec<ExecutedScenarioStep>,
    pub functionality_codes: Vec<String>,
}

impl ExecutedScenarioVersionIdentity {
    pub fn of(extended: &ExtendedExecutedScenario<'_>) -> Self {
        let (_, functionality_codes) = extended.executed_scenario.name_and_functionality_codes();
        ExecutedScenarioVersionIdentity {
            scenario: ExecutedScenarioIdentity::of(extended),
            branch: extended.branch.to_string(),
            severity: extended.executed_scenario.severity.clone(),
            steps: extended.executed_scenario.executed_steps(),
            functionality_codes,
        }
    }
}
