//! Domain models for ARA.

pub mod legacy;
pub mod migration;
pub mod page;
pub mod problem;

// Re-export commonly used types
pub use legacy::{
    ExecutedScenario, ExecutedScenarioStep, Execution, LegacyProject, Run, RunType, Source,
    SourceKey, StepError, Technology,
};
pub use page::{Direction, Page, Pageable, SortOrder};
pub use problem::{EffectiveProblemStatus, Problem, ProblemPattern, ProblemStatus};
