//! Business logic services.

pub mod error_predicate;
pub mod problem_matching;
pub mod problem_patterns;
pub mod scenario_identity;
pub mod scenario_migration;
pub mod snapshot;

pub use error_predicate::ErrorPredicate;
pub use problem_matching::{
    assign_pattern_to_errors, auto_assign_problems_to_new_errors, errors_problems,
    find_matching_errors, ErrorSortField, MatchedError,
};
pub use problem_patterns::{add_pattern, delete_pattern, update_pattern};
pub use scenario_migration::migrate_scenarios;
pub use snapshot::Snapshot;
