//! ARA E2E test suite.
//!
//! Runs problem matching and scenario migration against the in-process store,
//! loaded the same way the command line loads a snapshot.
//!
//! Run with: cargo test --test ara_e2e

mod test_helpers;

mod test_predicate_properties;
mod test_problem_patterns;
mod test_scenario_migration;
