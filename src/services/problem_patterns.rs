//! Creation, update and deletion of problem patterns.
//!
//! Every change re-synchronises the problem occurrences of the pattern so that
//! associations always reflect its current criteria.

use tracing::info;

use crate::db::{problems, Transaction};
use crate::error::{AppError, AppResult};
use crate::models::{Problem, ProblemPattern};
use crate::services::problem_matching::assign_pattern_to_errors;

fn ensure_unique_criteria(
    tx: &Transaction,
    pattern: &ProblemPattern,
    problem_id: i64,
) -> AppResult<()> {
    let duplicate = problems::patterns_of_problem(tx.connection(), problem_id)?
        .into_iter()
        .any(|existing| existing.id != pattern.id && existing.has_same_criteria_as(pattern));
    if duplicate {
        return Err(AppError::NotUnique(format!(
            "A pattern with the same criteria in problem {}",
            problem_id
        )));
    }
    Ok(())
}

/// Add a pattern to a problem and assign it to the errors it matches.
pub fn add_pattern(
    tx: &mut Transaction,
    project_id: i64,
    problem_id: i64,
    pattern: ProblemPattern,
) -> AppResult<ProblemPattern> {
    if problems::find_problem(tx.connection(), project_id, problem_id)?.is_none() {
        return Err(AppError::NotFound(format!("Problem {}", problem_id)));
    }

    let pattern = ProblemPattern {
        id: 0,
        problem_id,
        ..pattern
    };
    ensure_unique_criteria(tx, &pattern, problem_id)?;

    let saved = problems::insert_pattern(tx.connection(), &pattern)?;
    assign_pattern_to_errors(tx, project_id, &saved)?;
    info!("Added pattern {} to problem {}", saved.id, problem_id);
    Ok(saved)
}

/// Replace the criteria of a pattern and re-assign it from scratch.
///
/// The pattern stays in its problem whatever `problem_id` it is given.
pub fn update_pattern(
    tx: &mut Transaction,
    project_id: i64,
    pattern: ProblemPattern,
) -> AppResult<ProblemPattern> {
    let existing = problems::find_pattern(tx.connection(), project_id, pattern.id)?
        .ok_or_else(|| AppError::NotFound(format!("Problem pattern {}", pattern.id)))?;

    let pattern = ProblemPattern {
        problem_id: existing.problem_id,
        ..pattern
    };
    ensure_unique_criteria(tx, &pattern, existing.problem_id)?;

    let previous_errors = problems::delete_occurrences_of_pattern(tx.connection(), pattern.id)?;
    tx.evict_problem_patterns_after_commit(previous_errors);

    let saved = problems::save_pattern(tx.connection(), &pattern)?;
    assign_pattern_to_errors(tx, project_id, &saved)?;
    info!("Updated pattern {} of problem {}", saved.id, saved.problem_id);
    Ok(saved)
}

/// Delete a pattern and its occurrences.
///
/// Returns the owning problem when it was deleted for having no pattern left.
pub fn delete_pattern(
    tx: &mut Transaction,
    project_id: i64,
    pattern_id: i64,
) -> AppResult<Option<Problem>> {
    let pattern = problems::find_pattern(tx.connection(), project_id, pattern_id)?
        .ok_or_else(|| AppError::NotFound(format!("Problem pattern {}", pattern_id)))?;

    let previous_errors = problems::delete_occurrences_of_pattern(tx.connection(), pattern_id)?;
    tx.evict_problem_patterns_after_commit(previous_errors);
    problems::delete_pattern(tx.connection(), pattern_id)?;
    info!("Deleted pattern {} of problem {}", pattern_id, pattern.problem_id);

    if problems::patterns_of_problem(tx.connection(), pattern.problem_id)?.is_empty() {
        info!("Deleted problem {} with its last pattern", pattern.problem_id);
        return problems::delete_problem(tx.connection(), pattern.problem_id);
    }
    Ok(None)
}
