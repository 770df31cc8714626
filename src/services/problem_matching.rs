//! Matching of step errors against problem patterns.
//!
//! Errors are associated with patterns through problem occurrences. Searching
//! never writes; assignment inserts occurrences idempotently and evicts the
//! cached patterns of the touched errors once the transaction commits.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::{errors, problems, ErrorRow, Transaction};
use crate::error::AppResult;
use crate::models::{Direction, Page, Pageable, Problem, ProblemPattern, SortOrder, StepError};
use crate::services::error_predicate::ErrorPredicate;

/// Page size used when no page is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Sortable columns of matched errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSortField {
    Id,
    ExecutedScenarioId,
    StepLine,
    Step,
    StepDefinition,
    Exception,
    FeatureFile,
    ScenarioName,
}

impl ErrorSortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "e.id",
            Self::ExecutedScenarioId => "es.id",
            Self::StepLine => "e.step_line",
            Self::Step => "e.step",
            Self::StepDefinition => "e.step_definition",
            Self::Exception => "e.exception",
            Self::FeatureFile => "es.feature_file",
            Self::ScenarioName => "es.name",
        }
    }
}

/// An error matched by a pattern, with its context and current problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedError {
    pub error: StepError,
    pub executed_scenario_id: i64,
    pub feature_file: String,
    pub scenario_name: String,
    pub run_id: i64,
    pub country_code: String,
    pub execution_id: i64,
    pub branch: String,
    pub release: String,
    pub problems: Vec<Problem>,
}

impl MatchedError {
    fn new(row: ErrorRow, problems: Vec<Problem>) -> Self {
        MatchedError {
            error: row.error,
            executed_scenario_id: row.executed_scenario_id,
            feature_file: row.feature_file,
            scenario_name: row.scenario_name,
            run_id: row.run_id,
            country_code: row.country_code,
            execution_id: row.execution_id,
            branch: row.branch,
            release: row.release,
            problems,
        }
    }
}

/// Executed scenario id then step line, both ascending.
pub fn default_error_sort() -> Vec<SortOrder<ErrorSortField>> {
    vec![
        SortOrder::asc(ErrorSortField::ExecutedScenarioId),
        SortOrder::asc(ErrorSortField::StepLine),
    ]
}

/// Page actually used for a search.
///
/// No page gives page 0 of `DEFAULT_PAGE_SIZE` errors; an unsorted page keeps
/// its number and size; both get the default sort.
pub fn effective_pageable(pageable: Option<Pageable<ErrorSortField>>) -> Pageable<ErrorSortField> {
    match pageable {
        None => Pageable::of(0, DEFAULT_PAGE_SIZE).with_sort(default_error_sort()),
        Some(pageable) if pageable.is_unsorted() => pageable.with_sort(default_error_sort()),
        Some(pageable) => pageable,
    }
}

/// SQL sort terms of a page. Ties are broken by error id in the query.
fn order_by(sort: &[SortOrder<ErrorSortField>]) -> Vec<String> {
    sort.iter()
        .map(|order| {
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {}", order.field.column(), direction)
        })
        .collect()
}

/// Find the errors of a project matching a pattern, which may be unsaved.
pub fn find_matching_errors(
    conn: &Connection,
    project_id: i64,
    pattern: &ProblemPattern,
    pageable: Option<Pageable<ErrorSortField>>,
) -> AppResult<Page<MatchedError>> {
    let pageable = effective_pageable(pageable);
    let filter = ErrorPredicate::from_pattern(project_id, pattern).to_filter();

    let total = errors::count_errors(conn, &filter)?;
    let rows = errors::find_errors(
        conn,
        &filter,
        &order_by(&pageable.sort),
        pageable.size,
        pageable.offset(),
    )?;
    debug!("Pattern matched {} errors of project {}", total, project_id);

    let error_ids: Vec<i64> = rows.iter().map(|row| row.error.id).collect();
    let mut problems_by_error = errors_problems(conn, &error_ids)?;

    Ok(Page::new(rows, &pageable, total).map(|row| {
        let problems = problems_by_error.remove(&row.error.id).unwrap_or_default();
        MatchedError::new(row, problems)
    }))
}

/// Distinct problems of each given error. Errors without problems are absent.
pub fn errors_problems(conn: &Connection, error_ids: &[i64]) -> AppResult<BTreeMap<i64, Vec<Problem>>> {
    problems::problems_of_errors(conn, error_ids)
}

/// Associate freshly indexed errors with every pattern of the project they match.
///
/// Returns the distinct problems, ordered by id, owning at least one pattern
/// that matched one of the errors. Running it again with the same errors
/// returns the same problems and inserts nothing.
pub fn auto_assign_problems_to_new_errors(
    tx: &mut Transaction,
    project_id: i64,
    new_error_ids: &[i64],
) -> AppResult<Vec<Problem>> {
    if new_error_ids.is_empty() {
        return Ok(Vec::new());
    }
    let new_error_ids: Vec<i64> = new_error_ids
        .iter()
        .copied()
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect();

    let conn = tx.connection();
    let mut occurrences = Vec::new();
    let mut problem_ids = BTreeSet::new();
    for pattern in problems::patterns_of_project(conn, project_id)? {
        let filter = ErrorPredicate::from_pattern(project_id, &pattern)
            .to_filter()
            .among_ids(&new_error_ids);
        let matched = errors::matching_error_ids(conn, &filter)?;
        if !matched.is_empty() {
            problem_ids.insert(pattern.problem_id);
        }
        occurrences.extend(matched.into_iter().map(|error_id| (error_id, pattern.id)));
    }

    let problem_ids: Vec<i64> = problem_ids.into_iter().collect();
    let assigned_problems = problems::problems_by_ids(conn, &problem_ids)?;

    let matched_errors: BTreeSet<i64> = occurrences.iter().map(|&(error_id, _)| error_id).collect();
    let inserted = problems::insert_occurrences(conn, occurrences)?;
    info!(
        "Inserted {} problem occurrences for {} new errors of project {}",
        inserted,
        new_error_ids.len(),
        project_id
    );
    let reappeared = assigned_problems
        .iter()
        .filter(|problem| !problem.is_handled())
        .count();
    if reappeared > 0 {
        warn!(
            "{} of {} matched problems of project {} reappeared after closing",
            reappeared,
            assigned_problems.len(),
            project_id
        );
    }

    tx.evict_problem_patterns_after_commit(matched_errors.into_iter().collect());
    Ok(assigned_problems)
}

/// Associate a saved pattern with every error of the project it matches.
///
/// Returns the number of occurrences inserted.
pub fn assign_pattern_to_errors(
    tx: &mut Transaction,
    project_id: i64,
    pattern: &ProblemPattern,
) -> AppResult<usize> {
    let filter = ErrorPredicate::from_pattern(project_id, pattern).to_filter();
    let matched_errors = errors::matching_error_ids(tx.connection(), &filter)?;

    let inserted = problems::insert_occurrences(
        tx.connection(),
        matched_errors.iter().map(|&error_id| (error_id, pattern.id)),
    )?;
    info!(
        "Inserted {} problem occurrences for pattern {} ({} errors matched)",
        inserted,
        pattern.id,
        matched_errors.len()
    );

    tx.evict_problem_patterns_after_commit(matched_errors);
    Ok(inserted)
}
