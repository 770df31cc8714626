//! E2E tests: managing the patterns of a problem.

use ara_lib::db::{problems, DbPool};
use ara_lib::error::AppError;
use ara_lib::models::ProblemPattern;
use ara_lib::services::{add_pattern, delete_pattern, update_pattern};

use super::test_helpers::*;

fn pool_with_problem() -> DbPool {
    matching_pool(vec![problem(1, PROJECT_ID, "Cart is broken")], vec![])
}

fn cart_pattern() -> ProblemPattern {
    ProblemPattern {
        feature_file: Some("cart.feature".to_string()),
        ..Default::default()
    }
}

fn errors_of(pool: &DbPool, pattern_id: i64) -> Vec<i64> {
    pool.read(|conn| problems::error_ids_of_pattern(conn, pattern_id))
        .unwrap()
}

#[test]
fn test_add_pattern_assigns_existing_errors() {
    let pool = pool_with_problem();

    let saved = pool
        .transaction(|tx| add_pattern(tx, PROJECT_ID, 1, cart_pattern()))
        .unwrap();

    assert!(saved.id > 0);
    assert_eq!(saved.problem_id, 1);
    assert_eq!(errors_of(&pool, saved.id), vec![1001, 1002]);
}

#[test]
fn test_add_pattern_to_unknown_problem_is_not_found() {
    let pool = pool_with_problem();

    let err = pool
        .transaction(|tx| add_pattern(tx, PROJECT_ID, 99, cart_pattern()))
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Problems of other projects are invisible
    let err = pool
        .transaction(|tx| add_pattern(tx, OTHER_PROJECT_ID, 1, cart_pattern()))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_duplicate_criteria_are_rejected() {
    let pool = pool_with_problem();
    pool.transaction(|tx| add_pattern(tx, PROJECT_ID, 1, cart_pattern()))
        .unwrap();

    let err = pool
        .transaction(|tx| add_pattern(tx, PROJECT_ID, 1, cart_pattern()))
        .unwrap_err();
    assert!(matches!(err, AppError::NotUnique(_)));
    assert!(err.is_validation());
}

#[test]
fn test_update_pattern_reassigns_from_scratch() {
    let pool = pool_with_problem();
    let saved = pool
        .transaction(|tx| add_pattern(tx, PROJECT_ID, 1, cart_pattern()))
        .unwrap();
    assert_eq!(pool.problem_pattern_ids_of_error(1001).unwrap(), vec![saved.id]);

    let narrowed = ProblemPattern {
        exception: Some("NoSuchElement".to_string()),
        // Ignored: a pattern never moves to another problem
        problem_id: 42,
        ..saved.clone()
    };
    let updated = pool
        .transaction(|tx| update_pattern(tx, PROJECT_ID, narrowed))
        .unwrap();

    assert_eq!(updated.problem_id, 1);
    assert_eq!(errors_of(&pool, saved.id), vec![1002]);
    // The error that no longer matches was evicted from the cache
    assert!(pool.problem_pattern_ids_of_error(1001).unwrap().is_empty());
}

#[test]
fn test_update_unknown_pattern_is_not_found() {
    let pool = pool_with_problem();

    let err = pool
        .transaction(|tx| update_pattern(tx, PROJECT_ID, ProblemPattern { id: 77, ..cart_pattern() }))
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_deleting_last_pattern_deletes_problem() {
    let pool = pool_with_problem();
    let (first, second) = pool
        .transaction(|tx| {
            let first = add_pattern(tx, PROJECT_ID, 1, cart_pattern())?;
            let second = add_pattern(
                tx,
                PROJECT_ID,
                1,
                ProblemPattern {
                    exception: Some("Timeout".to_string()),
                    ..Default::default()
                },
            )?;
            Ok((first, second))
        })
        .unwrap();

    let deleted = pool
        .transaction(|tx| delete_pattern(tx, PROJECT_ID, first.id))
        .unwrap();
    assert!(deleted.is_none());
    assert!(errors_of(&pool, first.id).is_empty());
    assert_eq!(errors_of(&pool, second.id), vec![1001]);

    let deleted = pool
        .transaction(|tx| delete_pattern(tx, PROJECT_ID, second.id))
        .unwrap();
    assert_eq!(deleted.map(|problem| problem.id), Some(1));
    let remaining = pool
        .read(|conn| problems::find_problem(conn, PROJECT_ID, 1))
        .unwrap();
    assert!(remaining.is_none());
}
