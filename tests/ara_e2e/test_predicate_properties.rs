//! Property tests of pattern matching over the matching fixture.

use std::collections::BTreeSet;

use proptest::prelude::*;
use rusqlite::params;

use ara_lib::db::{errors, DbPool};
use ara_lib::models::ProblemPattern;
use ara_lib::services::ErrorPredicate;

use super::test_helpers::*;

fn matched_ids(pool: &DbPool, pattern: &ProblemPattern) -> BTreeSet<i64> {
    let filter = ErrorPredicate::from_pattern(PROJECT_ID, pattern).to_filter();
    pool.read(|conn| errors::matching_error_ids(conn, &filter))
        .unwrap()
        .into_iter()
        .collect()
}

/// Evaluate `value LIKE pattern` the way the store does.
fn like(pool: &DbPool, value: &str, pattern: &str) -> bool {
    pool.read(|conn| {
        Ok(conn.query_row("SELECT ?1 LIKE ?2", params![value, pattern], |row| row.get(0))?)
    })
    .unwrap()
}

fn text(values: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(values).prop_map(str::to_string))
}

prop_compose! {
    fn arb_pattern()(
        feature_file in text(&["cart.feature", "api.feature", "other.feature"]),
        scenario_name in text(&["Add a product", "Call", "functionality 1: Add a product"]),
        scenario_name_starts_with in any::<bool>(),
        step in text(&["I click on", "I see the cart", "I ", "I call GET /products"]),
        step_starts_with in any::<bool>(),
        exception in text(&["Timeout", "cart", "500", "Exception"]),
        release in text(&["v1", "v2"]),
        country_code in text(&["fr", "us"]),
        type_code in text(&["firefox", "api"]),
        type_is_browser in prop::option::of(any::<bool>()),
        type_is_mobile in prop::option::of(any::<bool>()),
    ) -> ProblemPattern {
        ProblemPattern {
            feature_file,
            scenario_name,
            scenario_name_starts_with,
            step,
            step_starts_with,
            exception,
            release,
            country_code,
            type_code,
            type_is_browser,
            type_is_mobile,
            ..Default::default()
        }
    }
}

/// `base` with the criteria it leaves empty taken from `extra`.
fn narrowed(base: &ProblemPattern, extra: &ProblemPattern) -> ProblemPattern {
    let (scenario_name, scenario_name_starts_with) = match &base.scenario_name {
        Some(_) => (base.scenario_name.clone(), base.scenario_name_starts_with),
        None => (extra.scenario_name.clone(), extra.scenario_name_starts_with),
    };
    let (step, step_starts_with) = match &base.step {
        Some(_) => (base.step.clone(), base.step_starts_with),
        None => (extra.step.clone(), extra.step_starts_with),
    };
    ProblemPattern {
        feature_file: base.feature_file.clone().or(extra.feature_file.clone()),
        scenario_name,
        scenario_name_starts_with,
        step,
        step_starts_with,
        exception: base.exception.clone().or(extra.exception.clone()),
        release: base.release.clone().or(extra.release.clone()),
        country_code: base.country_code.clone().or(extra.country_code.clone()),
        type_code: base.type_code.clone().or(extra.type_code.clone()),
        type_is_browser: base.type_is_browser.or(extra.type_is_browser),
        type_is_mobile: base.type_is_mobile.or(extra.type_is_mobile),
        ..base.clone()
    }
}

proptest! {
    #[test]
    fn test_more_criteria_never_match_more_errors(base in arb_pattern(), extra in arb_pattern()) {
        let pool = matching_pool(vec![], vec![]);
        let narrow = narrowed(&base, &extra);

        let base_matches = matched_ids(&pool, &base);
        let narrow_matches = matched_ids(&pool, &narrow);
        prop_assert!(narrow_matches.is_subset(&base_matches));
        prop_assert!(!base_matches.contains(&2001));
    }

    #[test]
    fn test_any_step_prefix_matches_with_starts_with(error_index in 0usize..3, length in 1usize..30) {
        let pool = matching_pool(vec![], vec![]);
        let (error_id, step) = [
            (1001, "I click on \"buy\""),
            (1002, "I see the cart"),
            (1003, "I call GET /products"),
        ][error_index];
        let prefix = &step[..length.min(step.len())];

        let pattern = ProblemPattern {
            step: Some(prefix.to_string()),
            step_starts_with: true,
            ..Default::default()
        };
        prop_assert!(matched_ids(&pool, &pattern).contains(&error_id));
    }

    #[test]
    fn test_like_without_wildcards_is_equality(
        pattern in "[a-z.()*+?|^$ \\[\\]{}]{0,8}",
        value in "[a-z.()*+?|^$ \\[\\]{}]{0,8}",
    ) {
        let pool = DbPool::new().unwrap();
        prop_assert!(like(&pool, &pattern, &pattern));
        prop_assert_eq!(like(&pool, &value, &pattern), pattern == value);
    }

    #[test]
    fn test_like_is_case_sensitive(value in "[a-z]{1,8}") {
        let pool = DbPool::new().unwrap();
        prop_assert!(!like(&pool, &value, &value.to_uppercase()));
        let prefix_pattern = format!("{}%", &value[..1]);
        prop_assert!(like(&pool, &value, &prefix_pattern));
    }
}
