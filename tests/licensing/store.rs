//! License store query tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use quickwoo_license::error::AppError;

fn sample_license(key: &str, email: &str, plugin: &str, plan: Plan) -> License {
    let issued_at = date(2025, 1, 15);
    License {
        id: queries::gen_id(),
        license_key: key.to_string(),
        email: email.to_string(),
        plugin: plugin.to_string(),
        plan,
        issued_at,
        expires_at: plan.expires_at(issued_at),
        validated_at: None,
        revoked: false,
        revoke_reason: None,
        revoked_at: None,
    }
}

#[test]
fn test_create_and_find_by_triple() {
    let conn = setup_test_db();
    let license = sample_license("QW-QUICKS-LIFE-20250115-AAAAAA", "a@b.com", "quick-seo", Plan::Life);
    queries::create_license(&conn, &license).unwrap();

    let found = queries::get_license_by_key_email_plugin(
        &conn,
        "QW-QUICKS-LIFE-20250115-AAAAAA",
        "a@b.com",
        "quick-seo",
    )
    .unwrap()
    .expect("license should be found");

    assert_eq!(found, license);
}

#[test]
fn test_find_by_triple_requires_exact_match() {
    let conn = setup_test_db();
    let license = sample_license("QW-KEY-1", "a@b.com", "quick-seo", Plan::Life);
    queries::create_license(&conn, &license).unwrap();

    let miss = |key: &str, email: &str, plugin: &str| {
        queries::get_license_by_key_email_plugin(&conn, key, email, plugin)
            .unwrap()
            .is_none()
    };

    assert!(miss("QW-KEY-1", "a@b.com", "quick-edit"), "wrong plugin");
    assert!(miss("QW-KEY-1", "other@b.com", "quick-seo"), "wrong email");
    assert!(miss("QW-KEY-2", "a@b.com", "quick-seo"), "wrong key");
}

#[test]
fn test_duplicate_key_is_conflict() {
    let conn = setup_test_db();
    queries::create_license(&conn, &sample_license("QW-DUP", "a@b.com", "quick-seo", Plan::Life))
        .unwrap();

    let result =
        queries::create_license(&conn, &sample_license("QW-DUP", "c@d.com", "quick-add", Plan::Year));

    assert!(
        matches!(result, Err(AppError::Conflict(_))),
        "duplicate key should be a conflict, got {:?}",
        result
    );

    // The original record is untouched
    let original = queries::get_license_by_key_and_email(&conn, "QW-DUP", "a@b.com")
        .unwrap()
        .expect("original license should remain");
    assert_eq!(original.plugin, "quick-seo");
}

#[test]
fn test_dates_round_trip_as_dates() {
    let conn = setup_test_db();
    let license = sample_license("QW-YEAR", "a@b.com", "quick-edit", Plan::Year);
    queries::create_license(&conn, &license).unwrap();

    let found = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert_eq!(found.issued_at, date(2025, 1, 15));
    assert_eq!(found.expires_at, Some(date(2026, 1, 15)));
    assert_eq!(found.plan, Plan::Year);
}

#[test]
fn test_list_by_email_is_ordered_by_issue_date() {
    let conn = setup_test_db();
    let newer = create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, date(2025, 3, 1));
    let older = create_test_license(&conn, "a@b.com", "quick-edit", Plan::Year, date(2024, 6, 1));
    let same_day = create_test_license(&conn, "a@b.com", "quick-add", Plan::Life, date(2025, 3, 1));
    create_test_license(&conn, "someone@else.com", "quick-seo", Plan::Life, date(2024, 1, 1));

    let keys: Vec<String> = queries::list_licenses_by_email(&conn, "a@b.com")
        .unwrap()
        .into_iter()
        .map(|l| l.license_key)
        .collect();

    assert_eq!(
        keys,
        vec![older.license_key, newer.license_key, same_day.license_key],
        "ordered by issued_at, then insertion order"
    );
}

#[test]
fn test_list_by_unknown_email_is_empty() {
    let conn = setup_test_db();
    assert!(queries::list_licenses_by_email(&conn, "nobody@b.com").unwrap().is_empty());
}

#[test]
fn test_mark_validated_advances_timestamp() {
    let conn = setup_test_db();
    let license = create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, date(2025, 1, 15));

    assert!(queries::mark_license_validated(&conn, &license.id, 1_000).unwrap());
    assert!(queries::mark_license_validated(&conn, &license.id, 2_000).unwrap());

    let found = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert_eq!(found.validated_at, Some(2_000));
}

#[test]
fn test_mark_on_missing_license_reports_false() {
    let conn = setup_test_db();
    assert!(!queries::mark_license_validated(&conn, "missing", 1).unwrap());
    assert!(!queries::mark_license_revoked(&conn, "missing", "refund", 1).unwrap());
}

#[test]
fn test_mark_revoked_sets_all_fields() {
    let conn = setup_test_db();
    let license = create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, date(2025, 1, 15));

    assert!(queries::mark_license_revoked(&conn, &license.id, "chargeback", 1_700_000_000).unwrap());

    let found = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert!(found.revoked);
    assert_eq!(found.revoke_reason.as_deref(), Some("chargeback"));
    assert_eq!(found.revoked_at, Some(1_700_000_000));
}

#[test]
fn test_schema_rejects_life_plan_with_expiry() {
    let conn = setup_test_db();
    let mut license = sample_license("QW-BAD", "a@b.com", "quick-seo", Plan::Life);
    license.expires_at = Some(date(2026, 1, 15));

    let result = queries::create_license(&conn, &license);
    assert!(
        matches!(result, Err(AppError::Database(_))),
        "CHECK violation should surface as a database error, got {:?}",
        result
    );
}

#[test]
fn test_claim_checkout_session_once() {
    let conn = setup_test_db();

    assert!(!queries::is_checkout_session_processed(&conn, "cs_1").unwrap());
    assert!(queries::try_claim_checkout_session(&conn, "cs_1").unwrap());
    assert!(!queries::try_claim_checkout_session(&conn, "cs_1").unwrap());
    assert!(queries::is_checkout_session_processed(&conn, "cs_1").unwrap());
    assert!(!queries::is_checkout_session_processed(&conn, "cs_2").unwrap());
}

#[test]
fn test_init_db_is_idempotent() {
    let conn = setup_test_db();
    create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, date(2025, 1, 15));

    init_db(&conn).expect("re-running schema init should succeed");
    assert_eq!(queries::list_licenses_by_email(&conn, "a@b.com").unwrap().len(), 1);
}
