//! Public endpoints: verify, static keys, banner and health

#[path = "../common/mod.rs"]
mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use serde_json::json;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

// ============ Banner / health ============

#[tokio::test]
async fn test_root_banner() {
    let app = test_app(create_test_app_state());

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "QuickWoo Static License API ready.");
}

#[tokio::test]
async fn test_health() {
    let app = test_app(create_test_app_state());

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(create_test_app_state());
    let response = app.oneshot(get("/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============ POST /verify-license ============

#[tokio::test]
async fn test_verify_valid_life_license() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, today())
    };

    let response = test_app(state.clone())
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": license.license_key,
                "email": "a@b.com",
                "plugin": "quick-seo"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({ "valid": true, "plugin": "quick-seo", "plan": "life", "expires_at": null })
    );

    let conn = state.db.get().unwrap();
    let stored = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert!(stored.validated_at.is_some(), "successful verify records validated_at");
}

#[tokio::test]
async fn test_verify_year_license_reports_expiry() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        create_test_license(&conn, "a@b.com", "quick-edit", Plan::Year, today())
    };
    let expected_expiry = license.expires_at.unwrap().format("%Y-%m-%d").to_string();

    let response = test_app(state)
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": license.license_key,
                "email": "a@b.com",
                "plugin": "quick-edit"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["plan"], "year");
    assert_eq!(body["expires_at"], expected_expiry);
}

#[tokio::test]
async fn test_verify_trims_inputs() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, today())
    };

    let response = test_app(state)
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": format!(" {} ", license.license_key),
                "email": " a@b.com",
                "plugin": "quick-seo "
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verify_wrong_plugin_is_403_not_found() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, today())
    };

    let response = test_app(state)
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": license.license_key,
                "email": "a@b.com",
                "plugin": "quick-edit"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "valid": false, "reason": "not_found" })
    );
}

#[tokio::test]
async fn test_verify_expired_is_403_with_expiry() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        create_test_license(&conn, "a@b.com", "quick-edit", Plan::Year, date(2020, 1, 1))
    };

    let response = test_app(state)
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": license.license_key,
                "email": "a@b.com",
                "plugin": "quick-edit"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "valid": false, "reason": "expired", "expires_at": "2020-12-31" })
    );
}

#[tokio::test]
async fn test_verify_revoked_is_403_with_reason() {
    let state = create_test_app_state();
    let license = {
        let conn = state.db.get().unwrap();
        let license = create_test_license(&conn, "a@b.com", "quick-seo", Plan::Life, today());
        revoke_license(&conn, &license.license_key, "a@b.com", "refund", chrono::Utc::now()).unwrap();
        license
    };

    let response = test_app(state)
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({
                "license_key": license.license_key,
                "email": "a@b.com",
                "plugin": "quick-seo"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "valid": false, "reason": "revoked", "revoke_reason": "refund" })
    );
}

#[tokio::test]
async fn test_verify_malformed_body_is_400_json() {
    let app = test_app(create_test_app_state());

    let response = app
        .oneshot(json_request(
            "POST",
            "/verify-license",
            &json!({ "license_key": "QW-X", "email": "a@b.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Bad request");
}

// ============ GET /static-license ============

#[tokio::test]
async fn test_static_license_single_product() {
    let app = test_app(create_test_app_state());

    let response = app
        .oneshot(get("/static-license?email=a@b.com&product=quick-seo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "email": "a@b.com",
            "product": "quick-seo",
            "license_keys": ["QW-QUICKSEO-STATIC-KEY"]
        })
    );
}

#[tokio::test]
async fn test_static_license_bundle_has_every_key() {
    let app = test_app(create_test_app_state());

    let response = app
        .oneshot(get("/static-license?email=a@b.com&product=quickwoo-bundle"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["license_keys"],
        json!([
            "QW-QUICKADD-STATIC-KEY",
            "QW-QUICKEDIT-STATIC-KEY",
            "QW-QUICKSEO-STATIC-KEY",
            "QW-QUICKBLOG-STATIC-KEY"
        ])
    );
}

#[tokio::test]
async fn test_static_license_unknown_product_is_404() {
    let app = test_app(create_test_app_state());

    let response = app
        .oneshot(get("/static-license?email=a@b.com&product=quick-chat"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Product not recognized");
}

#[tokio::test]
async fn test_static_license_rejects_bad_email() {
    let app = test_app(create_test_app_state());

    let response = app
        .oneshot(get("/static-license?email=not-an-email&product=quick-seo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_static_license_missing_params_is_400() {
    let app = test_app(create_test_app_state());

    let response = app.oneshot(get("/static-license?product=quick-seo")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
