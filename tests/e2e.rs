//! End-to-end scenarios that exercise the API and the worker loop together:
//! submit-and-run to completion, secret reference resolution and masking in
//! persisted logs, tenant isolation, overlay secret-override gating, master
//! key rotation, and token expiry. Every job here runs through
//! `reactorcide::worker::engine::run_once` against a plain-process runner,
//! so no container daemon is required.

mod common;

use axum::http::StatusCode;
use reactorcide::store::Role;
use reactorcide::worker::run_once;
use serde_json::json;

use common::{json_request, send, TestApp};

#[tokio::test]
async fn submit_and_run_job_completes_and_logs_are_retrievable() {
    let app = TestApp::new().await;
    let (_, token) = app.create_authenticated_user(Role::User);

    let body = json!({
        "name": "greet",
        "source_type": "none",
        "job_command": "/bin/sh -c 'echo hello-world'",
    });
    let (status, created) =
        send(app.router(), json_request("POST", "/api/v1/jobs", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let ctx = app.worker_context();
    assert!(run_once(ctx).await.unwrap());

    let (status, job) =
        send(app.router(), json_request("GET", &format!("/api/v1/jobs/{id}"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "completed");
    assert_eq!(job["exit_code"], 0);

    let (status, logs) = send(
        app.router(),
        json_request("GET", &format!("/api/v1/jobs/{id}/logs?stream=stdout"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages: Vec<String> =
        logs.as_array().unwrap().iter().map(|e| e["message"].as_str().unwrap().to_string()).collect();
    assert!(messages.iter().any(|m| m.contains("hello-world")));
}

#[tokio::test]
async fn failing_job_command_is_recorded_as_failed() {
    let app = TestApp::new().await;
    let (_, token) = app.create_authenticated_user(Role::User);

    let body = json!({
        "name": "fail",
        "source_type": "none",
        "job_command": "/bin/sh -c 'exit 7'",
    });
    let (_, created) =
        send(app.router(), json_request("POST", "/api/v1/jobs", Some(&token), Some(body))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let ctx = app.worker_context();
    assert!(run_once(ctx).await.unwrap());

    let (_, job) =
        send(app.router(), json_request("GET", &format!("/api/v1/jobs/{id}"), Some(&token), None)).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["exit_code"], 7);
}

#[tokio::test]
async fn secret_reference_is_resolved_and_masked_in_persisted_logs() {
    let app = TestApp::new().await;
    let (_, token) = app.create_authenticated_user(Role::User);

    let (status, _) = send(
        app.router(),
        json_request(
            "PUT",
            "/api/v1/secrets/value?path=ci%2Fcreds&key=token",
            Some(&token),
            Some(json!({ "value": "ghp_super_secret_value" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = json!({
        "name": "use-secret",
        "source_type": "none",
        "job_command": "/bin/sh -c 'echo $CI_TOKEN'",
        "job_env_vars": { "CI_TOKEN": "${secret:ci/creds:token}" },
    });
    let (_, created) =
        send(app.router(), json_request("POST", "/api/v1/jobs", Some(&token), Some(body))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let ctx = app.worker_context();
    assert!(run_once(ctx).await.unwrap());

    let (_, logs) = send(
        app.router(),
        json_request("GET", &format!("/api/v1/jobs/{id}/logs?stream=stdout"), Some(&token), None),
    )
    .await;
    let text: String =
        logs.as_array().unwrap().iter().map(|e| e["message"].as_str().unwrap()).collect::<Vec<_>>().join("\n");
    assert!(!text.contains("ghp_super_secret_value"), "raw secret leaked into logs: {text}");
    assert!(text.contains("***REDACTED***"));
}

#[tokio::test]
async fn a_tenants_secret_is_invisible_to_another_tenant() {
    let app = TestApp::new().await;
    let (_, token_a) = app.create_authenticated_user(Role::User);
    let (_, token_b) = app.create_authenticated_user(Role::User);

    send(
        app.router(),
        json_request(
            "PUT",
            "/api/v1/secrets/value?path=ci%2Fcreds&key=token",
            Some(&token_a),
            Some(json!({ "value": "a-secret" })),
        ),
    )
    .await;

    let (status, _) = send(
        app.router(),
        json_request("GET", "/api/v1/secrets/value?path=ci%2Fcreds&key=token", Some(&token_b), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overlay_replacing_a_secret_reference_requires_opt_in() {
    let app = TestApp::new().await;
    let (_, token) = app.create_authenticated_user(Role::User);

    let body = json!({
        "name": "overlaid",
        "source_type": "none",
        "job_command": "true",
        "job_env_vars": { "TOKEN": "${secret:ci/creds:token}" },
        "overlays": [{ "label": "prod", "environment": { "TOKEN": "literal-value" } }],
    });
    let (status, _) =
        send(app.router(), json_request("POST", "/api/v1/jobs", Some(&token), Some(body.clone()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut allowed = body;
    allowed["allow_secret_overrides"] = json!(true);
    let (status, _) =
        send(app.router(), json_request("POST", "/api/v1/jobs", Some(&token), Some(allowed))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn master_key_rotation_preserves_existing_secret_access() {
    let app = TestApp::new().await;
    let (_, token) = app.create_authenticated_user(Role::User);
    let (_, admin_token) = app.create_authenticated_user(Role::Admin);

    send(
        app.router(),
        json_request(
            "PUT",
            "/api/v1/secrets/value?path=ci%2Fcreds&key=token",
            Some(&token),
            Some(json!({ "value": "rotate-me-safely" })),
        ),
    )
    .await;

    let (status, _) = send(
        app.router(),
        json_request(
            "POST",
            "/api/v1/admin/secrets/master-keys",
            Some(&admin_token),
            Some(json!({ "name": "k1", "description": "rotation target" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app.router(),
        json_request("POST", "/api/v1/admin/secrets/master-keys/k1/rotate", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app.router(),
        json_request("GET", "/api/v1/secrets/value?path=ci%2Fcreds&key=token", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "rotate-me-safely");
}

#[tokio::test]
async fn cannot_decommission_the_primary_master_key() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.create_authenticated_user(Role::Admin);

    let (_, list) = send(
        app.router(),
        json_request("GET", "/api/v1/admin/secrets/master-keys", Some(&admin_token), None),
    )
    .await;
    let primary = list["master_keys"].as_array().unwrap().iter().find(|k| k["is_primary"] == true).unwrap();
    let name = primary["name"].as_str().unwrap();

    let (status, _) = send(
        app.router(),
        json_request(
            "DELETE",
            &format!("/api/v1/admin/secrets/master-keys/{name}"),
            Some(&admin_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::new().await;
    let (user, admin_token) = app.create_authenticated_user(Role::Admin);

    let (status, created) = send(
        app.router(),
        json_request(
            "POST",
            "/api/v1/tokens",
            Some(&admin_token),
            Some(json!({
                "user_id": user.id,
                "name": "short-lived",
                "expires_at": "2020-01-01T00:00:00Z",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let expired_token = created["token"].as_str().unwrap();

    let (status, _) =
        send(app.router(), json_request("GET", "/api/v1/jobs", Some(expired_token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
