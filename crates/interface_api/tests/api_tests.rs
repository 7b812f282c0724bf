//! HTTP API tests driving the router in-process

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use core_kernel::UserId;
use domain_reimbursement::Reimbursement;
use interface_api::{auth::create_token, config::ApiConfig, create_router};
use test_utils::{IdFixtures, RequestBuilder, StringFixtures, TestWorkflow};

fn config() -> ApiConfig {
    ApiConfig {
        jwt_secret: StringFixtures::jwt_secret().to_string(),
        ..ApiConfig::default()
    }
}

fn token_for(user: UserId, roles: &[&str]) -> String {
    create_token(
        &user.to_string(),
        roles.iter().map(|r| r.to_string()).collect(),
        StringFixtures::jwt_secret(),
        600,
    )
    .unwrap()
}

fn requester_token() -> String {
    token_for(IdFixtures::requester_id(), &[])
}

fn tsp_token() -> String {
    token_for(IdFixtures::reviewer_id(), &["tsp"])
}

fn admin_token() -> String {
    token_for(IdFixtures::administrator_id(), &["administrative"])
}

async fn setup() -> (Router, TestWorkflow, Reimbursement) {
    let workflow = TestWorkflow::new();
    let (_, reimbursement) = workflow.seed_conference_trip().await;
    let app = create_router(workflow.service.clone(), config());
    (app, workflow, reimbursement)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _, _) = setup().await;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_adapters() {
        let (app, _, _) = setup().await;
        let (status, body) = send(&app, Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["adapters"].as_array().unwrap().len(), 2);
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stranger_is_forbidden() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let stranger = token_for(UserId::new(), &[]);
        let (status, body) = send(&app, Method::GET, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }
}

mod workflow_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_reimbursement_for_own_request() {
        let workflow = TestWorkflow::new();
        let request = RequestBuilder::conference_trip().build();
        workflow.requests.put(request.clone()).await;
        let app = create_router(workflow.service.clone(), config());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/reimbursements",
            Some(&requester_token()),
            Some(json!({ "request_id": request.id.to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["state"], "incomplete");
        assert_eq!(body["user_id"], IdFixtures::requester_id().to_string());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/reimbursements",
            Some(&requester_token()),
            Some(json!({ "request_id": request.id.to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cannot_create_for_someone_elses_request() {
        let workflow = TestWorkflow::new();
        let request = RequestBuilder::new().owned_by(UserId::new()).build();
        workflow.requests.put(request.clone()).await;
        let app = create_router(workflow.service.clone(), config());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/reimbursements",
            Some(&requester_token()),
            Some(json!({ "request_id": request.id.to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submit_then_illegal_authorize() {
        let (app, _, r) = setup().await;

        let uri = format!("/api/v1/reimbursements/{}/events/submit", r.id);
        let (status, body) = send(&app, Method::POST, &uri, Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "tsp_pending");
        assert!(!body["timestamps"]["tsp_pending_since"].is_null());

        let uri = format!("/api/v1/reimbursements/{}/events/authorize", r.id);
        let (status, body) = send(&app, Method::POST, &uri, Some(&admin_token()), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_requester_cannot_approve_own_reimbursement() {
        let (app, workflow, r) = setup().await;
        workflow.service.submit(r.id).await.unwrap();

        let uri = format!("/api/v1/reimbursements/{}/events/approve", r.id);
        let (status, body) = send(&app, Method::POST, &uri, Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let stored = workflow.service.get(r.id).await.unwrap();
        assert_eq!(stored.state(), domain_reimbursement::ReimbursementState::TspPending);
    }

    #[tokio::test]
    async fn test_each_stage_is_fired_by_its_role() {
        let (app, _, r) = setup().await;
        let fire = |event: &str| format!("/api/v1/reimbursements/{}/events/{}", r.id, event);

        let steps = [
            ("submit", requester_token(), "tsp_pending"),
            ("approve", tsp_token(), "tsp_approved"),
            ("authorize", admin_token(), "payment_pending"),
            ("confirm", admin_token(), "payed"),
            ("complete", admin_token(), "completed"),
        ];
        for (event, token, expected) in steps {
            let (status, body) = send(&app, Method::POST, &fire(event), Some(&token), None).await;
            assert_eq!(status, StatusCode::OK, "{event}");
            assert_eq!(body["state"], expected);
        }
    }

    #[tokio::test]
    async fn test_reviewer_cannot_authorize_payment() {
        let (app, workflow, r) = setup().await;
        workflow.service.submit(r.id).await.unwrap();
        workflow.service.approve(r.id).await.unwrap();

        let uri = format!("/api/v1/reimbursements/{}/events/authorize", r.id);
        let (status, _) = send(&app, Method::POST, &uri, Some(&tsp_token()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_event_is_bad_request() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}/events/pay", r.id);
        let (status, _) = send(&app, Method::POST, &uri, Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_available_events() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}/events", r.id);
        let (status, body) = send(&app, Method::GET, &uri, Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"], json!(["submit", "cancel"]));
    }

    #[tokio::test]
    async fn test_list_own_reimbursements() {
        let (app, _, r) = setup().await;
        let (status, body) =
            send(&app, Method::GET, "/api/v1/reimbursements", Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], r.id.to_string());
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_editable_follows_state_and_role() {
        let (app, workflow, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}/editable", r.id);

        let (_, body) = send(&app, Method::GET, &uri, Some(&requester_token()), None).await;
        assert_eq!(body["editable"], true);
        assert_eq!(body["roles"][0]["role"], "requester");

        let (_, body) = send(&app, Method::GET, &uri, Some(&tsp_token()), None).await;
        assert_eq!(body["editable"], false);

        workflow.service.submit(r.id).await.unwrap();
        let (_, body) = send(&app, Method::GET, &uri, Some(&tsp_token()), None).await;
        assert_eq!(body["editable"], true);
        assert_eq!(body["state"], "tsp_pending");
    }

    #[tokio::test]
    async fn test_patch_updates_fields_and_amounts() {
        let (app, workflow, r) = setup().await;
        let request = workflow.service.request_of(r.id).await.unwrap();
        let flight = request.expenses[0].id;

        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let payload = json!({
            "description": StringFixtures::description(),
            "request_attributes": {
                "expenses_attributes": { "0": { "id": flight.to_string(), "total_amount": "401.15" } }
            }
        });
        let (status, body) =
            send(&app, Method::PATCH, &uri, Some(&requester_token()), Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], StringFixtures::description());

        let sum_uri = format!("/api/v1/reimbursements/{}/expenses/sum?kind=total", r.id);
        let (status, body) = send(&app, Method::GET, &sum_uri, Some(&requester_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sums"][0]["currency"], "EUR");
        let amount: rust_decimal::Decimal =
            body["sums"][0]["amount"].as_str().unwrap().parse().unwrap();
        assert_eq!(amount, dec!(401.15));
    }

    #[tokio::test]
    async fn test_patch_with_destroy_marker_is_partially_rejected() {
        let (app, workflow, r) = setup().await;
        let request = workflow.service.request_of(r.id).await.unwrap();
        let flight = request.expenses[0].id;

        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let payload = json!({
            "requester_notes": StringFixtures::requester_notes(),
            "request_attributes": {
                "expenses_attributes": { "0": { "id": flight.to_string(), "_destroy": true } }
            }
        });
        let (status, body) =
            send(&app, Method::PATCH, &uri, Some(&requester_token()), Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "nested_update_rejected");
        assert_eq!(body["details"], json!(["_destroy"]));

        let stored = workflow.service.get(r.id).await.unwrap();
        assert_eq!(stored.requester_notes.as_deref(), Some(StringFixtures::requester_notes()));
        assert_eq!(workflow.service.request_of(r.id).await.unwrap().expenses.len(), 2);
    }

    #[tokio::test]
    async fn test_patch_protected_attribute_is_bad_request() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let (status, _) = send(
            &app,
            Method::PATCH,
            &uri,
            Some(&requester_token()),
            Some(json!({ "state": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reviewer_cannot_patch_before_submission() {
        let (app, _, r) = setup().await;
        let uri = format!("/api/v1/reimbursements/{}", r.id);
        let (status, _) = send(
            &app,
            Method::PATCH,
            &uri,
            Some(&tsp_token()),
            Some(json!({ "tsp_notes": StringFixtures::tsp_notes() })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
