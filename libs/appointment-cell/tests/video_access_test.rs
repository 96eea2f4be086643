use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::AppointmentError;
use appointment_cell::services::video_access::VideoAccessService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_utils::clock::ManualClock;
use shared_utils::test_utils::TestConfig;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn user(id: Uuid, role: Role) -> User {
    User {
        id: id.to_string(),
        email: None,
        role,
        metadata: None,
        created_at: None,
    }
}

fn appointment_json(
    id: Uuid,
    provider_id: Uuid,
    client_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "provider_id": provider_id,
        "client_id": client_id,
        "start_time": start.to_rfc3339(),
        "end_time": end.to_rfc3339(),
        "status": status,
        "client_note": null,
        "provider_note": null,
        "video_session_id": "sess_77",
        "video_access_token": null,
        "created_at": start.to_rfc3339(),
        "updated_at": start.to_rfc3339()
    })
}

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config.video_api_base_url = mock_server.uri();
    config
}

#[tokio::test]
async fn a_party_inside_the_window_gets_a_token() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    let start = utc(2025, 6, 4, 10, 0);
    let end = utc(2025, 6, 4, 10, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, client_id, start, end, "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/apps/test-video-app/sessions/sess_77/tokens"))
        .and(body_partial_json(json!({ "role": "publisher" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok_9" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "video_access_token": "tok_9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, client_id, start, end, "scheduled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // 15 minutes before the start, well inside the pre-window.
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 45)));
    let service = VideoAccessService::with_clock(&config_for(&mock_server), clock);

    let join = service
        .request_join_token(appointment_id, &user(client_id, Role::Client), "token")
        .await
        .unwrap();

    assert_eq!(join.video_session_id, "sess_77");
    assert_eq!(join.token, "tok_9");
    // Credentials outlive the appointment by the grace period.
    assert_eq!(join.expires_at, end + Duration::minutes(60));
}

#[tokio::test]
async fn requests_before_the_pre_window_fail() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    let start = utc(2025, 6, 4, 10, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(
            appointment_id,
            Uuid::new_v4(),
            client_id,
            start,
            utc(2025, 6, 4, 10, 30),
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    // No token may be minted.
    Mock::given(method("POST"))
        .and(path("/apps/test-video-app/sessions/sess_77/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok" })))
        .expect(0)
        .mount(&mock_server)
        .await;

    // 31 minutes before the start.
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 29)));
    let service = VideoAccessService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .request_join_token(appointment_id, &user(client_id, Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::TooEarly(_)));
}

#[tokio::test]
async fn strangers_are_refused() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(
            appointment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            utc(2025, 6, 4, 10, 0),
            utc(2025, 6, 4, 10, 30),
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 45)));
    let service = VideoAccessService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .request_join_token(appointment_id, &user(Uuid::new_v4(), Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotAuthorized));
}

#[tokio::test]
async fn cancelled_appointments_issue_no_tokens() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(
            appointment_id,
            Uuid::new_v4(),
            client_id,
            utc(2025, 6, 4, 10, 0),
            utc(2025, 6, 4, 10, 30),
            "cancelled"
        )])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 45)));
    let service = VideoAccessService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .request_join_token(appointment_id, &user(client_id, Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotScheduled));
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 45)));
    let service = VideoAccessService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .request_join_token(Uuid::new_v4(), &user(Uuid::new_v4(), Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotFound));
}
