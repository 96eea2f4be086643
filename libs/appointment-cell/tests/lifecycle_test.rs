use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentStatus, SchedulingRules};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use appointment_cell::services::video_access::validate_join_time;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::time::TimeWindow;
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
        "video_session_id": "sess_1",
        "video_access_token": null,
        "created_at": start.to_rfc3339(),
        "updated_at": start.to_rfc3339()
    })
}

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

// ==============================================================================
// TRANSITION TABLE
// ==============================================================================

#[test]
fn scheduled_can_cancel_or_complete() {
    let next = AppointmentLifecycleService::valid_transitions(&AppointmentStatus::Scheduled);
    assert!(next.contains(&AppointmentStatus::Cancelled));
    assert!(next.contains(&AppointmentStatus::Completed));
}

#[test]
fn terminal_states_are_closed() {
    assert!(AppointmentLifecycleService::valid_transitions(&AppointmentStatus::Cancelled).is_empty());
    assert!(AppointmentLifecycleService::valid_transitions(&AppointmentStatus::Completed).is_empty());

    assert_matches!(
        AppointmentLifecycleService::validate_transition(
            &AppointmentStatus::Cancelled,
            &AppointmentStatus::Completed
        ),
        Err(AppointmentError::NotScheduled)
    );
    assert_matches!(
        AppointmentLifecycleService::validate_transition(
            &AppointmentStatus::Completed,
            &AppointmentStatus::Cancelled
        ),
        Err(AppointmentError::NotScheduled)
    );
}

// ==============================================================================
// JOIN-TOKEN TIME GATE
// ==============================================================================

#[test]
fn join_gate_opens_thirty_minutes_before_start() {
    let rules = SchedulingRules::default();
    let window =
        TimeWindow::new(utc(2025, 6, 4, 10, 0), utc(2025, 6, 4, 10, 30)).unwrap();

    // 31 minutes early: closed.
    assert_matches!(
        validate_join_time(utc(2025, 6, 4, 9, 29), &window, &rules),
        Err(AppointmentError::TooEarly(_))
    );
    // 29 minutes early: open.
    assert!(validate_join_time(utc(2025, 6, 4, 9, 31), &window, &rules).is_ok());
    // Still open at the scheduled end...
    assert!(validate_join_time(utc(2025, 6, 4, 10, 30), &window, &rules).is_ok());
    // ...and closed afterwards.
    assert_matches!(
        validate_join_time(utc(2025, 6, 4, 10, 31), &window, &rules),
        Err(AppointmentError::TooEarly(_))
    );
}

// ==============================================================================
// LIFECYCLE OPERATIONS
// ==============================================================================

#[tokio::test]
async fn either_party_can_cancel_a_scheduled_appointment() {
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

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, client_id, start, end, "cancelled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let cancelled = service
        .cancel(appointment_id, &user(client_id, Role::Client), "token")
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn a_stranger_cannot_cancel() {
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

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .cancel(appointment_id, &user(Uuid::new_v4(), Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotAuthorized));
}

#[tokio::test]
async fn completion_is_gated_on_the_scheduled_end() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();
    let start = utc(2025, 6, 4, 10, 0);
    let end = utc(2025, 6, 4, 10, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, Uuid::new_v4(), start, end, "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, Uuid::new_v4(), start, end, "completed")
        ])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 10, 15)));
    let service = AppointmentLifecycleService::with_clock(
        &config_for(&mock_server),
        Arc::clone(&clock) as Arc<dyn shared_utils::clock::Clock>,
    );
    let provider = user(provider_id, Role::Provider);

    // Mid-appointment: too early to complete.
    let result = service.complete(appointment_id, &provider, "token").await;
    assert_matches!(result, Err(AppointmentError::TooEarly(_)));

    // Once the end has passed, completion goes through.
    clock.set(utc(2025, 6, 4, 10, 30));
    let completed = service.complete(appointment_id, &provider, "token").await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn only_the_provider_may_complete() {
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
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 11, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .complete(appointment_id, &user(client_id, Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotAuthorized));
}

#[tokio::test]
async fn cancelled_appointments_cannot_be_completed() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(
            appointment_id,
            provider_id,
            Uuid::new_v4(),
            utc(2025, 6, 4, 10, 0),
            utc(2025, 6, 4, 10, 30),
            "cancelled"
        )])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 11, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .complete(appointment_id, &user(provider_id, Role::Provider), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotScheduled));
}

#[tokio::test]
async fn provider_notes_do_not_change_status() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();
    let start = utc(2025, 6, 4, 10, 0);
    let end = utc(2025, 6, 4, 10, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, provider_id, Uuid::new_v4(), start, end, "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    let mut noted =
        appointment_json(appointment_id, provider_id, Uuid::new_v4(), start, end, "scheduled");
    noted["provider_note"] = json!("follow up in two weeks");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "provider_note": "follow up in two weeks" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([noted])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let updated = service
        .annotate(
            appointment_id,
            &user(provider_id, Role::Provider),
            "follow up in two weeks",
            "token",
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Scheduled);
    assert_eq!(updated.provider_note.as_deref(), Some("follow up in two weeks"));
}

#[tokio::test]
async fn notes_are_rejected_on_terminal_appointments() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(
            appointment_id,
            provider_id,
            Uuid::new_v4(),
            utc(2025, 6, 4, 10, 0),
            utc(2025, 6, 4, 10, 30),
            "completed"
        )])))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 11, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .annotate(appointment_id, &user(provider_id, Role::Provider), "note", "token")
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

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 4, 9, 0)));
    let service = AppointmentLifecycleService::with_clock(&config_for(&mock_server), clock);

    let result = service
        .cancel(Uuid::new_v4(), &user(Uuid::new_v4(), Role::Client), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotFound));
}
