use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::stores::{
    AppointmentPatch, AppointmentRepository, PatientDirectory, PaymentLedger,
    SupabaseAppointmentStore, SupabasePatientDirectory, SupabasePaymentLedger,
};
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "staff-token";

fn client_for(server: &MockServer) -> Arc<SupabaseClient> {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    Arc::new(SupabaseClient::new(&config))
}

fn appointments_for(server: &MockServer) -> SupabaseAppointmentStore {
    SupabaseAppointmentStore::new(client_for(server), Some(TOKEN.to_string()))
}

#[tokio::test]
async fn test_get_fetches_single_row_with_caller_token() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &id.to_string(),
                &patient_id.to_string(),
                "2024-03-04",
                "09:00:00",
                "attente"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = appointments_for(&server).get(id).await.unwrap().unwrap();

    assert_eq!(appointment.id, id);
    assert_eq!(appointment.patient_id, patient_id);
    assert_eq!(appointment.status, AppointmentStatus::Attente);
    assert_eq!(appointment.room, Room::Unassigned);
}

#[tokio::test]
async fn test_get_unknown_id_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(appointments_for(&server).get(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_list_by_date_filters_and_orders() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("date", "eq.2024-03-04"))
        .and(query_param("order", "time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2024-03-04",
                "08:30:00",
                "programme"
            ),
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2024-03-04",
                "09:30:00",
                "termine"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = appointments_for(&server)
        .list_by_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].status, AppointmentStatus::Termine);
}

#[tokio::test]
async fn test_conditional_update_filters_on_status() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.programme"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let patch = AppointmentPatch {
        status: Some(AppointmentStatus::Retard),
        ..AppointmentPatch::default()
    };
    let result = appointments_for(&server)
        .update_where_status(id, AppointmentStatus::Programme, &patch)
        .await
        .unwrap();

    // Row moved on meanwhile
    assert_eq!(result, None);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, json!({ "status": "retard" }));
}

#[tokio::test]
async fn test_update_many_is_one_rpc_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/apply_appointment_patches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(2)))
        .expect(1)
        .mount(&server)
        .await;

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let arrived = Utc.with_ymd_and_hms(2024, 3, 4, 8, 50, 0).unwrap();
    let patches = vec![
        (
            first,
            AppointmentPatch {
                status: Some(AppointmentStatus::Attente),
                priority: Some(1),
                arrival_timestamp: Some(Some(arrived)),
                waiting_duration_minutes: Some(None),
                ..AppointmentPatch::default()
            },
        ),
        (
            second,
            AppointmentPatch {
                priority: Some(0),
                ..AppointmentPatch::default()
            },
        ),
    ];

    appointments_for(&server).update_many(&patches).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent = body["patches"].as_array().unwrap();

    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["id"], json!(first));
    assert_eq!(sent[0]["status"], "attente");
    assert_eq!(sent[0]["waiting_duration_minutes"], Value::Null);
    assert_eq!(sent[1], json!({ "id": second, "priority": 0 }));
}

#[tokio::test]
async fn test_update_many_with_nothing_to_do_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(0)))
        .expect(0)
        .mount(&server)
        .await;

    appointments_for(&server).update_many(&[]).await.unwrap();
}

#[tokio::test]
async fn test_rejected_batch_is_database_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/apply_appointment_patches"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(MockSupabaseResponses::error_response("appointment not found", "P0002")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let patches = vec![(
        Uuid::new_v4(),
        AppointmentPatch {
            priority: Some(0),
            ..AppointmentPatch::default()
        },
    )];
    let result = appointments_for(&server).update_many(&patches).await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
}

#[tokio::test]
async fn test_storage_failure_is_database_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(MockSupabaseResponses::error_response("boom", "XX000")),
        )
        .mount(&server)
        .await;

    let result = appointments_for(&server).get(Uuid::new_v4()).await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
}

#[tokio::test]
async fn test_patient_directory_batches_lookup() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("in.({})", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&id.to_string(), "Karim", "Haddad", "+213 555 0199")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let directory = SupabasePatientDirectory::new(client_for(&server), Some(TOKEN.to_string()));
    let contacts = directory.find_contacts(&[id]).await.unwrap();

    let contact = &contacts[&id];
    assert_eq!(contact.full_name(), "Karim Haddad");
    assert_eq!(contact.phone.as_deref(), Some("+213 555 0199"));
    assert_eq!(contact.email.as_deref(), Some("karim@example.com"));
}

#[tokio::test]
async fn test_patient_directory_failure_is_external() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let directory = SupabasePatientDirectory::new(client_for(&server), None);
    let result = directory.find_contacts(&[Uuid::new_v4()]).await;

    assert_matches!(result, Err(AppointmentError::ExternalServiceError(_)));
}

#[tokio::test]
async fn test_ledger_upserts_and_deletes_by_kind() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(query_param("on_conflict", "appointment_id,kind"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/payments"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .and(query_param("kind", "eq.monetary"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = SupabasePaymentLedger::new(client_for(&server), Some(TOKEN.to_string()));

    ledger
        .record(&PaymentRecord {
            appointment_id,
            patient_id: Uuid::new_v4(),
            kind: PaymentRecordKind::Free,
            amount: 0.0,
            method: PaymentMethod::Free,
            notes: None,
            recorded_at: Utc::now(),
        })
        .await
        .unwrap();
    ledger.remove(appointment_id, PaymentRecordKind::Monetary).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let prefer = requests[0].headers.get("prefer").unwrap().to_str().unwrap();
    assert_eq!(prefer, "resolution=merge-duplicates,return=minimal");
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["kind"], "free");
    assert_eq!(body["method"], "free");
}
