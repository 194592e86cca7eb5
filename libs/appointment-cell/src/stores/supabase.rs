// libs/appointment-cell/src/stores/supabase.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, PatientContact, PaymentRecord,
    PaymentRecordKind,
};
use crate::stores::{AppointmentPatch, AppointmentRepository, ClinicStores, PatientDirectory, PaymentLedger};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const PATIENTS_PATH: &str = "/rest/v1/patients";
const PAYMENTS_PATH: &str = "/rest/v1/payments";
const APPLY_PATCHES_RPC: &str = "apply_appointment_patches";

fn db_error(context: &str, e: anyhow::Error) -> AppointmentError {
    error!("{}: {}", context, e);
    AppointmentError::DatabaseError(format!("{}: {}", context, e))
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
            })
        })
        .collect()
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// Appointment rows in the `appointments` table, scoped to one caller's token.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }

    async fn patch_rows(
        &self,
        path: String,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.auth_token.as_deref(),
                Some(Value::Object(patch.to_json())),
                Some(return_representation()),
            )
            .await
            .map_err(|e| db_error("Failed to update appointment", e))?;

        Ok(decode_rows(rows)?.into_iter().next())
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}&limit=1", APPOINTMENTS_PATH, id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(|e| db_error("Failed to fetch appointment", e))?;

        Ok(decode_rows(rows)?.into_iter().next())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?date=eq.{}&order=time.asc",
            APPOINTMENTS_PATH,
            date.format("%Y-%m-%d")
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(|e| db_error("Failed to list appointments", e))?;

        decode_rows(rows)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Patching appointment {}", id);
        self.patch_rows(format!("{}?id=eq.{}", APPOINTMENTS_PATH, id), patch)
            .await
    }

    async fn update_where_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Patching appointment {} if still {}", id, expected);
        self.patch_rows(
            format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS_PATH, id, expected),
            patch,
        )
        .await
    }

    async fn update_many(&self, patches: &[(Uuid, AppointmentPatch)]) -> Result<(), AppointmentError> {
        if patches.is_empty() {
            return Ok(());
        }

        let payload: Vec<Value> = patches
            .iter()
            .map(|(id, patch)| {
                let mut row = patch.to_json();
                row.insert("id".to_string(), json!(id));
                Value::Object(row)
            })
            .collect();

        // The function raises on an unknown id, rolling back the whole batch
        let applied: i64 = self
            .supabase
            .rpc(APPLY_PATCHES_RPC, self.auth_token.as_deref(), json!({ "patches": payload }))
            .await
            .map_err(|e| db_error("Failed to apply appointment batch", e))?;

        debug!("Applied {} appointment patches in one transaction", applied);
        Ok(())
    }
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_contacts(
        &self,
        patient_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, PatientContact>, AppointmentError> {
        if patient_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = patient_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "{}?id=in.({})&select=id,first_name,last_name,phone_number,email",
            PATIENTS_PATH, id_list
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(|e| AppointmentError::ExternalServiceError(format!("Patient directory: {}", e)))?;

        let mut contacts = HashMap::with_capacity(rows.len());
        for row in rows {
            let contact: PatientContact = serde_json::from_value(row).map_err(|e| {
                AppointmentError::ExternalServiceError(format!("Failed to parse patient: {}", e))
            })?;
            contacts.insert(contact.id, contact);
        }

        Ok(contacts)
    }
}

pub struct SupabasePaymentLedger {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabasePaymentLedger {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl PaymentLedger for SupabasePaymentLedger {
    async fn record(&self, record: &PaymentRecord) -> Result<(), AppointmentError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=minimal"),
        );

        let body = json!({
            "appointment_id": record.appointment_id,
            "patient_id": record.patient_id,
            "kind": record.kind,
            "amount": record.amount,
            "method": record.method,
            "notes": record.notes,
            "recorded_at": record.recorded_at.to_rfc3339(),
        });

        self.supabase
            .execute(
                Method::POST,
                &format!("{}?on_conflict=appointment_id,kind", PAYMENTS_PATH),
                self.auth_token.as_deref(),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::ExternalServiceError(format!("Payment ledger: {}", e)))
    }

    async fn remove(&self, appointment_id: Uuid, kind: PaymentRecordKind) -> Result<(), AppointmentError> {
        let path = format!(
            "{}?appointment_id=eq.{}&kind=eq.{}",
            PAYMENTS_PATH,
            appointment_id,
            kind.as_str()
        );

        self.supabase
            .execute(Method::DELETE, &path, self.auth_token.as_deref(), None, None)
            .await
            .map_err(|e| AppointmentError::ExternalServiceError(format!("Payment ledger: {}", e)))
    }
}

impl ClinicStores {
    pub fn supabase(supabase: Arc<SupabaseClient>, auth_token: Option<&str>) -> Self {
        let token = auth_token.map(str::to_string);
        Self {
            appointments: Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase), token.clone())),
            patients: Arc::new(SupabasePatientDirectory::new(Arc::clone(&supabase), token.clone())),
            payments: Arc::new(SupabasePaymentLedger::new(supabase, token)),
        }
    }
}
