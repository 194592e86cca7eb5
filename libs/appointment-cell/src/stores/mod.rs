// libs/appointment-cell/src/stores/mod.rs
//
// Seams to the collaborators this cell does not own: durable appointment
// storage, the patient directory and the payments ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentType, PatientContact,
    PaymentMethod, PaymentRecord, PaymentRecordKind, Room,
};

pub mod memory;
pub mod supabase;

pub use memory::{InMemoryAppointmentStore, InMemoryPatientDirectory, InMemoryPaymentLedger};
pub use supabase::{SupabaseAppointmentStore, SupabasePatientDirectory, SupabasePaymentLedger};

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    /// Applies `patch` to one row and returns the stored result, `None` when
    /// the id does not resolve.
    async fn update(
        &self,
        id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Like `update`, but only when the stored status is still `expected`.
    async fn update_where_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Applies every patch or none of them.
    async fn update_many(&self, patches: &[(Uuid, AppointmentPatch)]) -> Result<(), AppointmentError>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_contacts(
        &self,
        patient_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, PatientContact>, AppointmentError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Upserts the record keyed by appointment id and kind.
    async fn record(&self, record: &PaymentRecord) -> Result<(), AppointmentError>;

    async fn remove(&self, appointment_id: Uuid, kind: PaymentRecordKind) -> Result<(), AppointmentError>;
}

/// The three collaborators one request works against.
#[derive(Clone)]
pub struct ClinicStores {
    pub appointments: Arc<dyn AppointmentRepository>,
    pub patients: Arc<dyn PatientDirectory>,
    pub payments: Arc<dyn PaymentLedger>,
}

/// Field-level change to one appointment. `None` leaves a field untouched;
/// nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub room: Option<Room>,
    pub priority: Option<i32>,
    pub arrival_timestamp: Option<Option<DateTime<Utc>>>,
    pub waiting_duration_minutes: Option<Option<i32>>,
    pub appointment_type: Option<AppointmentType>,
    pub paid: Option<bool>,
    pub insured: Option<bool>,
    pub amount: Option<f64>,
    pub payment_method: Option<Option<PaymentMethod>>,
    pub payment_notes: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppointmentPatch {
    pub fn touched_at(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(room) = self.room {
            appointment.room = room;
        }
        if let Some(priority) = self.priority {
            appointment.priority = priority;
        }
        if let Some(arrival) = self.arrival_timestamp {
            appointment.arrival_timestamp = arrival;
        }
        if let Some(minutes) = self.waiting_duration_minutes {
            appointment.waiting_duration_minutes = minutes;
        }
        if let Some(appointment_type) = self.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(paid) = self.paid {
            appointment.paid = paid;
        }
        if let Some(insured) = self.insured {
            appointment.insured = insured;
        }
        if let Some(amount) = self.amount {
            appointment.amount = amount;
        }
        if let Some(method) = self.payment_method {
            appointment.payment_method = method;
        }
        if let Some(notes) = &self.payment_notes {
            appointment.payment_notes = notes.clone();
        }
        if let Some(updated_at) = self.updated_at {
            appointment.updated_at = updated_at;
        }
    }

    /// Column map in the storage wire format; absent fields are omitted.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut update_data = Map::new();

        if let Some(status) = self.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(room) = self.room {
            update_data.insert("room".to_string(), json!(room));
        }
        if let Some(priority) = self.priority {
            update_data.insert("priority".to_string(), json!(priority));
        }
        if let Some(arrival) = self.arrival_timestamp {
            update_data.insert(
                "arrival_timestamp".to_string(),
                json!(arrival.map(|instant| instant.to_rfc3339())),
            );
        }
        if let Some(minutes) = self.waiting_duration_minutes {
            update_data.insert("waiting_duration_minutes".to_string(), json!(minutes));
        }
        if let Some(appointment_type) = self.appointment_type {
            update_data.insert("type".to_string(), json!(appointment_type));
        }
        if let Some(paid) = self.paid {
            update_data.insert("paid".to_string(), json!(paid));
        }
        if let Some(insured) = self.insured {
            update_data.insert("insured".to_string(), json!(insured));
        }
        if let Some(amount) = self.amount {
            update_data.insert("amount".to_string(), json!(amount));
        }
        if let Some(method) = self.payment_method {
            update_data.insert("payment_method".to_string(), json!(method));
        }
        if let Some(notes) = &self.payment_notes {
            update_data.insert("payment_notes".to_string(), json!(notes));
        }
        if let Some(updated_at) = self.updated_at {
            update_data.insert("updated_at".to_string(), json!(updated_at.to_rfc3339()));
        }

        update_data
    }
}
