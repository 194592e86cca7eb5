// libs/appointment-cell/src/stores/memory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, PatientContact, PaymentRecord,
    PaymentRecordKind,
};
use crate::stores::{AppointmentPatch, AppointmentRepository, ClinicStores, PatientDirectory, PaymentLedger};

#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    rows: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the external scheduler creating an appointment.
    pub async fn insert(&self, appointment: Appointment) {
        self.rows.write().await.insert(appointment.id, appointment);
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut appointments: Vec<Appointment> = rows
            .values()
            .filter(|appointment| appointment.date == date)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)));
        Ok(appointments)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows = self.rows.write().await;
        Ok(rows.get_mut(&id).map(|appointment| {
            patch.apply_to(appointment);
            appointment.clone()
        }))
    }

    async fn update_where_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .get_mut(&id)
            .filter(|appointment| appointment.status == expected)
            .map(|appointment| {
                patch.apply_to(appointment);
                appointment.clone()
            }))
    }

    async fn update_many(&self, patches: &[(Uuid, AppointmentPatch)]) -> Result<(), AppointmentError> {
        let mut rows = self.rows.write().await;

        if let Some((missing, _)) = patches.iter().find(|(id, _)| !rows.contains_key(id)) {
            return Err(AppointmentError::DatabaseError(format!(
                "appointment {} not found, batch rejected",
                missing
            )));
        }

        for (id, patch) in patches {
            if let Some(appointment) = rows.get_mut(id) {
                patch.apply_to(appointment);
            }
        }

        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPatientDirectory {
    contacts: Arc<RwLock<HashMap<Uuid, PatientContact>>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, contact: PatientContact) {
        self.contacts.write().await.insert(contact.id, contact);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_contacts(
        &self,
        patient_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, PatientContact>, AppointmentError> {
        let contacts = self.contacts.read().await;
        Ok(patient_ids
            .iter()
            .filter_map(|id| contacts.get(id).map(|contact| (*id, contact.clone())))
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPaymentLedger {
    records: Arc<RwLock<HashMap<(Uuid, PaymentRecordKind), PaymentRecord>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records_for(&self, appointment_id: Uuid) -> Vec<PaymentRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.appointment_id == appointment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn record(&self, record: &PaymentRecord) -> Result<(), AppointmentError> {
        self.records
            .write()
            .await
            .insert((record.appointment_id, record.kind), record.clone());
        Ok(())
    }

    async fn remove(&self, appointment_id: Uuid, kind: PaymentRecordKind) -> Result<(), AppointmentError> {
        self.records.write().await.remove(&(appointment_id, kind));
        Ok(())
    }
}

impl ClinicStores {
    pub fn in_memory(
        appointments: &InMemoryAppointmentStore,
        patients: &InMemoryPatientDirectory,
        payments: &InMemoryPaymentLedger,
    ) -> Self {
        Self {
            appointments: Arc::new(appointments.clone()),
            patients: Arc::new(patients.clone()),
            payments: Arc::new(payments.clone()),
        }
    }
}
