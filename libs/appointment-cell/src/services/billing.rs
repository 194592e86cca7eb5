// libs/appointment-cell/src/services/billing.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentType, PaymentMethod, PaymentRecord,
    PaymentRecordKind, PaymentResponse, PaymentStatus, PaymentUpdate, TypeResponse,
};
use crate::stores::{AppointmentPatch, AppointmentRepository, PaymentLedger};

/// Visit type and payment state, kept in step with the external ledger.
pub struct BillingService {
    appointments: Arc<dyn AppointmentRepository>,
    payments: Arc<dyn PaymentLedger>,
}

impl BillingService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, payments: Arc<dyn PaymentLedger>) -> Self {
        Self { appointments, payments }
    }

    async fn load(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Runs after the ledger has been updated, so a failure here leaves the
    /// ledger ahead of the row.
    async fn save(&self, id: Uuid, patch: &AppointmentPatch) -> Result<Appointment, AppointmentError> {
        self.appointments
            .update(id, patch)
            .await
            .and_then(|updated| updated.ok_or(AppointmentError::NotFound))
            .inspect_err(|e| {
                error!("Appointment {} diverged from the payment ledger: {}", id, e);
            })
    }

    /// Switches the visit type and resets billing to that type's default:
    /// a `controle` is paid and free, a `visite` is unpaid.
    #[instrument(skip(self))]
    pub async fn set_type(
        &self,
        id: Uuid,
        appointment_type: AppointmentType,
        now: DateTime<Utc>,
    ) -> Result<TypeResponse, AppointmentError> {
        let appointment = self.load(id).await?;

        let (paid, method, payment_status) = match appointment_type {
            AppointmentType::Controle => (true, Some(PaymentMethod::Free), PaymentStatus::Free),
            AppointmentType::Visite => (false, None, PaymentStatus::Unpaid),
        };

        match appointment_type {
            AppointmentType::Controle => {
                self.payments.remove(id, PaymentRecordKind::Monetary).await?;
                self.payments
                    .record(&PaymentRecord {
                        appointment_id: id,
                        patient_id: appointment.patient_id,
                        kind: PaymentRecordKind::Free,
                        amount: 0.0,
                        method: PaymentMethod::Free,
                        notes: None,
                        recorded_at: now,
                    })
                    .await?;
            }
            AppointmentType::Visite => {
                self.payments.remove(id, PaymentRecordKind::Free).await?;
                self.payments.remove(id, PaymentRecordKind::Monetary).await?;
            }
        }

        let patch = AppointmentPatch {
            appointment_type: Some(appointment_type),
            paid: Some(paid),
            amount: Some(0.0),
            payment_method: Some(method),
            ..AppointmentPatch::touched_at(now)
        };
        let updated = self.save(id, &patch).await?;

        info!(
            "Appointment {} type {} -> {}",
            id, appointment.appointment_type, appointment_type
        );

        Ok(TypeResponse {
            id,
            appointment_type: updated.appointment_type,
            payment_status,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_payment(
        &self,
        id: Uuid,
        update: PaymentUpdate,
        now: DateTime<Utc>,
    ) -> Result<PaymentResponse, AppointmentError> {
        let appointment = self.load(id).await?;
        let is_controle = appointment.appointment_type == AppointmentType::Controle;

        if is_controle && !(update.paid && update.amount == 0.0) {
            warn!("Rejected payment change on controle appointment {}", id);
            return Err(AppointmentError::ValidationError(
                "A controle appointment is free: only paid=true with amount 0 is accepted".to_string(),
            ));
        }

        if update.paid && update.amount > 0.0 && update.method.is_none() {
            return Err(AppointmentError::ValidationError(
                "A payment method is required when an amount is paid".to_string(),
            ));
        }

        let method = if is_controle {
            Some(PaymentMethod::Free)
        } else {
            update.method
        };

        if !is_controle {
            match method.filter(|_| update.paid && update.amount > 0.0) {
                Some(method) => {
                    debug!("Recording payment of {} for appointment {}", update.amount, id);
                    self.payments
                        .record(&PaymentRecord {
                            appointment_id: id,
                            patient_id: appointment.patient_id,
                            kind: PaymentRecordKind::Monetary,
                            amount: update.amount,
                            method,
                            notes: update.notes.clone(),
                            recorded_at: now,
                        })
                        .await?;
                }
                None => {
                    self.payments.remove(id, PaymentRecordKind::Monetary).await?;
                }
            }
        }

        let patch = AppointmentPatch {
            paid: Some(update.paid),
            amount: Some(update.amount),
            payment_method: Some(method),
            insured: update.insured,
            payment_notes: update.notes.map(Some),
            ..AppointmentPatch::touched_at(now)
        };
        let updated = self.save(id, &patch).await?;

        info!(
            "Appointment {} payment updated: paid={} amount={}",
            id, updated.paid, updated.amount
        );

        Ok(PaymentResponse {
            id,
            paid: updated.paid,
            amount: updated.amount,
            method: updated.payment_method,
        })
    }
}
