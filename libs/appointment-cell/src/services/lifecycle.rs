// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusUpdateResponse};
use crate::services::duration;
use crate::services::locks::QueueLocks;
use crate::services::queue::WaitingQueue;
use crate::stores::{AppointmentPatch, AppointmentRepository};

/// How a status change relates to the waiting room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    EnteringQueue,
    LeavingQueue,
    Unchanged,
    Other,
}

impl Transition {
    pub fn classify(from: AppointmentStatus, to: AppointmentStatus) -> Self {
        use AppointmentStatus::Attente;

        if from == to {
            Transition::Unchanged
        } else if to == Attente {
            Transition::EnteringQueue
        } else if from == Attente {
            Transition::LeavingQueue
        } else {
            Transition::Other
        }
    }
}

/// Applies status changes together with their waiting-room side effects.
/// Any status may follow any other.
pub struct AppointmentLifecycleService {
    appointments: Arc<dyn AppointmentRepository>,
    locks: QueueLocks,
}

impl AppointmentLifecycleService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, locks: QueueLocks) -> Self {
        Self { appointments, locks }
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdateResponse, AppointmentError> {
        let appointment = self
            .appointments
            .get(id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        let _guard = self.locks.lock(appointment.date).await;

        // Re-read under the lock; another terminal may have moved it meanwhile
        let day = self.appointments.list_by_date(appointment.date).await?;
        let current = day
            .iter()
            .find(|candidate| candidate.id == id)
            .cloned()
            .ok_or(AppointmentError::NotFound)?;
        let mut queue = WaitingQueue::from_appointments(current.date, &day);

        let transition = Transition::classify(current.status, status);
        debug!("Appointment {} {} -> {} ({:?})", id, current.status, status, transition);

        match transition {
            Transition::Unchanged => Ok(StatusUpdateResponse::from(&current)),

            Transition::Other => {
                let patch = AppointmentPatch {
                    status: Some(status),
                    ..AppointmentPatch::touched_at(now)
                };
                let updated = self
                    .appointments
                    .update(id, &patch)
                    .await?
                    .ok_or(AppointmentError::NotFound)?;

                info!("Appointment {} is now {}", id, status);
                Ok(StatusUpdateResponse::from(&updated))
            }

            Transition::EnteringQueue => {
                let priority = queue.enqueue(id);
                let patch = AppointmentPatch {
                    status: Some(status),
                    priority: Some(priority),
                    arrival_timestamp: Some(Some(now)),
                    waiting_duration_minutes: Some(None),
                    ..AppointmentPatch::touched_at(now)
                };

                let updated = self.commit(current, patch, &queue, now).await?;
                info!(
                    "Appointment {} checked in at {}, queue position {} of {}",
                    id,
                    now,
                    priority,
                    queue.len()
                );
                Ok(StatusUpdateResponse::from(&updated))
            }

            Transition::LeavingQueue => {
                let waited = current
                    .arrival_timestamp
                    .map(|arrival| duration::compute(now, arrival));
                queue.dequeue(id);

                let patch = AppointmentPatch {
                    status: Some(status),
                    // Left untouched when there is no arrival to measure from
                    waiting_duration_minutes: waited.map(Some),
                    ..AppointmentPatch::touched_at(now)
                };

                let updated = self.commit(current, patch, &queue, now).await?;
                info!(
                    "Appointment {} left the waiting room as {} after {:?} minutes, {} still waiting",
                    id,
                    status,
                    waited,
                    queue.len()
                );
                Ok(StatusUpdateResponse::from(&updated))
            }
        }
    }

    /// Persists the target's patch and the resulting reindex in one batch.
    async fn commit(
        &self,
        mut current: Appointment,
        patch: AppointmentPatch,
        queue: &WaitingQueue,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let mut patches = Vec::with_capacity(queue.len() + 1);
        patches.push((current.id, patch.clone()));
        patches.extend(queue.reindex_patches(now, Some(current.id)));

        self.appointments.update_many(&patches).await?;

        patch.apply_to(&mut current);
        Ok(current)
    }
}
