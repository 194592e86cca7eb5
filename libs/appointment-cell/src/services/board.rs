// libs/appointment-cell/src/services/board.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, DayQueue, DayQueueEntry, PatientContact,
    WaitingStats,
};
use crate::services::delay::DelayDetector;
use crate::services::duration;
use crate::services::queue::WaitingQueue;
use crate::stores::{AppointmentRepository, PatientDirectory};

/// Read side of the day: the reception board and its statistics.
///
/// Both reads first promote overdue `programme` appointments to `retard` and
/// persist that, so the next read sees the same state.
pub struct DayBoardService {
    appointments: Arc<dyn AppointmentRepository>,
    patients: Arc<dyn PatientDirectory>,
    delay: DelayDetector,
}

impl DayBoardService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        patients: Arc<dyn PatientDirectory>,
        delay: DelayDetector,
    ) -> Self {
        Self {
            appointments,
            patients,
            delay,
        }
    }

    async fn load_day(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.list_by_date(date).await?;
        let promoted = self
            .delay
            .observe_and_promote(self.appointments.as_ref(), &mut appointments, now)
            .await?;

        if promoted > 0 {
            info!("{} appointments on {} marked late", promoted, date);
        }
        Ok(appointments)
    }

    async fn contacts_for(&self, appointments: &[Appointment]) -> HashMap<Uuid, PatientContact> {
        let patient_ids: Vec<Uuid> = appointments
            .iter()
            .map(|appointment| appointment.patient_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        match self.patients.find_contacts(&patient_ids).await {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!("Patient directory unavailable, board served without names: {}", e);
                HashMap::new()
            }
        }
    }

    /// Waiting appointments in queue order, then everyone else by time.
    #[instrument(skip(self))]
    pub async fn day_queue(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<DayQueue, AppointmentError> {
        let appointments = self.load_day(date, now).await?;
        let queue = WaitingQueue::from_appointments(date, &appointments);

        let mut by_id: HashMap<Uuid, Appointment> = appointments
            .iter()
            .map(|appointment| (appointment.id, appointment.clone()))
            .collect();

        let mut ordered: Vec<Appointment> = queue
            .ids()
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        let mut others: Vec<Appointment> = by_id.into_values().collect();
        others.sort_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)));
        ordered.extend(others);

        let contacts = self.contacts_for(&ordered).await;

        let entries: Vec<DayQueueEntry> = ordered
            .into_iter()
            .map(|appointment| {
                let contact = contacts.get(&appointment.patient_id);
                let queue_position = queue.position(appointment.id).map(|index| index + 1);
                let current_wait_minutes = appointment
                    .arrival_timestamp
                    .filter(|_| appointment.is_waiting())
                    .map(|arrival| duration::compute(now, arrival));

                DayQueueEntry {
                    patient_name: contact.map(PatientContact::full_name),
                    patient_phone: contact.and_then(|c| c.phone.clone()),
                    patient_email: contact.and_then(|c| c.email.clone()),
                    queue_position,
                    current_wait_minutes,
                    appointment,
                }
            })
            .collect();

        debug!("Board for {}: {} entries, {} waiting", date, entries.len(), queue.len());

        Ok(DayQueue {
            date,
            waiting_count: queue.len(),
            entries,
        })
    }

    #[instrument(skip(self))]
    pub async fn waiting_stats(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<WaitingStats, AppointmentError> {
        let appointments = self.load_day(date, now).await?;

        let currently_waiting = appointments.iter().filter(|a| a.is_waiting()).count();
        let late_count = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Retard)
            .count();

        let frozen: Vec<i32> = appointments
            .iter()
            .filter(|a| !a.is_waiting())
            .filter_map(|a| a.waiting_duration_minutes)
            .collect();

        let average_wait_minutes = (!frozen.is_empty())
            .then(|| frozen.iter().map(|m| *m as f64).sum::<f64>() / frozen.len() as f64);

        Ok(WaitingStats {
            date,
            currently_waiting,
            seen_count: frozen.len(),
            average_wait_minutes,
            max_wait_minutes: frozen.iter().copied().max(),
            late_count,
        })
    }
}
