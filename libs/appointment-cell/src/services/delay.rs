// libs/appointment-cell/src/services/delay.rs
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::stores::{AppointmentPatch, AppointmentRepository};

const DEFAULT_GRACE_MINUTES: i64 = 15;

/// Promotes overdue `programme` appointments to `retard` on the read path.
#[derive(Debug, Clone, Copy)]
pub struct DelayDetector {
    grace: Duration,
    clinic_offset: FixedOffset,
}

impl Default for DelayDetector {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
            clinic_offset: Utc.fix(),
        }
    }
}

impl DelayDetector {
    pub fn new(grace_minutes: i64, clinic_offset: FixedOffset) -> Self {
        let grace = Duration::try_minutes(grace_minutes.max(0)).unwrap_or_else(|| {
            warn!(
                "Late grace of {} minutes is out of range, using {}",
                grace_minutes, DEFAULT_GRACE_MINUTES
            );
            Duration::minutes(DEFAULT_GRACE_MINUTES)
        });
        Self { grace, clinic_offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let offset_seconds = config.clinic_utc_offset_minutes.saturating_mul(60);
        let clinic_offset = FixedOffset::east_opt(offset_seconds).unwrap_or_else(|| {
            warn!(
                "Clinic UTC offset of {} minutes is out of range, using UTC",
                config.clinic_utc_offset_minutes
            );
            Utc.fix()
        });
        Self::new(config.late_grace_minutes, clinic_offset)
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_offset
    }

    pub fn is_overdue(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        appointment.status == AppointmentStatus::Programme
            && now > appointment.scheduled_at(self.clinic_offset) + self.grace
    }

    /// Marks every overdue appointment in `appointments` as `retard` and
    /// writes the change through. The write is conditional on the row still
    /// being `programme`, so a concurrent check-in is never overwritten; in
    /// that case the fresh row replaces the stale one. Returns the number of
    /// promotions persisted.
    pub async fn observe_and_promote(
        &self,
        repository: &dyn AppointmentRepository,
        appointments: &mut [Appointment],
        now: DateTime<Utc>,
    ) -> Result<usize, AppointmentError> {
        let mut promoted = 0;

        for appointment in appointments.iter_mut() {
            if !self.is_overdue(appointment, now) {
                continue;
            }

            let patch = AppointmentPatch {
                status: Some(AppointmentStatus::Retard),
                ..AppointmentPatch::touched_at(now)
            };

            match repository
                .update_where_status(appointment.id, AppointmentStatus::Programme, &patch)
                .await?
            {
                Some(updated) => {
                    info!(
                        "Appointment {} scheduled at {} {} marked late",
                        updated.id, updated.date, updated.time
                    );
                    *appointment = updated;
                    promoted += 1;
                }
                None => {
                    debug!("Appointment {} changed before late promotion, reloading", appointment.id);
                    if let Some(current) = repository.get(appointment.id).await? {
                        *appointment = current;
                    }
                }
            }
        }

        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use uuid::Uuid;

    use crate::models::AppointmentType;

    fn nine_oclock() -> Appointment {
        Appointment::scheduled(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            AppointmentType::Visite,
        )
    }

    #[test]
    fn test_overdue_only_after_grace() {
        let detector = DelayDetector::default();
        let appointment = nine_oclock();

        let at_grace = Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap();
        let past_grace = Utc.with_ymd_and_hms(2024, 3, 4, 9, 20, 0).unwrap();

        assert!(!detector.is_overdue(&appointment, at_grace));
        assert!(detector.is_overdue(&appointment, past_grace));
    }

    #[test]
    fn test_only_programme_is_promoted() {
        let detector = DelayDetector::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 11, 0, 0).unwrap();

        for status in AppointmentStatus::ALL {
            let mut appointment = nine_oclock();
            appointment.status = status;
            assert_eq!(
                detector.is_overdue(&appointment, now),
                status == AppointmentStatus::Programme
            );
        }
    }

    #[test]
    fn test_clinic_offset_shifts_deadline() {
        // Clinic at UTC+1: 09:00 local is 08:00 UTC
        let detector = DelayDetector::new(15, FixedOffset::east_opt(3600).unwrap());
        let appointment = nine_oclock();

        let now = Utc.with_ymd_and_hms(2024, 3, 4, 8, 20, 0).unwrap();
        assert!(detector.is_overdue(&appointment, now));
    }

    #[test]
    fn test_out_of_range_grace_falls_back_to_default() {
        let detector = DelayDetector::new(i64::MAX, Utc.fix());
        let appointment = nine_oclock();

        assert!(!detector.is_overdue(&appointment, Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap()));
        assert!(detector.is_overdue(&appointment, Utc.with_ymd_and_hms(2024, 3, 4, 9, 16, 0).unwrap()));
    }

    #[test]
    fn test_from_config_reads_grace_and_offset() {
        let config = AppConfig {
            clinic_utc_offset_minutes: 60,
            late_grace_minutes: 5,
            ..AppConfig::default()
        };
        let detector = DelayDetector::from_config(&config);
        assert_eq!(detector.clinic_offset().local_minus_utc(), 3600);

        let appointment = nine_oclock();
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 8, 6, 0).unwrap();
        assert!(detector.is_overdue(&appointment, now));
    }
}
