#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::services::{ClinicDayService, DelayDetector, QueueLocks};
use appointment_cell::stores::{
    AppointmentRepository, ClinicStores, InMemoryAppointmentStore, InMemoryPatientDirectory,
    InMemoryPaymentLedger,
};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, second).unwrap()
}

pub fn status(value: &str) -> UpdateStatusRequest {
    UpdateStatusRequest {
        status: value.to_string(),
    }
}

pub fn priority(action: &str, position: Option<i64>) -> UpdatePriorityRequest {
    UpdatePriorityRequest {
        action: action.to_string(),
        position,
    }
}

/// In-memory stores plus the service wired over them.
pub struct Desk {
    pub appointments: InMemoryAppointmentStore,
    pub patients: InMemoryPatientDirectory,
    pub payments: InMemoryPaymentLedger,
    pub service: ClinicDayService,
}

impl Desk {
    pub fn new() -> Self {
        let appointments = InMemoryAppointmentStore::new();
        let patients = InMemoryPatientDirectory::new();
        let payments = InMemoryPaymentLedger::new();

        let service = ClinicDayService::new(
            ClinicStores::in_memory(&appointments, &patients, &payments),
            QueueLocks::new(),
            DelayDetector::default(),
        );

        Self {
            appointments,
            patients,
            payments,
            service,
        }
    }

    pub async fn schedule(&self, hour: u32, minute: u32, appointment_type: AppointmentType) -> Appointment {
        let appointment = Appointment::scheduled(
            Uuid::new_v4(),
            day(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            appointment_type,
        );
        self.appointments.insert(appointment.clone()).await;
        appointment
    }

    pub async fn get(&self, id: Uuid) -> Appointment {
        self.appointments.get(id).await.unwrap().unwrap()
    }

    /// Ids of the day's waiting appointments ordered by stored priority.
    pub async fn queue_order(&self) -> Vec<Uuid> {
        let mut waiting: Vec<Appointment> = self
            .appointments
            .list_by_date(day())
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Attente)
            .collect();
        waiting.sort_by_key(|a| a.priority);
        waiting.into_iter().map(|a| a.id).collect()
    }

    /// Stored priorities of the waiting set, sorted.
    pub async fn waiting_priorities(&self) -> Vec<i32> {
        let mut priorities: Vec<i32> = self
            .appointments
            .list_by_date(day())
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Attente)
            .map(|a| a.priority)
            .collect();
        priorities.sort();
        priorities
    }
}

pub fn dense(count: usize) -> Vec<i32> {
    (0..count as i32).collect()
}
