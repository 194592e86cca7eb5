// libs/appointment-cell/src/services/clinic_day.rs
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    AppointmentError, AppointmentStatus, AppointmentType, DayQueue, PaymentResponse, PaymentUpdate,
    PriorityAction, PriorityResponse, Room, RoomResponse, SetRoomRequest, SetTypeRequest,
    StatusUpdateResponse, TypeResponse, UpdatePaymentRequest, UpdatePriorityRequest,
    UpdateStatusRequest, WaitingStats,
};
use crate::services::billing::BillingService;
use crate::services::board::DayBoardService;
use crate::services::delay::DelayDetector;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::QueueLocks;
use crate::services::queue::WaitingQueueManager;
use crate::services::room::RoomAssignmentService;
use crate::stores::ClinicStores;

/// Every operation of the day's appointment desk. Requests are validated
/// into typed commands here, before any store is touched.
pub struct ClinicDayService {
    lifecycle: AppointmentLifecycleService,
    queue: WaitingQueueManager,
    rooms: RoomAssignmentService,
    billing: BillingService,
    board: DayBoardService,
}

impl ClinicDayService {
    pub fn new(stores: ClinicStores, locks: QueueLocks, delay: DelayDetector) -> Self {
        Self {
            lifecycle: AppointmentLifecycleService::new(stores.appointments.clone(), locks.clone()),
            queue: WaitingQueueManager::new(stores.appointments.clone(), locks),
            rooms: RoomAssignmentService::new(stores.appointments.clone()),
            billing: BillingService::new(stores.appointments.clone(), stores.payments),
            board: DayBoardService::new(stores.appointments, stores.patients, delay),
        }
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        request: &UpdateStatusRequest,
    ) -> Result<StatusUpdateResponse, AppointmentError> {
        self.update_status_at(id, request, Utc::now()).await
    }

    pub async fn update_status_at(
        &self,
        id: Uuid,
        request: &UpdateStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdateResponse, AppointmentError> {
        let status: AppointmentStatus = request.status.parse()?;
        self.lifecycle.update_status(id, status, now).await
    }

    pub async fn set_room(&self, id: Uuid, request: &SetRoomRequest) -> Result<RoomResponse, AppointmentError> {
        let room: Room = request.room.parse()?;
        self.rooms.set_room(id, room, Utc::now()).await
    }

    pub async fn update_priority(
        &self,
        id: Uuid,
        request: &UpdatePriorityRequest,
    ) -> Result<PriorityResponse, AppointmentError> {
        let action = PriorityAction::try_from(request)?;
        self.queue.reorder(id, action, Utc::now()).await
    }

    pub async fn update_payment(
        &self,
        id: Uuid,
        request: UpdatePaymentRequest,
    ) -> Result<PaymentResponse, AppointmentError> {
        let update = PaymentUpdate::try_from(request)?;
        self.billing.update_payment(id, update, Utc::now()).await
    }

    pub async fn set_type(&self, id: Uuid, request: &SetTypeRequest) -> Result<TypeResponse, AppointmentError> {
        let appointment_type: AppointmentType = request.appointment_type.parse()?;
        self.billing.set_type(id, appointment_type, Utc::now()).await
    }

    pub async fn day_queue(&self, date: NaiveDate) -> Result<DayQueue, AppointmentError> {
        self.day_queue_at(date, Utc::now()).await
    }

    pub async fn day_queue_at(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<DayQueue, AppointmentError> {
        self.board.day_queue(date, now).await
    }

    pub async fn waiting_stats(&self, date: NaiveDate) -> Result<WaitingStats, AppointmentError> {
        self.waiting_stats_at(date, Utc::now()).await
    }

    pub async fn waiting_stats_at(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<WaitingStats, AppointmentError> {
        self.board.waiting_stats(date, now).await
    }
}
