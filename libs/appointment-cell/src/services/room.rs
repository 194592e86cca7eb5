// libs/appointment-cell/src/services/room.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{AppointmentError, Room, RoomResponse};
use crate::stores::{AppointmentPatch, AppointmentRepository};

/// Room assignment. Two appointments may share a room.
pub struct RoomAssignmentService {
    appointments: Arc<dyn AppointmentRepository>,
}

impl RoomAssignmentService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>) -> Self {
        Self { appointments }
    }

    #[instrument(skip(self))]
    pub async fn set_room(
        &self,
        id: Uuid,
        room: Room,
        now: DateTime<Utc>,
    ) -> Result<RoomResponse, AppointmentError> {
        let patch = AppointmentPatch {
            room: Some(room),
            ..AppointmentPatch::touched_at(now)
        };

        let updated = self
            .appointments
            .update(id, &patch)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} assigned to room '{}'", id, updated.room);
        Ok(RoomResponse {
            id,
            room: updated.room,
        })
    }
}
