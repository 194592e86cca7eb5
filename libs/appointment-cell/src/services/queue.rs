// libs/appointment-cell/src/services/queue.rs
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, PriorityAction, PriorityResponse};
use crate::services::locks::QueueLocks;
use crate::stores::{AppointmentPatch, AppointmentRepository};

// ==============================================================================
// WAITING QUEUE AGGREGATE
// ==============================================================================

/// The ordered waiting set of one date. Index in `order` is the priority.
#[derive(Debug, Clone)]
pub struct WaitingQueue {
    date: NaiveDate,
    order: Vec<Uuid>,
    stored: HashMap<Uuid, i32>,
}

fn arrival_order(a: &Appointment, b: &Appointment) -> Ordering {
    match (a.arrival_timestamp, b.arrival_timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl WaitingQueue {
    /// Builds the queue from a day's appointments. Duplicate or sparse stored
    /// priorities are ordered by arrival, then id, and come out dense.
    pub fn from_appointments(date: NaiveDate, appointments: &[Appointment]) -> Self {
        let mut waiting: Vec<&Appointment> = appointments
            .iter()
            .filter(|appointment| appointment.date == date && appointment.is_waiting())
            .collect();

        waiting.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| arrival_order(a, b))
                .then_with(|| a.id.cmp(&b.id))
        });

        Self {
            date,
            order: waiting.iter().map(|appointment| appointment.id).collect(),
            stored: waiting
                .iter()
                .map(|appointment| (appointment.id, appointment.priority))
                .collect(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.order.iter().position(|queued| *queued == id)
    }

    /// Appointment ids, next to be seen first.
    pub fn ids(&self) -> &[Uuid] {
        &self.order
    }

    fn index_of(&self, id: Uuid) -> Result<usize, AppointmentError> {
        self.position(id).ok_or(AppointmentError::NotInWaitingQueue)
    }

    /// Appends `id` at the back and returns its priority.
    pub fn enqueue(&mut self, id: Uuid) -> i32 {
        if let Some(existing) = self.position(id) {
            return existing as i32;
        }
        self.order.push(id);
        (self.order.len() - 1) as i32
    }

    /// Removes `id`; the members behind it move up one place.
    pub fn dequeue(&mut self, id: Uuid) -> bool {
        match self.position(id) {
            Some(index) => {
                self.order.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn move_up(&mut self, id: Uuid) -> Result<i32, AppointmentError> {
        let index = self.index_of(id)?;
        if index == 0 {
            return Ok(0);
        }
        self.order.swap(index, index - 1);
        Ok((index - 1) as i32)
    }

    pub fn move_down(&mut self, id: Uuid) -> Result<i32, AppointmentError> {
        let index = self.index_of(id)?;
        if index + 1 >= self.order.len() {
            return Ok(index as i32);
        }
        self.order.swap(index, index + 1);
        Ok((index + 1) as i32)
    }

    pub fn set_first(&mut self, id: Uuid) -> Result<i32, AppointmentError> {
        self.set_position(id, 0)
    }

    /// Moves `id` to `position`, clamped to `[0, len - 1]`.
    pub fn set_position(&mut self, id: Uuid, position: i64) -> Result<i32, AppointmentError> {
        let index = self.index_of(id)?;
        let last = (self.order.len() - 1) as i64;
        let target = position.clamp(0, last) as usize;

        let moved = self.order.remove(index);
        self.order.insert(target, moved);
        Ok(target as i32)
    }

    pub fn apply(&mut self, action: PriorityAction, id: Uuid) -> Result<i32, AppointmentError> {
        match action {
            PriorityAction::MoveUp => self.move_up(id),
            PriorityAction::MoveDown => self.move_down(id),
            PriorityAction::SetFirst => self.set_first(id),
            PriorityAction::SetPosition(position) => self.set_position(id, position),
        }
    }

    /// Members whose priority differs from what was loaded, with the new value.
    pub fn priority_changes(&self) -> Vec<(Uuid, i32)> {
        self.order
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let priority = index as i32;
                (self.stored.get(id) != Some(&priority)).then_some((*id, priority))
            })
            .collect()
    }

    /// `priority_changes` as storage patches, skipping `except`.
    pub fn reindex_patches(&self, now: DateTime<Utc>, except: Option<Uuid>) -> Vec<(Uuid, AppointmentPatch)> {
        self.priority_changes()
            .into_iter()
            .filter(|(id, _)| Some(*id) != except)
            .map(|(id, priority)| {
                (
                    id,
                    AppointmentPatch {
                        priority: Some(priority),
                        ..AppointmentPatch::touched_at(now)
                    },
                )
            })
            .collect()
    }
}

// ==============================================================================
// WAITING QUEUE MANAGER
// ==============================================================================

pub struct WaitingQueueManager {
    appointments: Arc<dyn AppointmentRepository>,
    locks: QueueLocks,
}

impl WaitingQueueManager {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, locks: QueueLocks) -> Self {
        Self { appointments, locks }
    }

    /// Applies a reorder action to a waiting appointment and persists every
    /// changed priority in one batch, all under the day's queue lock.
    #[instrument(skip(self))]
    pub async fn reorder(
        &self,
        id: Uuid,
        action: PriorityAction,
        now: DateTime<Utc>,
    ) -> Result<PriorityResponse, AppointmentError> {
        let appointment = self
            .appointments
            .get(id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        let _guard = self.locks.lock(appointment.date).await;

        let day = self.appointments.list_by_date(appointment.date).await?;
        let current = day
            .iter()
            .find(|candidate| candidate.id == id)
            .ok_or(AppointmentError::NotFound)?;

        if !current.is_waiting() {
            warn!("Reorder rejected, appointment {} is {}", id, current.status);
            return Err(AppointmentError::NotInWaitingQueue);
        }

        let mut queue = WaitingQueue::from_appointments(appointment.date, &day);
        let position = queue.apply(action, id)?;

        let patches = queue.reindex_patches(now, None);
        debug!("Reorder of {} touches {} priorities", id, patches.len());
        self.appointments.update_many(&patches).await?;

        info!(
            "Appointment {} moved to position {} of {} on {}",
            id,
            position,
            queue.len(),
            queue.date()
        );

        Ok(PriorityResponse {
            id,
            action: action.name().to_string(),
            total_waiting: queue.len(),
            position,
        })
    }
}
