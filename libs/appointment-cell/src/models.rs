// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Clinic-local calendar date of the slot.
    pub date: NaiveDate,
    /// Clinic-local wall-clock time of the slot.
    pub time: NaiveTime,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub room: Room,
    /// Queue order while `status == attente`, 0 is next. Ignored otherwise.
    #[serde(default)]
    pub priority: i32,
    pub arrival_timestamp: Option<DateTime<Utc>>,
    pub waiting_duration_minutes: Option<i32>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub insured: bool,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A fresh `programme` appointment, as the external scheduler creates it.
    pub fn scheduled(
        patient_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_type: AppointmentType,
    ) -> Self {
        let now = Utc::now();
        let (paid, payment_method) = match appointment_type {
            AppointmentType::Controle => (true, Some(PaymentMethod::Free)),
            AppointmentType::Visite => (false, None),
        };

        Self {
            id: Uuid::new_v4(),
            patient_id,
            date,
            time,
            appointment_type,
            status: AppointmentStatus::Programme,
            room: Room::Unassigned,
            priority: 0,
            arrival_timestamp: None,
            waiting_duration_minutes: None,
            paid,
            insured: false,
            amount: 0.0,
            payment_method,
            payment_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The scheduled slot as a UTC instant, given the clinic's wall-clock offset.
    pub fn scheduled_at(&self, clinic_offset: FixedOffset) -> DateTime<Utc> {
        let local = self.date.and_time(self.time);
        let utc_naive = local - Duration::seconds(clinic_offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc_naive)
    }

    pub fn is_waiting(&self) -> bool {
        self.status == AppointmentStatus::Attente
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Programme,
    Attente,
    EnCours,
    Termine,
    Absent,
    Retard,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Programme,
        AppointmentStatus::Attente,
        AppointmentStatus::EnCours,
        AppointmentStatus::Termine,
        AppointmentStatus::Absent,
        AppointmentStatus::Retard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Programme => "programme",
            AppointmentStatus::Attente => "attente",
            AppointmentStatus::EnCours => "en_cours",
            AppointmentStatus::Termine => "termine",
            AppointmentStatus::Absent => "absent",
            AppointmentStatus::Retard => "retard",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppointmentError::ValidationError(format!(
                "Invalid status '{}', expected one of: programme, attente, en_cours, termine, absent, retard",
                s
            )))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    /// Standard billable visit.
    Visite,
    /// Free follow-up visit.
    Controle,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Visite => write!(f, "visite"),
            AppointmentType::Controle => write!(f, "controle"),
        }
    }
}

impl FromStr for AppointmentType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visite" => Ok(AppointmentType::Visite),
            "controle" => Ok(AppointmentType::Controle),
            other => Err(AppointmentError::ValidationError(format!(
                "Invalid appointment type '{}', expected visite or controle",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Room {
    #[default]
    #[serde(rename = "")]
    Unassigned,
    #[serde(rename = "room1")]
    Room1,
    #[serde(rename = "room2")]
    Room2,
}

impl Room {
    pub fn as_str(&self) -> &'static str {
        match self {
            Room::Unassigned => "",
            Room::Room1 => "room1",
            Room::Room2 => "room2",
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Room {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Room::Unassigned),
            "room1" => Ok(Room::Room1),
            "room2" => Ok(Room::Room2),
            other => Err(AppointmentError::ValidationError(format!(
                "Invalid room '{}', expected \"\", room1 or room2",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Cheque,
    Transfer,
    Insurance,
    Free,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Insurance => "insurance",
            PaymentMethod::Free => "free",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "cheque" => Ok(PaymentMethod::Cheque),
            "transfer" => Ok(PaymentMethod::Transfer),
            "insurance" => Ok(PaymentMethod::Insurance),
            "free" => Ok(PaymentMethod::Free),
            other => Err(AppointmentError::ValidationError(format!(
                "Invalid payment method '{}'",
                other
            ))),
        }
    }
}

/// Billing state derived from an appointment's payment fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Free,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================
//
// Enumerated fields arrive as raw strings so that an out-of-domain value is a
// ValidationError from this cell rather than a body-parsing rejection.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRoomRequest {
    pub room: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePriorityRequest {
    pub action: String,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePaymentRequest {
    pub paid: bool,
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub insured: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTypeRequest {
    #[serde(rename = "type")]
    pub appointment_type: String,
}

// ==============================================================================
// VALIDATED COMMANDS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityAction {
    MoveUp,
    MoveDown,
    SetFirst,
    /// Requested position, clamped to the queue bounds when applied.
    SetPosition(i64),
}

impl PriorityAction {
    pub fn parse(action: &str, position: Option<i64>) -> Result<Self, AppointmentError> {
        match action {
            "move_up" => Ok(PriorityAction::MoveUp),
            "move_down" => Ok(PriorityAction::MoveDown),
            "set_first" => Ok(PriorityAction::SetFirst),
            "set_position" => position
                .map(PriorityAction::SetPosition)
                .ok_or_else(|| AppointmentError::ValidationError(
                    "set_position requires a position".to_string(),
                )),
            other => Err(AppointmentError::ValidationError(format!(
                "Invalid priority action '{}', expected move_up, move_down, set_first or set_position",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PriorityAction::MoveUp => "move_up",
            PriorityAction::MoveDown => "move_down",
            PriorityAction::SetFirst => "set_first",
            PriorityAction::SetPosition(_) => "set_position",
        }
    }
}

impl TryFrom<&UpdatePriorityRequest> for PriorityAction {
    type Error = AppointmentError;

    fn try_from(request: &UpdatePriorityRequest) -> Result<Self, Self::Error> {
        PriorityAction::parse(&request.action, request.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub paid: bool,
    pub amount: f64,
    pub method: Option<PaymentMethod>,
    pub insured: Option<bool>,
    pub notes: Option<String>,
}

impl TryFrom<UpdatePaymentRequest> for PaymentUpdate {
    type Error = AppointmentError;

    fn try_from(request: UpdatePaymentRequest) -> Result<Self, Self::Error> {
        let amount = request.amount.unwrap_or(0.0);
        if !amount.is_finite() || amount < 0.0 {
            return Err(AppointmentError::ValidationError(format!(
                "Invalid amount {}, must be a non-negative number",
                amount
            )));
        }

        let method = request
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(str::parse::<PaymentMethod>)
            .transpose()?;

        // An unpaid appointment carries no amount and no method
        let (amount, method) = if request.paid { (amount, method) } else { (0.0, None) };

        Ok(PaymentUpdate {
            paid: request.paid,
            amount,
            method,
            insured: request.insured,
            notes: request.notes,
        })
    }
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdateResponse {
    pub id: Uuid,
    pub status: AppointmentStatus,
    pub arrival_timestamp: Option<DateTime<Utc>>,
    pub waiting_duration_minutes: Option<i32>,
}

impl From<&Appointment> for StatusUpdateResponse {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            status: appointment.status,
            arrival_timestamp: appointment.arrival_timestamp,
            waiting_duration_minutes: appointment.waiting_duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomResponse {
    pub id: Uuid,
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityResponse {
    pub id: Uuid,
    pub action: String,
    pub total_waiting: usize,
    /// New 0-based priority of the moved appointment.
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub paid: bool,
    pub amount: f64,
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub payment_status: PaymentStatus,
}

// ==============================================================================
// DAY BOARD MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayQueueEntry {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    /// 1-based place in the waiting room, only while waiting.
    pub queue_position: Option<usize>,
    /// Minutes waited so far, only while waiting. Display only, computed at
    /// read time and never written back.
    pub current_wait_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayQueue {
    pub date: NaiveDate,
    pub waiting_count: usize,
    pub entries: Vec<DayQueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitingStats {
    pub date: NaiveDate,
    pub currently_waiting: usize,
    /// Appointments with a frozen waiting duration.
    pub seen_count: usize,
    pub average_wait_minutes: Option<f64>,
    pub max_wait_minutes: Option<i32>,
    pub late_count: usize,
}

// ==============================================================================
// COLLABORATOR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientContact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, rename = "phone_number")]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl PatientContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordKind {
    Monetary,
    Free,
}

impl PaymentRecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordKind::Monetary => "monetary",
            PaymentRecordKind::Free => "free",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub kind: PaymentRecordKind,
    pub amount: f64,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment is not in waiting queue")]
    NotInWaitingQueue,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl AppointmentError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppointmentError::ValidationError(_) | AppointmentError::NotInWaitingQueue)
    }
}
