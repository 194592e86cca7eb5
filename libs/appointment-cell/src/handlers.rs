// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, SetRoomRequest, SetTypeRequest, UpdatePaymentRequest,
    UpdatePriorityRequest, UpdateStatusRequest,
};
use crate::state::AppointmentCellState;

fn to_app_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::NotInWaitingQueue => {
            AppError::ValidationError(AppointmentError::NotInWaitingQueue.to_string())
        }
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        AppointmentError::ExternalServiceError(msg) => AppError::Internal(msg),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

// ==============================================================================
// LIFECYCLE AND QUEUE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("{} sets status of {} to {}", user.id, appointment_id, request.status);

    let response = state
        .service_for(auth.token())
        .update_status(appointment_id, &request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn update_priority(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePriorityRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("{} reorders {} with {}", user.id, appointment_id, request.action);

    let response = state
        .service_for(auth.token())
        .update_priority(appointment_id, &request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

// ==============================================================================
// ROOM AND BILLING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn set_room(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetRoomRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("{} assigns {} to room '{}'", user.id, appointment_id, request.room);

    let response = state
        .service_for(auth.token())
        .set_room(appointment_id, &request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("{} updates payment of {}", user.id, appointment_id);

    let response = state
        .service_for(auth.token())
        .update_payment(appointment_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn set_type(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetTypeRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("{} sets type of {} to {}", user.id, appointment_id, request.appointment_type);

    let response = state
        .service_for(auth.token())
        .set_type(appointment_id, &request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

// ==============================================================================
// DAY BOARD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_queue(
    State(state): State<AppointmentCellState>,
    Path(date): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&date)?;
    debug!("{} ({:?}) reads the board for {}", user.id, user.staff_role(), date);

    let queue = state
        .service_for(auth.token())
        .day_queue(date)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(queue)))
}

#[axum::debug_handler]
pub async fn get_waiting_stats(
    State(state): State<AppointmentCellState>,
    Path(date): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&date)?;
    debug!("{} reads waiting stats for {}", user.id, date);

    let stats = state
        .service_for(auth.token())
        .waiting_stats(date)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_mapping_never_leaks_not_found_as_internal() {
        assert_matches!(to_app_error(AppointmentError::NotFound), AppError::NotFound(_));
        assert_matches!(
            to_app_error(AppointmentError::NotInWaitingQueue),
            AppError::ValidationError(msg) if msg.contains("not in waiting queue")
        );
        assert_matches!(
            to_app_error(AppointmentError::DatabaseError("timeout".to_string())),
            AppError::Database(_)
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-04").unwrap(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_matches!(parse_date("04/03/2024"), Err(AppError::ValidationError(_)));
    }
}
