use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentCellState;

pub fn create_router(state: AppointmentCellState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic day API is running!" }))
        .nest("/appointments", appointment_routes(state))
}
