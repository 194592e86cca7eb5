// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentCellState;

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    // Every desk operation requires an authenticated staff member
    let protected_routes = Router::new()
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/priority", patch(handlers::update_priority))
        .route("/{appointment_id}/room", patch(handlers::set_room))
        .route("/{appointment_id}/payment", patch(handlers::update_payment))
        .route("/{appointment_id}/type", patch(handlers::set_type))

        // Reception board
        .route("/day/{date}", get(handlers::get_day_queue))
        .route("/day/{date}/stats", get(handlers::get_waiting_stats))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
