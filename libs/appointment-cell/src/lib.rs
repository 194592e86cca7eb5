pub mod models;
pub mod stores;
pub mod services;
pub mod state;
pub mod handlers;
pub mod router;

pub use models::*;
pub use services::*;
pub use state::AppointmentCellState;
pub use router::appointment_routes;
