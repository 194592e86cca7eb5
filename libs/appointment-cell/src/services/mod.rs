pub mod billing;
pub mod board;
pub mod clinic_day;
pub mod delay;
pub mod duration;
pub mod lifecycle;
pub mod locks;
pub mod queue;
pub mod room;

pub use billing::BillingService;
pub use board::DayBoardService;
pub use clinic_day::ClinicDayService;
pub use delay::DelayDetector;
pub use lifecycle::AppointmentLifecycleService;
pub use locks::QueueLocks;
pub use queue::{WaitingQueue, WaitingQueueManager};
pub use room::RoomAssignmentService;
