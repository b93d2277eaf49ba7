pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod schedule;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AppError;
pub use lifecycle::{Completion, TaskManager};
pub use schedule::advance;
