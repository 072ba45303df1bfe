use std::time::SystemTime;

use chrono::{DateTime, Local};

pub mod error;
pub mod snapshot;

/// converts a file timestamp to local date time
pub fn system_time_to_local(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}
