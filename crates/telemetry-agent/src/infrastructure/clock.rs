use chrono::DateTime;
use chrono::Utc;

use crate::domain::metrics::traits::TimeSource;

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
