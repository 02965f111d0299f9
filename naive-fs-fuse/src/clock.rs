use std::time::{SystemTime, UNIX_EPOCH};

use naive_fs::Clock;

/// 宿主机的系统时间
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            // 早于纪元的时间
            Err(err) => -(err.duration().as_secs() as i64),
        }
    }
}
