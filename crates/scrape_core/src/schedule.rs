use std::time::Duration;

/// Adaptive poll timing for one candidate run.
///
/// The wait before poll `k` (zero based) is `min(base * factor^k, cap)`. A
/// factor below 1 is treated as 1 so the sequence never shrinks. The loop is
/// bounded by `max_attempts` and, independently, by `budget` measured from the
/// run's start; whichever is reached first ends polling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
    pub max_attempts: u32,
    pub budget: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(3_000),
            factor: 1.1,
            cap: Duration::from_millis(8_000),
            max_attempts: 40,
            budget: Duration::from_secs(180),
        }
    }
}

impl PollSchedule {
    pub fn interval(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor > 1.0 {
            self.factor
        } else {
            1.0
        };
        let cap_ms = self.cap.as_millis() as f64;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let scaled = self.base.as_millis() as f64 * factor.powi(exponent);
        let ms = if scaled.is_finite() {
            scaled.min(cap_ms)
        } else {
            cap_ms
        };
        Duration::from_millis(ms.round() as u64)
    }

    /// Every wait the poll loop may take, in order.
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(move |attempt| self.interval(attempt))
    }

    /// Upper bound on time spent sleeping, `max_attempts * cap`.
    pub fn worst_case(&self) -> Duration {
        self.cap.saturating_mul(self.max_attempts)
    }
}
