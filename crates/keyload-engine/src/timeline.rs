//! Wall-clock timeline of one run: start, ramp-up end, test end.

use keyload_core::{LoadTestConfig, Phase, RampUpMode};
use std::time::{Duration, Instant};

/// Deadlines computed once when the run starts.
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    pub start: Instant,
    pub ramp_up_end: Instant,
    pub test_end: Instant,
}

impl Timeline {
    /// Anchors the timeline at `now`.
    pub fn start_now(config: &LoadTestConfig) -> Self {
        Self::starting_at(Instant::now(), config)
    }

    pub fn starting_at(start: Instant, config: &LoadTestConfig) -> Self {
        let ramp_up_end = start + config.ramp_up();
        Self {
            start,
            ramp_up_end,
            test_end: ramp_up_end + config.test_duration(),
        }
    }

    /// Earliest instant worker `thread_id` (1-indexed) may begin.
    ///
    /// Staggered workers are spread evenly over the ramp-up window; immediate
    /// workers all start at `start`.
    pub fn worker_start(&self, thread_id: u32, thread_count: u32, mode: RampUpMode) -> Instant {
        match mode {
            RampUpMode::Immediate => self.start,
            RampUpMode::Staggered => {
                let ramp_ms = self.ramp_up_end.duration_since(self.start).as_millis() as u64;
                let per_worker_ms = ramp_ms / u64::from(thread_count.max(1));
                self.start
                    + Duration::from_millis(per_worker_ms * u64::from(thread_id.saturating_sub(1)))
            }
        }
    }

    pub fn phase_at(&self, now: Instant) -> Phase {
        if now >= self.ramp_up_end {
            Phase::SteadyState
        } else {
            Phase::RampUp
        }
    }

    pub fn is_over(&self, now: Instant) -> bool {
        now >= self.test_end
    }
}

/// Signed milliseconds from `from` to `to`; negative when `to` precedes `from`.
#[must_use]
pub fn elapsed_ms(from: Instant, to: Instant) -> i64 {
    match to.checked_duration_since(from) {
        Some(d) => d.as_millis() as i64,
        None => -(from.duration_since(to).as_millis() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ramp: u32, duration: u32) -> LoadTestConfig {
        LoadTestConfig {
            ramp_up_time_seconds: ramp,
            test_duration_seconds: duration,
            ..Default::default()
        }
    }

    #[test]
    fn test_deadlines() {
        let start = Instant::now();
        let timeline = Timeline::starting_at(start, &config(10, 30));
        assert_eq!(timeline.ramp_up_end - start, Duration::from_secs(10));
        assert_eq!(timeline.test_end - start, Duration::from_secs(40));
    }

    #[test]
    fn test_staggered_worker_start() {
        let start = Instant::now();
        let timeline = Timeline::starting_at(start, &config(10, 30));

        assert_eq!(timeline.worker_start(1, 4, RampUpMode::Staggered), start);
        assert_eq!(
            timeline.worker_start(3, 4, RampUpMode::Staggered) - start,
            Duration::from_millis(5_000)
        );
        assert_eq!(timeline.worker_start(3, 4, RampUpMode::Immediate), start);
    }

    #[test]
    fn test_phase_boundary() {
        let start = Instant::now();
        let timeline = Timeline::starting_at(start, &config(2, 5));
        assert_eq!(timeline.phase_at(start), Phase::RampUp);
        assert_eq!(timeline.phase_at(timeline.ramp_up_end), Phase::SteadyState);
        assert!(!timeline.is_over(timeline.ramp_up_end));
        assert!(timeline.is_over(timeline.test_end));
    }

    #[test]
    fn test_zero_ramp_up_starts_in_steady_state() {
        let start = Instant::now();
        let timeline = Timeline::starting_at(start, &config(0, 1));
        assert_eq!(timeline.phase_at(start), Phase::SteadyState);
    }

    #[test]
    fn test_signed_elapsed() {
        let start = Instant::now();
        let later = start + Duration::from_millis(250);
        assert_eq!(elapsed_ms(start, later), 250);
        assert_eq!(elapsed_ms(later, start), -250);
    }
}
