use std::time::{Duration, Instant};

/// Wall-clock measurement of one batch run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessTimer {
    started_at: Instant,
}

impl ProcessTimer {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn stop(self) -> Duration {
        self.started_at.elapsed()
    }
}

/// `HH:MM:SS.mmm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        elapsed.subsec_millis()
    )
}

/// Logs the end-of-run summary.
pub fn execution_timer(processed_count: usize, unprocessed_count: usize, process_time: Duration) {
    log::info!(
        "Processing finished in {}. Processed: {}, unprocessed: {}",
        format_elapsed(process_time),
        processed_count,
        unprocessed_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds_and_millis() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "00:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(65_250)), "00:01:05.250");
        assert_eq!(
            format_elapsed(Duration::from_secs(2 * 3600 + 3 * 60 + 4)),
            "02:03:04.000"
        );
    }

    #[test]
    fn stop_measures_elapsed_time() {
        let timer = ProcessTimer::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.stop() >= Duration::from_millis(5));
    }
}
