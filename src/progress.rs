use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar shown while a dataset fills its cache
pub struct CacheProgress {
    pub progress_bar: ProgressBar,
}

impl CacheProgress {
    /// Create a visible progress tracker for `total` samples
    pub fn new(label: &str, total: u64) -> Self {
        let pb = ProgressBar::new(total);

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "{}: {{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} samples ({{per_sec}}, ETA: {{eta}})",
                label
            ))
            .map(|s| s.progress_chars("█▉▊▋▌▍▎▏  "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);

        Self { progress_bar: pb }
    }

    /// A tracker that draws nothing
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Call this when one sample has been cached
    pub fn sample_cached(&self) {
        self.progress_bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    /// Finish the progress bar with a completion message
    pub fn finish(&self, label: &str, cached: usize, duration: Duration) {
        let rate = cached as f64 / duration.as_secs_f64().max(f64::EPSILON);
        self.progress_bar.finish_with_message(format!(
            "{} cache filled: {} samples in {:.2}s ({:.1} samples/s)",
            label,
            cached,
            duration.as_secs_f64(),
            rate
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_tracker_still_counts() {
        let p = CacheProgress::hidden();
        p.sample_cached();
        p.sample_cached();
        assert_eq!(p.position(), 2);
        p.finish("validation", 2, Duration::from_millis(5));
    }
}
