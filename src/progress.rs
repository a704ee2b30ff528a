use crate::search::{Progress, SearchComplete};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Terminal spinner fed by the search stream's progress items.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(visible: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if visible {
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
            {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
            }
            bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    pub fn update(&self, progress: &Progress) {
        let current = progress
            .current_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.bar.set_message(format!(
            "{} files | {} matches | {}",
            progress.files_walked, progress.files_matched, current
        ));
    }

    /// Clears the spinner so result lines print cleanly.
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        self.bar.suspend(f);
    }

    pub fn finish(&self, complete: Option<&SearchComplete>) {
        match complete {
            Some(c) => self.bar.finish_with_message(format!(
                "Completed in {:.2}s: {} files, {} matches",
                c.stats.elapsed.as_secs_f64(),
                c.stats.files_walked,
                c.stats.files_matched
            )),
            None => self.bar.finish_and_clear(),
        }
    }
}
