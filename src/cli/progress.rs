//! Progress display for pipeline runs.

use indicatif::{ProgressBar, ProgressStyle};

use flyerscout::models::{RunState, UploadOutcome};
use flyerscout::services::PipelineEvent;
use flyerscout::utils::format_size;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Renders pipeline events for one site as a spinner, then a bar per stage.
pub struct RunProgress {
    site: String,
    bar: ProgressBar,
    candidates: u64,
    artifacts: u64,
}

impl RunProgress {
    pub fn new(site: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self {
            site: site.to_string(),
            bar,
            candidates: 0,
            artifacts: 0,
        }
    }

    pub fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StateChanged { state, .. } => self.enter(state),
            PipelineEvent::SeedScanned { url, added, .. } => {
                self.bar
                    .set_message(format!("{}: {} candidates from {}", self.site, added, url));
            }
            PipelineEvent::SeedFailed { url, error } => {
                self.bar.println(format!(
                    "{} seed {} failed: {}",
                    console::style("✗").red(),
                    url,
                    error
                ));
            }
            PipelineEvent::CandidatesFound { total } => self.candidates = total as u64,
            PipelineEvent::DownloadStarted { url, .. } => self.bar.set_message(url),
            PipelineEvent::Downloaded { path, size, .. } => {
                self.artifacts += 1;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.bar.set_message(format!("{} ({})", name, format_size(size)));
                self.bar.inc(1);
            }
            PipelineEvent::Skipped { .. } => self.bar.inc(1),
            PipelineEvent::Failed { url, error } => {
                self.bar.println(format!(
                    "{} {}: {}",
                    console::style("✗").red(),
                    url,
                    error
                ));
                self.bar.inc(1);
            }
            PipelineEvent::Uploaded {
                file,
                store,
                outcome,
            } => {
                match outcome {
                    UploadOutcome::Failed { message } => self.bar.println(format!(
                        "{} upload of {} failed: {}",
                        console::style("✗").red(),
                        file,
                        message
                    )),
                    other => self
                        .bar
                        .set_message(format!("{} -> {} ({})", file, store, other.label())),
                }
                self.bar.inc(1);
            }
        }
    }

    fn enter(&mut self, state: RunState) {
        if state.is_terminal() {
            self.bar.finish_and_clear();
            return;
        }
        match state {
            RunState::Fetching => self.restart(self.candidates, "downloading"),
            RunState::Ingesting => self.restart(self.artifacts, "uploading"),
            _ => self.bar.set_message(format!("{}: {}", self.site, state)),
        }
    }

    fn restart(&mut self, len: u64, what: &str) {
        self.bar.set_style(bar_style());
        self.bar.set_length(len);
        self.bar.set_position(0);
        self.bar.set_message(format!("{}: {}", self.site, what));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
