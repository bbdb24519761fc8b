use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use peakframe_core::RunState;

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner on stderr that follows a run through its states
pub struct RunProgress {
    pb: ProgressBar,
    started: Instant,
}

impl RunProgress {
    pub fn new(video_id: &str, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            create_spinner(&format!("Downloading {}...", video_id))
        };

        Self {
            pb,
            started: Instant::now(),
        }
    }

    pub fn observe(&self, state: &RunState) {
        let done = |msg: &str| {
            self.pb.println(format!(
                "{} {} {}",
                style("✓").green().bold(),
                msg,
                style(format!("[{}]", format_duration(self.started.elapsed()))).dim()
            ));
        };

        match state {
            RunState::Pending => {}
            RunState::Downloaded => {
                done("Downloaded");
                self.pb.set_message("Extracting audio...");
            }
            RunState::AudioExtracted => {
                done("Audio extracted");
                self.pb
                    .set_message("Measuring loudness and transcribing...");
            }
            RunState::AudioAnalyzed => {
                done("Loudness peaks and transcript ready");
                self.pb.set_message("Extracting frame...");
            }
            RunState::FrameExtracted => done("Frame extracted"),
            RunState::Completed => self.pb.finish_and_clear(),
            RunState::Failed { stage, .. } => {
                self.pb.abandon_with_message(format!(
                    "{} {} failed",
                    style("✗").red().bold(),
                    stage
                ));
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_millis(4_300)), "4.3s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
