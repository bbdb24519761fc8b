use std::fmt;

use crate::types::Stage;

/// Where a single run stands.
///
/// `AudioAnalyzed` is the join point of the concurrent loudness analysis and
/// transcription: it is entered once both have succeeded. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Downloaded,
    AudioExtracted,
    AudioAnalyzed,
    FrameExtracted,
    Completed,
    Failed { stage: Stage, cause: String },
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Downloaded => "downloaded",
            RunState::AudioExtracted => "audio_extracted",
            RunState::AudioAnalyzed => "audio_analyzed",
            RunState::FrameExtracted => "frame_extracted",
            RunState::Completed => "completed",
            RunState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed { .. })
    }

    pub fn can_advance_to(&self, next: &RunState) -> bool {
        use RunState::*;

        match (self, next) {
            (Completed | Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Pending, Downloaded)
            | (Downloaded, AudioExtracted)
            | (AudioExtracted, AudioAnalyzed)
            | (AudioAnalyzed, FrameExtracted)
            // no whole second of audio, so no frame to pull
            | (AudioAnalyzed, Completed)
            | (FrameExtracted, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Failed { stage, cause } => write!(f, "failed at {}: {}", stage, cause),
            other => f.write_str(other.name()),
        }
    }
}

/// Callback invoked on every state change of a run
pub type RunObserver<'a> = &'a (dyn Fn(&RunState) + Send + Sync);

/// Drives one run through [`RunState`], logging and reporting each step.
pub(crate) struct RunTracker<'a> {
    video_id: &'a str,
    state: RunState,
    observer: RunObserver<'a>,
}

impl<'a> RunTracker<'a> {
    pub(crate) fn new(video_id: &'a str, observer: RunObserver<'a>) -> Self {
        Self {
            video_id,
            state: RunState::Pending,
            observer,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &RunState {
        &self.state
    }

    pub(crate) fn advance(&mut self, next: RunState) {
        if !self.state.can_advance_to(&next) {
            tracing::error!(
                video_id = self.video_id,
                from = self.state.name(),
                to = next.name(),
                "illegal run state transition ignored"
            );
            return;
        }

        match &next {
            RunState::Failed { stage, cause } => tracing::warn!(
                video_id = self.video_id,
                from = self.state.name(),
                stage = stage.name(),
                cause = cause.as_str(),
                "run failed"
            ),
            _ => tracing::info!(
                video_id = self.video_id,
                from = self.state.name(),
                to = next.name(),
                "run advanced"
            ),
        }

        self.state = next;
        (self.observer)(&self.state);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn failed() -> RunState {
        RunState::Failed {
            stage: Stage::Transcription,
            cause: "quota".to_string(),
        }
    }

    #[test]
    fn happy_path_is_legal() {
        let path = [
            RunState::Pending,
            RunState::Downloaded,
            RunState::AudioExtracted,
            RunState::AudioAnalyzed,
            RunState::FrameExtracted,
            RunState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn stages_cannot_be_skipped() {
        assert!(!RunState::Pending.can_advance_to(&RunState::AudioExtracted));
        assert!(!RunState::Downloaded.can_advance_to(&RunState::AudioAnalyzed));
        assert!(!RunState::AudioExtracted.can_advance_to(&RunState::FrameExtracted));
        assert!(!RunState::Downloaded.can_advance_to(&RunState::Completed));
    }

    #[test]
    fn short_audio_may_skip_the_frame() {
        assert!(RunState::AudioAnalyzed.can_advance_to(&RunState::Completed));
    }

    #[test]
    fn failure_is_reachable_from_every_live_state() {
        for state in [
            RunState::Pending,
            RunState::Downloaded,
            RunState::AudioExtracted,
            RunState::AudioAnalyzed,
            RunState::FrameExtracted,
        ] {
            assert!(!state.is_terminal());
            assert!(state.can_advance_to(&failed()), "{state}");
        }
    }

    #[test]
    fn terminal_states_absorb() {
        for state in [RunState::Completed, failed()] {
            assert!(state.is_terminal());
            assert!(!state.can_advance_to(&RunState::Pending));
            assert!(!state.can_advance_to(&RunState::Completed));
            assert!(!state.can_advance_to(&failed()));
        }
    }

    #[test]
    fn tracker_reports_only_legal_steps() {
        let seen = Mutex::new(Vec::new());
        let observer = |state: &RunState| seen.lock().unwrap().push(state.clone());
        let mut tracker = RunTracker::new("abc", &observer);

        tracker.advance(RunState::Downloaded);
        tracker.advance(RunState::FrameExtracted);
        tracker.advance(failed());
        tracker.advance(RunState::Completed);

        assert_eq!(tracker.state(), &failed());
        assert_eq!(*seen.lock().unwrap(), vec![RunState::Downloaded, failed()]);
    }
}
