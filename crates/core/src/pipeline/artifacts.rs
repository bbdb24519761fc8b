use std::{io, path::PathBuf};

use crate::{
    error::CleanupError,
    types::{ArtifactKind, MediaArtifact},
};

/// Files and directories a run has created and still owns.
///
/// Everything tracked is removed by [`ArtifactLedger::cleanup`], or on drop if
/// the run future is cancelled before it gets there. Removal is best-effort:
/// failures are logged and swallowed.
#[derive(Debug, Default)]
pub(crate) struct ArtifactLedger {
    artifacts: Vec<MediaArtifact>,
    dirs: Vec<PathBuf>,
}

impl ArtifactLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&mut self, artifact: MediaArtifact) {
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
    }

    /// Track a scratch directory; it is removed recursively after the files
    pub(crate) fn track_dir(&mut self, dir: PathBuf) {
        self.dirs.push(dir);
    }

    /// Stop owning every artifact of `kind`; they survive cleanup
    pub(crate) fn release(&mut self, kind: ArtifactKind) {
        self.artifacts.retain(|a| a.kind != kind);
    }

    pub(crate) async fn cleanup(&mut self) {
        for artifact in self.artifacts.drain(..) {
            if let Err(e) = remove_missing_ok(tokio::fs::remove_file(&artifact.path).await) {
                log_cleanup_failure(CleanupError {
                    path: artifact.path,
                    source: e,
                });
            }
        }

        for dir in self.dirs.drain(..) {
            if let Err(e) = remove_missing_ok(tokio::fs::remove_dir_all(&dir).await) {
                log_cleanup_failure(CleanupError {
                    path: dir,
                    source: e,
                });
            }
        }
    }
}

impl Drop for ArtifactLedger {
    fn drop(&mut self) {
        if self.artifacts.is_empty() && self.dirs.is_empty() {
            return;
        }

        tracing::warn!(
            files = self.artifacts.len(),
            dirs = self.dirs.len(),
            "run dropped before cleanup, removing its artifacts"
        );

        for artifact in self.artifacts.drain(..) {
            if let Err(e) = remove_missing_ok(std::fs::remove_file(&artifact.path)) {
                log_cleanup_failure(CleanupError {
                    path: artifact.path,
                    source: e,
                });
            }
        }

        for dir in self.dirs.drain(..) {
            if let Err(e) = remove_missing_ok(std::fs::remove_dir_all(&dir)) {
                log_cleanup_failure(CleanupError {
                    path: dir,
                    source: e,
                });
            }
        }
    }
}

fn remove_missing_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn log_cleanup_failure(err: CleanupError) {
    tracing::warn!(error = %err, "artifact cleanup failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cleanup_removes_files_and_dirs() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = root.path().join("run-1");
        std::fs::create_dir_all(&run_dir).unwrap();
        let video = run_dir.join("video.mp4");
        let frame = root.path().join("frame.jpg");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(run_dir.join("video.mp4.part"), b"p").unwrap();
        std::fs::write(&frame, b"f").unwrap();

        let mut ledger = ArtifactLedger::new();
        ledger.track_dir(run_dir.clone());
        ledger.track(MediaArtifact::video(&video));
        ledger.track(MediaArtifact::frame(&frame));
        ledger.cleanup().await;

        assert!(!run_dir.exists());
        assert!(!frame.exists());
    }

    #[tokio::test]
    async fn released_artifacts_survive() {
        let root = tempfile::tempdir().unwrap();
        let audio = root.path().join("audio.wav");
        let frame = root.path().join("frame.jpg");
        std::fs::write(&audio, b"a").unwrap();
        std::fs::write(&frame, b"f").unwrap();

        let mut ledger = ArtifactLedger::new();
        ledger.track(MediaArtifact::audio(&audio));
        ledger.track(MediaArtifact::frame(&frame));

        ledger.release(ArtifactKind::Frame);
        ledger.cleanup().await;

        assert!(!audio.exists());
        assert!(frame.exists());
    }

    #[tokio::test]
    async fn missing_files_are_not_errors() {
        let root = tempfile::tempdir().unwrap();
        let mut ledger = ArtifactLedger::new();
        ledger.track(MediaArtifact::audio(root.path().join("never-written.wav")));
        ledger.track_dir(root.path().join("never-created"));
        ledger.cleanup().await;
    }

    #[test]
    fn drop_cleans_up_what_is_left() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = root.path().join("run-2");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join("audio.wav"), b"a").unwrap();

        {
            let mut ledger = ArtifactLedger::new();
            ledger.track_dir(run_dir.clone());
        }

        assert!(!run_dir.exists());
    }
}
