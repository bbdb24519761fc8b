use std::path::{Path, PathBuf};

use uuid::Uuid;

pub fn get_root_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("peakframe")
}

pub fn get_default_frames_dir() -> PathBuf {
    get_root_scratch_dir().join("frames")
}

/// Per-run naming. Every path a run touches carries the run's random token, so
/// concurrent runs for the same video never collide.
#[derive(Debug, Clone)]
pub struct RunScratch {
    token: Uuid,
    run_dir: PathBuf,
    frames_dir: PathBuf,
}

impl RunScratch {
    pub fn new(scratch_root: &Path, frames_dir: &Path) -> Self {
        let token = Uuid::new_v4();
        Self {
            token,
            run_dir: scratch_root.join(format!("run-{}", token)),
            frames_dir: frames_dir.to_path_buf(),
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Directory holding this run's intermediate artifacts
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// yt-dlp output template; yt-dlp fills in the extension
    pub fn video_template(&self) -> PathBuf {
        self.run_dir.join("video.%(ext)s")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.run_dir.join("audio.wav")
    }

    /// Frames outlive the run, so they go to the frames directory instead of the run dir
    pub fn frame_path(&self) -> PathBuf {
        self.frames_dir.join(format!("{}.jpg", self.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_never_share_paths() {
        let root = Path::new("/scratch");
        let frames = Path::new("/frames");
        let a = RunScratch::new(root, frames);
        let b = RunScratch::new(root, frames);

        assert_ne!(a.token(), b.token());
        assert_ne!(a.run_dir(), b.run_dir());
        assert_ne!(a.audio_path(), b.audio_path());
        assert_ne!(a.frame_path(), b.frame_path());
    }

    #[test]
    fn intermediates_live_in_run_dir() {
        let scratch = RunScratch::new(Path::new("/scratch"), Path::new("/frames"));

        assert!(scratch.audio_path().starts_with(scratch.run_dir()));
        assert!(scratch.video_template().starts_with(scratch.run_dir()));
        assert!(scratch.frame_path().starts_with("/frames"));
        assert!(!scratch.frame_path().starts_with(scratch.run_dir()));
    }
}
