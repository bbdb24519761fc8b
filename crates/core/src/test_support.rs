//! Fixtures shared by the unit tests.

use std::path::{Path, PathBuf};

/// Write a 16-bit WAV whose whole seconds have the given loudness in dBFS.
///
/// Each second is a square wave, so its RMS equals its amplitude. `None`
/// writes a silent second. `tail_frames` appends that many extra frames at the
/// loudest level, which never form a whole window.
pub fn write_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    seconds: &[Option<f64>],
    tail_frames: u32,
) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();

    let amplitude = |dbfs: Option<f64>| match dbfs {
        Some(db) => (32768.0 * 10f64.powf(db / 20.0)).round().min(32767.0) as i16,
        None => 0,
    };

    for &dbfs in seconds {
        let a = amplitude(dbfs);
        for frame in 0..sample_rate {
            let value = if frame % 2 == 0 { a } else { -a };
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
    }

    for frame in 0..tail_frames {
        let value = if frame % 2 == 0 { i16::MAX } else { -i16::MAX };
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }

    writer.finalize().unwrap();
}

/// Drop an executable shell script into `dir`, standing in for an external tool
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}
