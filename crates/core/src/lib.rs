//! Turn a YouTube video into its transcript, its five loudest seconds, and a
//! still frame from the loudest one.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use peakframe_core::{Pipeline, PipelineConfig, VideoRequest};
//!
//! let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//! let result = pipeline.run(&VideoRequest::new("dQw4w9WgXcQ")).await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod provider;
pub mod scratch;
pub mod stages;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::{AudioBackend, PipelineConfig, ToolPaths};
pub use error::{ConfigError, PipelineError, Result};
pub use format::{format_timestamp, parse_timestamp};
pub use pipeline::{Pipeline, PipelineBuilder, RunObserver, RunState};
pub use provider::{SpeechProvider, TranscriberConfig};
pub use scratch::RunScratch;
pub use stages::{AudioExtractor, Downloader, FrameExtractor, Transcriber};
pub use types::{
    ArtifactKind, LoudnessSample, MediaArtifact, PeakList, PipelineFailure, RunStatus, Stage,
    VideoRequest, VideoResult,
};
