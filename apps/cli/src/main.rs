use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use peakframe_core::{
    AudioBackend, Pipeline, PipelineBuilder, PipelineConfig, RunState, SpeechProvider, ToolPaths,
    TranscriberConfig, VideoRequest,
    config::{DEFAULT_AUDIO_CHANNELS, DEFAULT_AUDIO_SAMPLE_RATE, DEFAULT_FRAME_URL_PREFIX},
    scratch,
};

use crate::progress::{RunProgress, format_duration};

mod logging;
mod progress;

/// CLI wrapper for SpeechProvider (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Openai,
    Groq,
    SelfHosted,
}

impl From<CliProvider> for SpeechProvider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Openai => SpeechProvider::Openai,
            CliProvider::Groq => SpeechProvider::Groq,
            CliProvider::SelfHosted => SpeechProvider::SelfHosted,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliAudioBackend {
    #[default]
    Ffmpeg,
    Library,
}

impl From<CliAudioBackend> for AudioBackend {
    fn from(cli: CliAudioBackend) -> Self {
        match cli {
            CliAudioBackend::Ffmpeg => AudioBackend::Ffmpeg,
            CliAudioBackend::Library => AudioBackend::Library,
        }
    }
}

#[derive(Parser)]
#[command(name = "peakframe")]
#[command(about = "Find the loudest seconds of a YouTube video, transcribe it, and grab a thumbnail frame")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Hide progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging for peakframe (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PEAKFRAME_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for one video and print the result document
    Process(ProcessArgs),
    /// Print a liveness document
    Health,
}

#[derive(Args)]
struct ProcessArgs {
    /// YouTube video id, e.g. dQw4w9WgXcQ
    video_id: String,

    /// Pretty-print the JSON document
    #[arg(long)]
    pretty: bool,

    /// How to pull the audio track out of the video
    #[arg(long, value_enum, default_value = "ffmpeg", env = "PEAKFRAME_AUDIO_BACKEND")]
    audio_backend: CliAudioBackend,

    /// Speech-to-text provider
    #[arg(short, long, value_enum, default_value = "openai", env = "PEAKFRAME_PROVIDER")]
    provider: CliProvider,

    /// API key; defaults to the provider's environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Override the provider's base URL (OpenAI-compatible)
    #[arg(long, env = "PEAKFRAME_TRANSCRIBE_URL")]
    api_url: Option<String>,

    /// Override the provider's transcription model
    #[arg(long, env = "PEAKFRAME_TRANSCRIBE_MODEL")]
    model: Option<String>,

    /// Spoken language hint (e.g., "en", "uk")
    #[arg(short, long)]
    lang: Option<String>,

    /// Where runs keep their intermediate files
    #[arg(long, env = "PEAKFRAME_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Where extracted frames are written
    #[arg(long, env = "PEAKFRAME_FRAMES_DIR")]
    frames_dir: Option<PathBuf>,

    /// Prefix of the reported frame reference
    #[arg(long, default_value = DEFAULT_FRAME_URL_PREFIX, env = "PEAKFRAME_FRAME_URL_PREFIX")]
    frame_url_prefix: String,

    /// Resample extracted audio to this rate (ffmpeg backend)
    #[arg(long, default_value_t = DEFAULT_AUDIO_SAMPLE_RATE)]
    sample_rate: u32,

    /// Downmix extracted audio to this many channels (ffmpeg backend)
    #[arg(long, default_value_t = DEFAULT_AUDIO_CHANNELS)]
    channels: u16,

    /// Keep the source sample rate and channel layout
    #[arg(long)]
    keep_source_audio: bool,

    /// Give up on the download after this many seconds
    #[arg(long, default_value_t = 600)]
    download_timeout: u64,

    /// Give up on transcription after this many seconds
    #[arg(long, default_value_t = 300)]
    transcribe_timeout: u64,

    #[arg(long, default_value = "yt-dlp", env = "PEAKFRAME_YT_DLP")]
    yt_dlp: PathBuf,

    #[arg(long, default_value = "ffmpeg", env = "PEAKFRAME_FFMPEG")]
    ffmpeg: PathBuf,

    #[arg(long, default_value = "ffprobe", env = "PEAKFRAME_FFPROBE")]
    ffprobe: PathBuf,

    /// Transcribe locally with this ggml Whisper model instead of calling a provider
    #[cfg(feature = "local-whisper")]
    #[arg(long, env = "PEAKFRAME_WHISPER_MODEL")]
    whisper_model: Option<PathBuf>,
}

impl ProcessArgs {
    fn uses_local_whisper(&self) -> bool {
        #[cfg(feature = "local-whisper")]
        {
            self.whisper_model.is_some()
        }
        #[cfg(not(feature = "local-whisper"))]
        {
            false
        }
    }

    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let provider: SpeechProvider = self.provider.into();

        // The key is resolved once here and handed to the transcriber
        let api_key = match &self.api_key {
            Some(key) => Some(key.clone()),
            None if self.uses_local_whisper() => None,
            None => provider.api_key_from_env()?,
        };

        let mut transcriber = TranscriberConfig::for_provider(provider, api_key);
        if let Some(url) = &self.api_url {
            transcriber.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            transcriber.model = model.clone();
        }
        transcriber.language = self.lang.clone();
        transcriber.timeout = Duration::from_secs(self.transcribe_timeout);

        let scratch_root = self
            .scratch_dir
            .clone()
            .unwrap_or_else(scratch::get_root_scratch_dir);
        let frames_dir = self
            .frames_dir
            .clone()
            .unwrap_or_else(scratch::get_default_frames_dir);

        let (mut sample_rate, mut channels) = if self.keep_source_audio {
            (None, None)
        } else {
            (Some(self.sample_rate), Some(self.channels))
        };
        let mut audio_backend: AudioBackend = self.audio_backend.into();
        if self.uses_local_whisper() {
            // whisper.cpp only takes 16 kHz mono
            audio_backend = AudioBackend::Ffmpeg;
            sample_rate = Some(16_000);
            channels = Some(1);
        }

        Ok(PipelineConfig {
            scratch_root,
            frames_dir,
            frame_url_prefix: self.frame_url_prefix.clone(),
            audio_backend,
            audio_sample_rate: sample_rate,
            audio_channels: channels,
            download_timeout: Duration::from_secs(self.download_timeout),
            tools: ToolPaths {
                yt_dlp: self.yt_dlp.clone(),
                ffmpeg: self.ffmpeg.clone(),
                ffprobe: self.ffprobe.clone(),
            },
            transcriber,
        })
    }

    fn build_pipeline(&self, config: PipelineConfig) -> Result<Pipeline> {
        let builder = self.with_local_whisper(Pipeline::builder(config));
        builder.build().context("Failed to set up the pipeline")
    }

    #[cfg(feature = "local-whisper")]
    fn with_local_whisper(&self, builder: PipelineBuilder) -> PipelineBuilder {
        let Some(model) = &self.whisper_model else {
            return builder;
        };

        unsafe {
            whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
        }
        builder.transcriber(Arc::new(
            peakframe_core::stages::LocalWhisperTranscriber::new(model, self.lang.clone()),
        ))
    }

    #[cfg(not(feature = "local-whisper"))]
    fn with_local_whisper(&self, builder: PipelineBuilder) -> PipelineBuilder {
        builder
    }
}

#[cfg(feature = "local-whisper")]
extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

async fn process(args: ProcessArgs, quiet: bool) -> Result<()> {
    let config = match args.pipeline_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };
    let pipeline = args.build_pipeline(config)?;

    if !quiet {
        eprintln!(
            "\n{}  {}\n",
            style("peakframe").cyan().bold(),
            style("Peaks, transcript & frame").dim()
        );
    }

    let progress = Arc::new(RunProgress::new(&args.video_id, quiet));
    let observer = {
        let progress = Arc::clone(&progress);
        move |state: &RunState| progress.observe(state)
    };

    let request = VideoRequest::new(&args.video_id);
    match pipeline.run_observed(&request, &observer).await {
        Ok(result) => {
            if !quiet {
                eprintln!(
                    "\n{} {}\n",
                    style("Total time:").dim(),
                    style(format_duration(progress.elapsed())).cyan().bold()
                );
            }
            print_json(&result, args.pretty)?;
            Ok(())
        }
        Err(failure) => {
            tracing::error!(stage = %failure.stage, error = %failure.error, "run failed");
            print_json(&failure, args.pretty)?;
            std::process::exit(1);
        }
    }
}

fn health() -> Result<()> {
    let doc = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    println!("{}", doc);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Command::Process(args) => process(args, cli.quiet).await,
        Command::Health => health(),
    }
}
