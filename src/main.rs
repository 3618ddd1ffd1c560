#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;

use polysub::app_config::{self, Config, TranslationProvider};
use polysub::app_controller::{Controller, RunRequest};
use polysub::cancellation::Cancellation;
use polysub::file_utils::FileManager;
use polysub::language_utils::{self, TargetLanguage};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    OpenAI,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Output options shared by the pipeline commands
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Output directory (defaults to the input's directory)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Target languages, comma separated (e.g. 'fr,de,zh-hant')
    #[arg(short, long = "targets", value_delimiter = ',')]
    targets: Vec<String>,

    /// Edited transcript to apply before translating
    #[arg(short, long, value_name = "FILE")]
    edited: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcribe and translate a media file or every media file in a directory
    Run {
        /// Media file or directory
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Transcribe media into a source-language SRT and an editable transcript
    Transcribe {
        /// Media file or directory
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Translate an existing source-language SRT
    Translate {
        /// Source-language SRT file
        #[arg(value_name = "SRT_FILE")]
        input_path: PathBuf,

        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the supported target languages
    Languages,

    /// Generate shell completions for polysub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// polysub - multilingual subtitles from spoken media
///
/// Transcribes audio or video with a speech-to-text service and translates
/// the transcript into many languages at once.
#[derive(Parser, Debug)]
#[command(name = "polysub")]
#[command(version = "0.1.0")]
#[command(about = "Multilingual subtitles from spoken media")]
#[command(long_about = "polysub transcribes audio or video files and translates the transcript into several languages.

EXAMPLES:
    polysub run talk.mp4 -t fr,de,ja               # Transcribe, then translate into three languages
    polysub transcribe talk.mp4                    # Only write talk.en.srt and talk.transcript.txt
    polysub run talk.mp4 -t es -e talk.edited.txt  # Apply corrections before translating
    polysub translate talk.en.srt -t zh-hans,ko    # Translate an existing subtitle file
    polysub -p lmstudio run /lectures/ -t fr       # Process a directory with a local server
    polysub languages                              # List supported target languages
    polysub completions bash > polysub.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. The API key may also come from OPENAI_API_KEY.

SUPPORTED PROVIDERS:
    openai    - OpenAI API (transcription and translation, requires API key)
    lmstudio  - LM Studio local server (translation, OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Spoken language of the media (e.g., 'en', 'es', 'fr')
    #[arg(short, long, global = true)]
    source_language: Option<String>,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Marker and ANSI color for a log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("✗", "1;31"),
            Level::Warn => ("!", "1;33"),
            Level::Info => ("•", "1;32"),
            Level::Debug => ("›", "1;36"),
            Level::Trace => ("·", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (marker, color) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace lets the config raise the level later; the max level gates output
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(*shell, &mut cmd, "polysub", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Languages => {
            print_languages();
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let cancel = Cancellation::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing what is already done...");
            signal_cancel.cancel();
        }
    });

    let controller = Controller::with_config(config.clone())?
        .with_cancellation(cancel)
        .with_progress(!cli.no_progress);

    let result = match cli.command {
        Commands::Run {
            input_path,
            targets,
            output,
        } => {
            config.validate_transcription()?;
            let request = build_request(&config, input_path, &targets, &output)?;
            run_pipeline(&controller, request).await
        }
        Commands::Transcribe { input_path, output } => {
            config.validate_transcription()?;
            run_transcribe(&controller, input_path, &output).await
        }
        Commands::Translate {
            input_path,
            targets,
            output,
        } => {
            if !input_path.is_file() {
                return Err(anyhow!("Subtitle file does not exist: {:?}", input_path));
            }
            let request = build_request(&config, input_path, &targets, &output)?;
            if request.targets.is_empty() {
                return Err(anyhow!("No target languages given (use -t or target_languages in the config)"));
            }
            controller.run(request).await.map(|_| ())
        }
        Commands::Languages | Commands::Completions { .. } => Ok(()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

// Load the config file and apply command line overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &cli.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }

    if let Some(source_lang) = &cli.source_language {
        config.source_language = source_lang.clone();
    }

    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn build_request(config: &Config, input: PathBuf, target_args: &TargetArgs, output: &OutputArgs) -> Result<RunRequest> {
    let targets = if target_args.targets.is_empty() {
        config.targets()?
    } else {
        target_args
            .targets
            .iter()
            .map(|t| TargetLanguage::parse(t))
            .collect::<Result<Vec<_>>>()?
    };

    let mut unique: Vec<TargetLanguage> = Vec::with_capacity(targets.len());
    for target in targets {
        if !unique.iter().any(|t| t.code == target.code) {
            unique.push(target);
        }
    }

    Ok(RunRequest {
        input,
        targets: unique,
        edited: target_args.edited.clone(),
        output_dir: output.output_dir.clone(),
        force_overwrite: output.force_overwrite,
    })
}

async fn run_pipeline(controller: &Controller, request: RunRequest) -> Result<()> {
    if request.input.is_dir() {
        if request.edited.is_some() {
            return Err(anyhow!("--edited applies to a single file, not a directory"));
        }
        let input_dir = request.input.clone();
        let summary = controller.run_folder(&input_dir, &request).await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} file(s) failed", summary.failed));
        }
        return Ok(());
    }

    let report = controller.run(request).await?;
    if report.cancelled {
        warn!("Run was cancelled; some languages were not produced");
    }
    Ok(())
}

async fn run_transcribe(controller: &Controller, input_path: PathBuf, output: &OutputArgs) -> Result<()> {
    let files = if input_path.is_dir() {
        FileManager::find_media_files(&input_path)?
    } else if input_path.is_file() {
        vec![input_path.clone()]
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    };

    for file in files {
        let output_dir = output
            .output_dir
            .clone()
            .unwrap_or_else(|| FileManager::default_output_dir(&file));
        let outcome = controller
            .transcribe_media(&file, &output_dir, output.force_overwrite)
            .await?;
        info!("Success: {}", outcome.srt_path.display());
        info!("Edit and pass back with --edited: {}", outcome.transcript_path.display());
    }
    Ok(())
}

fn print_languages() {
    for language in language_utils::supported_languages() {
        println!("{:<8} {:<24} {}", language.code, language.canonical_name, language.display_name);
    }
}
