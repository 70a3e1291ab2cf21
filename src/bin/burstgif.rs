use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use burstgif::{
    BurstPipeline, DecodeErrorPolicy, ImportOptions, OperationType, PipelineOptions,
    ProgressCallback, ProgressInfo, create_working_directory, import_card_images,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  burstgif create ~/Pictures/2023-04-01\\ claymation --progress\n  burstgif create project/ --threads 4 --on-decode-error skip --json\n  burstgif init ~/Pictures --date 2023/04/01 --name claymation --card /media/sdcard/DCIM\n  burstgif completions zsh > _burstgif";

#[derive(Debug, Parser)]
#[command(
    name = "burstgif",
    version,
    about = "Reconstruct burst sequences from raw camera files into animated GIFs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show progress bars where supported.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect burst sequences under a project's RAWs tree and render GIFs.
    #[command(
        about = "Detect bursts and render GIFs",
        after_help = "Examples:\n  burstgif create project/\n  burstgif create project/ --raws other/RAWs --out renders --min-length 15 --json"
    )]
    Create {
        /// Project directory (expects a RAWs subtree unless --raws is given).
        project: PathBuf,

        /// Input tree of raw files. Defaults to <project>/RAWs.
        #[arg(long)]
        raws: Option<PathBuf>,

        /// Output root for the GIFs tree. Defaults to <project>.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum inter-frame gap in seconds (inclusive).
        #[arg(long, default_value_t = 1.0)]
        gap: f64,

        /// Minimum frames for a sequence closed mid-stream.
        #[arg(long, default_value_t = 20)]
        min_length: usize,

        /// Relaxed minimum for the trailing sequence.
        #[arg(long, default_value_t = 10)]
        min_trailing: usize,

        /// Longer edge of the downsampled preview frames, in pixels.
        #[arg(long, default_value_t = 512)]
        max_size: u32,

        /// Per-frame delay in hundredths of a second.
        #[arg(long, default_value_t = 10)]
        delay: u16,

        /// Worker threads for parallel downsampling.
        #[arg(long)]
        threads: Option<usize>,

        /// Recognized raw extensions (repeatable). Defaults to the builtin set.
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// What a frame decode failure does: fail-sequence | skip | abort.
        #[arg(long, default_value = "fail-sequence")]
        on_decode_error: String,

        /// Command used to read EXIF capture times.
        #[arg(long, default_value = "exiftool")]
        exiftool: String,

        /// Print the run report as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a dated project working directory (optionally importing a card).
    #[command(
        about = "Bootstrap a project directory",
        after_help = "Examples:\n  burstgif init ~/Pictures --date 2023/04/01 --name claymation\n  burstgif init ~/Pictures --date 2023/04/01 --name claymation --card /media/sdcard/DCIM"
    )]
    Init {
        /// Directory the project folder is created under.
        base: PathBuf,

        /// Shoot date, e.g. 2023/04/01.
        #[arg(long)]
        date: String,

        /// Project name.
        #[arg(long)]
        name: String,

        /// Card folder to import into RAWs/Card 1 after creation.
        #[arg(long)]
        card: Option<PathBuf>,
    },

    /// Import card images into an existing project's RAWs tree.
    #[command(about = "Import images from a card")]
    Import {
        /// Card folder to read.
        card: PathBuf,

        /// Project working directory.
        working_dir: PathBuf,

        /// Project name used as the rename prefix.
        #[arg(long)]
        name: String,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_decode_error_policy(value: &str) -> Option<DecodeErrorPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "fail-sequence" | "fail" => Some(DecodeErrorPolicy::FailSequence),
        "skip" | "skip-frame" => Some(DecodeErrorPolicy::SkipFrame),
        "abort" | "abort-run" => Some(DecodeErrorPolicy::AbortRun),
        _ => None,
    }
}

fn operation_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::Discovery => "Discovering",
        OperationType::Segmentation => "Clustering",
        OperationType::Materialization => "Copying originals",
        OperationType::Downsampling => "Downsampling",
        OperationType::GifEncoding => "Encoding GIF",
        OperationType::CardImport => "Importing card",
        _ => "Working",
    }
}

/// Bridges library progress callbacks onto an indicatif bar, swapping the
/// bar whenever the pipeline moves to a new operation.
struct TerminalProgress {
    state: Mutex<Option<(OperationType, ProgressBar)>>,
}

impl TerminalProgress {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        let fresh = !matches!(&*state, Some((op, _)) if *op == info.operation);
        if fresh {
            if let Some((_, bar)) = state.take() {
                bar.finish_and_clear();
            }
            let bar = ProgressBar::new(info.total.unwrap_or(0));
            if let Ok(style) =
                ProgressStyle::with_template("{msg:24} {bar:40.cyan/blue} {pos}/{len}")
            {
                bar.set_style(style.progress_chars("##-"));
            }
            *state = Some((info.operation, bar));
        }

        if let Some((_, bar)) = &*state {
            let label = match info.sequence {
                Some(n) => format!("{} GIF{n}", operation_label(info.operation)),
                None => operation_label(info.operation).to_string(),
            };
            bar.set_message(label);
            bar.set_position(info.current);
            if info.total.is_some_and(|t| info.current >= t) {
                bar.finish_and_clear();
            }
        }
    }
}

fn apply_global_options(global: &GlobalOptions) {
    let level = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Create {
            project,
            raws,
            out,
            gap,
            min_length,
            min_trailing,
            max_size,
            delay,
            threads,
            extensions,
            on_decode_error,
            exiftool,
            json,
        } => {
            let input = raws.unwrap_or_else(|| project.join("RAWs"));
            let output = out.unwrap_or(project);

            if !(gap > 0.0) || !gap.is_finite() {
                return Err(format!("--gap must be a positive number, got {gap}").into());
            }
            let policy = parse_decode_error_policy(&on_decode_error)
                .ok_or(format!("unsupported --on-decode-error: {on_decode_error}"))?;

            let mut options = PipelineOptions::new()
                .with_gap_threshold(Duration::from_secs_f64(gap))
                .with_min_length(min_length)
                .with_min_trailing_length(min_trailing)
                .with_max_dimension(max_size)
                .with_frame_delay(delay)
                .with_decode_error_policy(policy)
                .with_provider(Arc::new(
                    burstgif::ExifToolProvider::new().with_command(exiftool),
                ));
            if let Some(threads) = threads {
                options = options.with_worker_threads(threads);
            }
            if !extensions.is_empty() {
                options = options.with_extensions(&extensions);
            }
            if cli.global.progress {
                options = options.with_progress(Arc::new(TerminalProgress::new()));
            }

            let report = BurstPipeline::new(input, output)
                .with_options(options)
                .run()?;

            if json {
                let payload = json!({
                    "files_scanned": report.files_scanned,
                    "sequences_admitted": report.sequences_admitted,
                    "sequences_completed": report.sequences_completed,
                    "sequences_failed": report.sequences_failed,
                    "sequences_discarded": report.sequences_discarded,
                });
                println!("{payload}");
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Created {} GIF sequence folders ({} files scanned, {} short runs discarded)",
                        report.sequences_completed,
                        report.files_scanned,
                        report.sequences_discarded
                    )
                    .green()
                );
                if report.sequences_failed > 0 {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("{} sequence(s) failed; see log output", report.sequences_failed)
                            .yellow()
                    );
                }
            }
        }

        Commands::Init {
            base,
            date,
            name,
            card,
        } => {
            let working = create_working_directory(&base, &date, &name)?;
            println!("{} {}", "created".green().bold(), working.display());

            if let Some(card) = card {
                let options = import_options(&cli.global);
                let imported = import_card_images(&card, &working, &name, &options)?;
                println!(
                    "{} {}",
                    "imported".green().bold(),
                    format!("{imported} images from {}", card.display())
                );
            }
        }

        Commands::Import {
            card,
            working_dir,
            name,
        } => {
            let options = import_options(&cli.global);
            let imported = import_card_images(&card, &working_dir, &name, &options)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Imported {imported} images into {}", working_dir.display()).green()
            );
        }

        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

fn import_options(global: &GlobalOptions) -> ImportOptions {
    if global.progress {
        ImportOptions::new().with_progress(Arc::new(TerminalProgress::new()))
    } else {
        ImportOptions::new()
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
