use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marker_gene_builder::app::App;
use marker_gene_builder::config::{ConfigLoader, ResolvedConfig, StoreLocation};
use marker_gene_builder::dispatch::DispatchOptions;
use marker_gene_builder::domain::GenomeId;
use marker_gene_builder::error::MarkerError;
use marker_gene_builder::http_store::HttpStore;
use marker_gene_builder::output::{HumanOutput, JsonOutput, OutputMode};
use marker_gene_builder::progress::ItemLog;
use marker_gene_builder::search::Hmmsearch;
use marker_gene_builder::store::{LocalStore, RemoteStore};

#[derive(Parser)]
#[command(name = "marker-genes")]
#[command(about = "Identify marker genes for a selection of genomes and publish them to the store")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Process the selected genomes, skipping those already complete")]
    Process(ProcessArgs),
    #[command(hide = true)]
    RunItem(RunItemArgs),
}

#[derive(Args)]
struct ProcessArgs {
    #[arg(long, help = "all, comma-separated genome ids, or idx:modulus slices such as 1:30")]
    selection: String,

    #[arg(long, help = "Rebuild genomes whose outputs already exist")]
    force: bool,

    #[arg(long, help = "Keep working directories and reuse search reports found in them")]
    debug: bool,

    #[arg(long, help = "Report what would be processed without running anything")]
    dry_run: bool,

    #[arg(long, help = "Maximum number of genomes processed at once")]
    jobs: Option<usize>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Args)]
struct RunItemArgs {
    #[arg(long)]
    catalog: Utf8PathBuf,

    #[arg(long)]
    model: Utf8PathBuf,

    #[arg(long)]
    genome: String,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MarkerError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MarkerError) -> u8 {
    match error {
        MarkerError::InvalidSelection { .. }
        | MarkerError::InvalidGenomeId(_)
        | MarkerError::UnknownGenome(_)
        | MarkerError::ConfigRead(_)
        | MarkerError::ConfigParse(_) => 2,
        MarkerError::Remote { .. }
        | MarkerError::RemoteStatus { .. }
        | MarkerError::RemoteNotFound(_)
        | MarkerError::MalformedCatalog(_)
        | MarkerError::MissingTool(_)
        | MarkerError::ExternalTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            match config.store.clone() {
                StoreLocation::Local(root) => run_process(args, LocalStore::new(root), config),
                StoreLocation::Http(url) => run_process(args, HttpStore::new(&url)?, config),
            }
        }
        Commands::RunItem(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            match config.store.clone() {
                StoreLocation::Local(root) => run_item(args, LocalStore::new(root), config),
                StoreLocation::Http(url) => run_item(args, HttpStore::new(&url)?, config),
            }
        }
    }
}

fn build_app<S: RemoteStore>(
    store: S,
    config: ResolvedConfig,
    require_tool: bool,
) -> miette::Result<App<S, Hmmsearch>> {
    let tool = Hmmsearch::new(config.hmmsearch, config.search_threads);
    if require_tool {
        if !tool.is_available() {
            return Err(MarkerError::MissingTool("hmmsearch".to_string()).into());
        }
        match tool.version() {
            Some(version) => info!(%version, "using search tool"),
            None => warn!("could not determine hmmsearch version"),
        }
    }
    Ok(App::new(store, tool, config.settings, config.work_dir))
}

fn run_process<S: RemoteStore>(
    args: ProcessArgs,
    store: S,
    config: ResolvedConfig,
) -> miette::Result<()> {
    let options = DispatchOptions {
        force: args.force,
        debug: args.debug,
        dry_run: args.dry_run,
        jobs: args.jobs.unwrap_or(config.jobs).max(1),
    };
    let output_mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let app = build_app(store, config, !args.dry_run)?;
    let summary = app.process(&args.selection, &options)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_run(&summary).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_run(&summary).into_diagnostic()?,
    }
    summary.into_result()?;
    Ok(())
}

fn run_item<S: RemoteStore>(
    args: RunItemArgs,
    store: S,
    config: ResolvedConfig,
) -> miette::Result<()> {
    let genome: GenomeId = args.genome.parse()?;
    let current = std::env::current_dir().into_diagnostic()?;
    let work_dir = Utf8PathBuf::from_path_buf(current)
        .map_err(|_| miette::miette!("current directory is not valid UTF-8"))?;

    let app = build_app(store, config, true)?;
    let log = ItemLog::open(
        work_dir.join(marker_gene_builder::layout::ITEM_LOG).as_std_path(),
        genome.as_str(),
    )?;
    let report = app.run_item(&args.catalog, &args.model, &genome, &work_dir, &log)?;
    info!(genome = %genome, markers = report.markers, "genome finished");
    Ok(())
}
