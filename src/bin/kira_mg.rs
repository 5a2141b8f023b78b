use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_mirna_graph::app::{App, ProgressSink};
use kira_mirna_graph::config::{ConfigLoader, ResolvedConfig};
use kira_mirna_graph::ensembl::EnsemblHttpClient;
use kira_mirna_graph::error::KiraError;
use kira_mirna_graph::gene::GeneLookup;
use kira_mirna_graph::import::ImportReport;
use kira_mirna_graph::import::mirtarbase::MirTarBaseOptions;
use kira_mirna_graph::import::pictar::PicTarOptions;
use kira_mirna_graph::import::rna22::Rna22Options;
use kira_mirna_graph::import::targetscan::TargetScanOptions;
use kira_mirna_graph::ncbi::NcbiHttpClient;
use kira_mirna_graph::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_mirna_graph::store::Store;
use kira_mirna_graph::uniprot::UniprotHttpClient;

#[derive(Parser)]
#[command(name = "kira-mg")]
#[command(about = "Load microRNA-target interactions into a reconciled property graph")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load hairpin and mature miRNAs from a miRBase .dat file")]
    Mirbase(MirbaseArgs),
    #[command(about = "Import TargetScan predicted targets")]
    Targetscan(TargetScanArgs),
    #[command(about = "Import validated interactions from miRTarBase")]
    Mirtarbase(MirTarBaseArgs),
    #[command(about = "Import PicTar predictions from a BED file")]
    Pictar(PicTarArgs),
    #[command(about = "Import RNA22 predictions")]
    Rna22(Rna22Args),
    #[command(about = "List the interactions recorded for a miRNA")]
    Predictions(PredictionsArgs),
    #[command(about = "Show loaded databases and relation summaries")]
    Relations,
    #[command(about = "Maintain the identifier cache")]
    Cache(CacheArgs),
}

#[derive(Args)]
struct MirbaseArgs {
    data_file: PathBuf,
    species_prefix: String,

    #[arg(long)]
    species_name: Option<String>,
}

#[derive(Args)]
struct TargetScanArgs {
    data_file: PathBuf,
    species_prefix: String,

    #[arg(long)]
    min_pct: Option<f64>,

    #[arg(long, value_delimiter = ',')]
    seed_match: Vec<String>,

    #[arg(long)]
    restart: bool,
}

#[derive(Args)]
struct MirTarBaseArgs {
    data_file: PathBuf,
    species_prefix: String,

    #[arg(long, help = "Keep only strong experiments without weak support")]
    strong_evidence: bool,

    #[arg(long, value_delimiter = ',')]
    support_type: Vec<String>,

    #[arg(long)]
    restart: bool,
}

#[derive(Args)]
struct PicTarArgs {
    data_file: PathBuf,
    relation_name: String,

    #[arg(long)]
    species_prefix: Option<String>,

    #[arg(long)]
    min_score: Option<f64>,

    #[arg(long, help = "Keep sites at or above this score percentile (0-100)")]
    min_percentile: Option<f64>,

    #[arg(long)]
    restart: bool,
}

#[derive(Args)]
struct Rna22Args {
    data_file: PathBuf,
    relation_name: String,

    #[arg(long, allow_hyphen_values = true)]
    max_score: Option<f64>,

    #[arg(long, help = "Average the scores of each miRNA-gene pair")]
    average: bool,

    #[arg(long)]
    restart: bool,
}

#[derive(Args)]
struct PredictionsArgs {
    mirna_name: String,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "Rewrite the gene cache keeping the first record per key")]
    Compact,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InputNotFound(_)
        | KiraError::MissingColumns { .. }
        | KiraError::InvalidSpecies(_)
        | KiraError::InvalidOption(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        KiraError::NcbiHttp(_)
        | KiraError::NcbiStatus { .. }
        | KiraError::EnsemblHttp(_)
        | KiraError::EnsemblStatus { .. }
        | KiraError::UniprotHttp(_)
        | KiraError::UniprotStatus { .. } => 3,
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
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = configure_store(Store::new()?, &config);

    match cli.command {
        Commands::Mirbase(args) => {
            let app = offline_app(store, config);
            let report = app.import_mirbase(
                &args.data_file,
                &args.species_prefix,
                args.species_name.as_deref(),
                sink(output_mode),
            )?;
            print_report(&report, output_mode)
        }
        Commands::Targetscan(args) => {
            let app = online_app(store, config)?;
            let options = TargetScanOptions {
                min_pct: args.min_pct,
                seed_matches: args.seed_match,
            };
            let report = app.import_targetscan(
                &args.data_file,
                &args.species_prefix,
                &options,
                args.restart,
                sink(output_mode),
            )?;
            print_report(&report, output_mode)
        }
        Commands::Mirtarbase(args) => {
            let app = online_app(store, config)?;
            let options = MirTarBaseOptions {
                strong_evidence: args.strong_evidence,
                support_types: args.support_type,
            };
            let report = app.import_mirtarbase(
                &args.data_file,
                &args.species_prefix,
                &options,
                args.restart,
                sink(output_mode),
            )?;
            print_report(&report, output_mode)
        }
        Commands::Pictar(args) => {
            let app = online_app(store, config)?;
            let options = PicTarOptions {
                min_score: args.min_score,
                min_percentile: args.min_percentile,
            };
            let report = app.import_pictar(
                &args.data_file,
                &args.relation_name,
                args.species_prefix.as_deref(),
                &options,
                args.restart,
                sink(output_mode),
            )?;
            print_report(&report, output_mode)
        }
        Commands::Rna22(args) => {
            let app = online_app(store, config)?;
            let options = Rna22Options {
                max_score: args.max_score,
                average: args.average,
            };
            let report = app.import_rna22(
                &args.data_file,
                &args.relation_name,
                &options,
                args.restart,
                sink(output_mode),
            )?;
            print_report(&report, output_mode)
        }
        Commands::Predictions(args) => {
            let result = offline_app(store, config).predictions(&args.mirna_name)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_predictions(&result),
                OutputMode::Text => ConsoleOutput::print_predictions(&result),
            }
            .into_diagnostic()
        }
        Commands::Relations => {
            let result = offline_app(store, config).relations()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_relations(&result),
                OutputMode::Text => ConsoleOutput::print_relations(&result),
            }
            .into_diagnostic()
        }
        Commands::Cache(CacheArgs {
            command: CacheCommand::Compact,
        }) => {
            let result = offline_app(store, config).compact_caches()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_compact(&result),
                OutputMode::Text => ConsoleOutput::print_compact(&result),
            }
            .into_diagnostic()
        }
    }
}

fn configure_store(store: Store, config: &ResolvedConfig) -> Store {
    let store = match &config.graph_path {
        Some(path) => store.with_graph_path(path.clone()),
        None => store,
    };
    match &config.cache_dir {
        Some(dir) => store.with_cache_root(Utf8PathBuf::from(dir.as_str())),
        None => store,
    }
}

fn sink(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &ConsoleOutput,
    }
}

fn print_report(report: &ImportReport, mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_report(report),
        OutputMode::Text => ConsoleOutput::print_report(report),
    }
    .into_diagnostic()
}

fn online_app(
    store: Store,
    config: ResolvedConfig,
) -> miette::Result<App<NcbiHttpClient, EnsemblHttpClient, UniprotHttpClient>> {
    Ok(App::new(
        store,
        config,
        NcbiHttpClient::new()?,
        EnsemblHttpClient::new()?,
        UniprotHttpClient::new()?,
    ))
}

fn offline_app(store: Store, config: ResolvedConfig) -> App<Offline, Offline, Offline> {
    App::new(store, config, Offline, Offline, Offline)
}

/// Stand-in for commands that never reach a gene lookup service.
struct Offline;

impl GeneLookup for Offline {
    fn name(&self) -> &str {
        "offline"
    }
}
