//! nbmigrate - rewrite deprecated API usage in Jupyter notebooks.

use clap::Parser;
use color_eyre::Result;
use nbmigrate_core::MigrateConfig;
use nbmigrate_core::MistralClient;
use nbmigrate_core::Migrator;
use nbmigrate_core::OutputMode;
use nbmigrate_core::RuleSet;
use nbmigrate_core::ScanStrategy;
use nbmigrate_core::ServiceConfig;
use nbmigrate_core::config::API_KEY_ENV;
use nbmigrate_core::config::DEFAULT_EXEC_TIMEOUT_SECS;
use nbmigrate_core::config::DEFAULT_PATCH_PROGRAM;
use nbmigrate_core::config::ENDPOINT_ENV;
use nbmigrate_core::config::EXEC_TIMEOUT_ENV;
use nbmigrate_core::config::MODEL_ENV;
use nbmigrate_core::config::REPO_ROOT_ENV;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

/// Find deprecated library usage in notebook code cells and rewrite it
/// with the help of a text-generation service.
#[derive(Parser, Debug)]
#[command(name = "nbmigrate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Credential for the text-generation service
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Root of the repository holding the notebooks
    #[arg(long, env = REPO_ROOT_ENV, default_value = ".")]
    repo: PathBuf,

    /// Model identifier sent with every request
    #[arg(long, env = MODEL_ENV)]
    model: Option<String>,

    /// Chat-completions endpoint URL
    #[arg(long, env = ENDPOINT_ENV)]
    endpoint: Option<String>,

    /// Seconds allowed for executing one notebook in dynamic scan mode
    #[arg(long, env = EXEC_TIMEOUT_ENV, default_value_t = DEFAULT_EXEC_TIMEOUT_SECS)]
    exec_timeout: u64,

    /// How accepted changes are written back
    #[arg(long, value_enum, default_value = "in-place")]
    mode: ModeArg,

    /// Where issues come from
    #[arg(long, value_enum, default_value = "static")]
    scan: ScanArg,

    /// TOML rule table replacing the built-in one
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Program used to apply diffs in diff mode
    #[arg(long, default_value = DEFAULT_PATCH_PROGRAM)]
    patch_program: String,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    /// Store the corrected snippet into the cell
    InPlace,
    /// Ask for a unified diff and apply it with the patch program
    Diff,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::InPlace => OutputMode::InPlace,
            ModeArg::Diff => OutputMode::Diff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ScanArg {
    /// Match the rule table against cell text
    Static,
    /// Execute notebooks and use the deprecation warnings they print
    Dynamic,
}

impl From<ScanArg> for ScanStrategy {
    fn from(scan: ScanArg) -> Self {
        match scan {
            ScanArg::Static => ScanStrategy::Static,
            ScanArg::Dynamic => ScanStrategy::Dynamic,
        }
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Configuration errors stop the process with a diagnostic before any
/// notebook is touched; everything else goes to the eyre report.
fn exit_if_fatal<T>(result: nbmigrate_core::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose).to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let service = exit_if_fatal(ServiceConfig::new(cli.api_key, cli.model, cli.endpoint))?;

    let rules = exit_if_fatal(match &cli.rules {
        Some(path) => RuleSet::from_toml_file(path),
        None => RuleSet::builtin(),
    })?;
    info!("{} rule(s) loaded", rules.len());

    let config = MigrateConfig::new(cli.repo, rules)
        .with_mode(cli.mode.into())
        .with_scan(cli.scan.into())
        .with_exec_timeout(Duration::from_secs(cli.exec_timeout))
        .with_patch_program(cli.patch_program)
        .with_dry_run(cli.dry_run);

    let client = MistralClient::new(service);
    info!("using model {}", client.model());

    let report = exit_if_fatal(Migrator::new(config, client).run().await)?;
    info!("run finished: {:?}", report.stats);
    print!("{report}");

    Ok(())
}
