//! code-insights CLI

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use code_insights::{BitbucketClient, BitbucketTarget, Config, Git, LocalWorkspace, Pipeline};

/// Publish analysis results for changed files to Bitbucket Code Insights.
///
/// Settings come from a TOML file, then the environment (credentials),
/// then these flags.
#[derive(Parser)]
#[command(name = "code-insights")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace root
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Commit to annotate
    #[arg(long)]
    commit: Option<String>,

    /// Branch the commit is compared against
    #[arg(long)]
    base_branch: Option<String>,

    /// Report key; an empty value disables annotations
    #[arg(long)]
    report_key: Option<String>,

    #[arg(long)]
    checkstyle: Option<String>,

    #[arg(long)]
    spotbugs: Option<String>,

    #[arg(long)]
    pmd: Option<String>,

    #[arg(long)]
    jacoco: Option<String>,

    /// Copy the git directory to a scratch location before diffing
    #[arg(long)]
    isolate_git: bool,

    /// Convert and filter without publishing
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 2 when any step failed
    #[arg(long)]
    strict: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        let overrides = [
            (&self.commit, &mut config.commit_id),
            (&self.base_branch, &mut config.base_branch),
            (&self.report_key, &mut config.report_key),
            (&self.checkstyle, &mut config.checkstyle_file_path),
            (&self.spotbugs, &mut config.spotbugs_file_path),
            (&self.pmd, &mut config.pmd_file_path),
            (&self.jacoco, &mut config.jacoco_file_path),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
        if let Some(workspace) = &self.workspace {
            config.workspace = workspace.clone();
        }
        if self.isolate_git {
            config.isolate_git = true;
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "code_insights=debug" } else { "code_insights=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_env();
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    config.workspace = config
        .workspace
        .canonicalize()
        .with_context(|| format!("workspace {} is not accessible", config.workspace.display()))?;
    Ok(config)
}

async fn run(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let files = LocalWorkspace::new(&config.workspace).isolated(config.isolate_git);
    let publisher = BitbucketClient::new(
        BitbucketTarget::from_config(config),
        config.publish.timeout(),
        config.publish.retry_policy(),
    )?;

    let pipeline = Pipeline::new(config, &files, &Git, &publisher).dry_run(cli.dry_run);
    let outcome = pipeline.run().await?;
    println!("{outcome}");

    if cli.strict && !outcome.is_success() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = run(&cli, &config) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, already published results are kept");
            ExitCode::FAILURE
        }
    }
}
