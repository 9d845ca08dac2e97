use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use extpack_core::{Config, Extension, ExtensionLayout};
use extpack_engine::{
    check_extension, format_destination, package, Deployer, FixtureEngine, RunMode,
};
use extpack_warehouse::Session;

/// extpack - Package, deploy and test warehouse procedure extensions
#[derive(Parser)]
#[command(name = "extpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Action to run
    #[arg(value_enum)]
    action: Action,

    /// Choose one component (test and capture only)
    #[arg(short, long)]
    component: Option<String>,

    /// Dataset or schema to deploy to (deploy only)
    #[arg(short, long)]
    destination: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Extension directory
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Build extension.zip
    Package,

    /// Install the extension into a destination
    Deploy,

    /// Deploy to the test location and compare outputs against fixtures
    Test,

    /// Deploy to the test location and overwrite fixtures
    Capture,

    /// Check procedure definitions against metadata
    Check,
}

impl Cli {
    /// Cross-argument rules clap cannot express on its own
    fn validate(&self) -> Result<(), (ErrorKind, &'static str)> {
        if self.component.is_some() && !matches!(self.action, Action::Test | Action::Capture) {
            return Err((
                ErrorKind::ArgumentConflict,
                "Component can only be used with 'capture' and 'test' actions",
            ));
        }
        match (self.action, self.destination.is_some()) {
            (Action::Deploy, false) => Err((
                ErrorKind::MissingRequiredArgument,
                "Destination is required with 'deploy' action",
            )),
            (Action::Deploy, true) | (_, false) => Ok(()),
            (_, true) => Err((
                ErrorKind::ArgumentConflict,
                "Destination can only be used with 'deploy' action",
            )),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err((kind, message)) = cli.validate() {
        Cli::command().error(kind, message).exit();
    }

    dotenvy::dotenv().ok();
    init_logging(cli.verbose);
    tracing::debug!(action = ?cli.action, root = %cli.root.display(), "Starting");

    let layout = ExtensionLayout::new(&cli.root);
    let extension = layout
        .load()
        .with_context(|| format!("Failed to load extension from {}", cli.root.display()))?;

    match cli.action {
        Action::Package => package_command(&extension, &layout),
        Action::Check => check_command(&extension, &layout),
        Action::Deploy => {
            let session = Session::new(Config::from_env());
            let destination = cli.destination.as_deref().unwrap_or_default();
            deploy_command(&session, &extension, &layout, destination).await
        }
        Action::Test => {
            let session = Session::new(Config::from_env());
            fixture_command(&session, &extension, &layout, cli.component.as_deref(), RunMode::Test).await
        }
        Action::Capture => {
            let session = Session::new(Config::from_env());
            fixture_command(&session, &extension, &layout, cli.component.as_deref(), RunMode::Capture).await
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the level picked from `--verbose`
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_filter = format!(
        "warn,extpack={level},extpack_core={level},extpack_warehouse={level},extpack_sql={level},extpack_engine={level}"
    );

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn package_command(extension: &Extension, layout: &ExtensionLayout) -> Result<()> {
    eprintln!("{}", "Packaging extension...".cyan());

    let path = package(extension, layout).context("Failed to package extension")?;

    println!(
        "{} '{}' file.",
        "Extension correctly packaged to".green(),
        path.display()
    );
    Ok(())
}

fn check_command(extension: &Extension, layout: &ExtensionLayout) -> Result<()> {
    eprintln!("{}", "Checking extension...".cyan());

    check_extension(extension, layout)?;

    println!("{}", "✓ Extension correctly checked. No errors found.".green().bold());
    Ok(())
}

async fn deploy_command(
    session: &Session,
    extension: &Extension,
    layout: &ExtensionLayout,
    destination: &str,
) -> Result<()> {
    let provider = extension.provider;
    let adapter = session.adapter(provider).await?;
    Deployer::new(adapter)
        .deploy(extension, layout, &format_destination(provider, destination))
        .await?;

    println!("{} {}.", "✓ Extension correctly deployed to".green(), provider);
    Ok(())
}

async fn fixture_command(
    session: &Session,
    extension: &Extension,
    layout: &ExtensionLayout,
    component: Option<&str>,
    mode: RunMode,
) -> Result<()> {
    let provider = extension.provider;
    match mode {
        RunMode::Test => eprintln!("{}", "Testing extension...".cyan()),
        RunMode::Capture => eprintln!("{}", "Capturing fixtures...".cyan()),
    }

    let adapter = session.adapter(provider).await?;
    let destination = session.workflows_temp(provider)?;
    let report = FixtureEngine::new(adapter, layout, destination)
        .deploy_and_run(extension, component, mode)
        .await?;

    eprintln!(
        "  {} components, {} test cases, {} input tables",
        report.components.len(),
        report.test_cases,
        report.tables_loaded
    );

    match mode {
        RunMode::Test => println!("{}", "✓ Extension correctly tested.".green().bold()),
        RunMode::Capture => {
            for path in &report.captured {
                eprintln!("  {} {}", "Wrote".cyan(), path.display());
            }
            println!("{}", "✓ Fixtures correctly captured.".green().bold());
        }
    }
    Ok(())
}
