//! CPI deployer CLI entrypoint.
//!
//! This is the main entrypoint for the cpi-deployer command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use cpi_deployer::agent::{HttpAgentClientFactory, TaskPolling};
use cpi_deployer::blobstore::DavBlobstoreFactory;
use cpi_deployer::cli::{Cli, Commands, EventsArgs, OutputFormat, OutputFormatter};
use cpi_deployer::cloud::CpiCloudFactory;
use cpi_deployer::config::{Settings, YamlManifestParser, default_state_path, load_dotenv};
use cpi_deployer::deleter::{DeleterCollaborators, DeploymentDeleter};
use cpi_deployer::deployment::{AgentWait, StateManagerFactory};
use cpi_deployer::director::{Director, EventsFilter, HttpDirector};
use cpi_deployer::error::Result;
use cpi_deployer::installation::{ReleaseCpiInstaller, TargetProvider};
use cpi_deployer::registry::HttpRegistryServerManager;
use cpi_deployer::release::{
    ArchiveReleaseFetcher, JobResolver, LocalReleaseManager, ManagedReleaseJobResolver,
    ReleaseManager,
};
use cpi_deployer::stage::{CompositeStageObserver, LoggingStageObserver, Stage};
use cpi_deployer::state::{DeploymentStateService, FileDeploymentStateService};
use cpi_deployer::ui::{StagePrinter, TerminalUi, Ui};

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.output);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, output: OutputFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Delete { manifest, state } => {
            cmd_delete(&manifest, state, cli.output, cli.verbose, &formatter).await
        }
        Commands::Events(args) => cmd_events(&args, &formatter).await,
    }
}

/// Delete the deployment described by a manifest.
async fn cmd_delete(
    manifest_path: &Path,
    state_path: Option<PathBuf>,
    output: OutputFormat,
    verbose: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let manifest_dir = manifest_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    load_dotenv(manifest_dir)?;

    let settings = Settings::from_env();
    debug!(home = %settings.home.display(), "Loaded settings");

    let state_path = state_path.unwrap_or_else(|| default_state_path(manifest_path));
    let state_service: Arc<dyn DeploymentStateService> =
        Arc::new(FileDeploymentStateService::new(&state_path));

    let release_manager: Arc<dyn ReleaseManager> = Arc::new(LocalReleaseManager::new());
    let release_fetcher = Arc::new(ArchiveReleaseFetcher::new(
        settings.releases_work_dir(),
        Arc::clone(&release_manager),
    )?);
    let cpi_installer = Arc::new(ReleaseCpiInstaller::new(
        Arc::clone(&release_manager),
        JobResolver::new(Arc::new(ManagedReleaseJobResolver::new(Arc::clone(
            &release_manager,
        )))),
        TargetProvider::new(settings.installations_dir(), Arc::clone(&state_service)),
        Arc::new(HttpRegistryServerManager::new()),
    ));

    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::stderr(output));
    let deleter = DeploymentDeleter::new(DeleterCollaborators {
        ui,
        state_service: Arc::clone(&state_service),
        manifest_parser: Arc::new(YamlManifestParser::new()),
        release_fetcher,
        release_manager,
        cpi_installer,
        cloud_factory: Arc::new(CpiCloudFactory::new()),
        agent_client_factory: Arc::new(HttpAgentClientFactory::new(TaskPolling {
            delay: settings.agent_task_poll_delay,
            timeout: settings.agent_task_timeout,
        })),
        blobstore_factory: Arc::new(DavBlobstoreFactory::new()),
        manager_factory: Arc::new(StateManagerFactory::new(
            state_service,
            AgentWait::from(&settings),
        )),
    });

    let mut observer = CompositeStageObserver::new().with(Arc::new(StagePrinter::stderr(output)));
    if verbose {
        observer = observer.with(Arc::new(LoggingStageObserver::new()));
    }
    let stage = Stage::new(Arc::new(observer));

    deleter.delete_deployment(manifest_path, &stage).await?;

    eprintln!("{}", formatter.format_deleted(&state_path.display().to_string()));
    Ok(())
}

/// List director events.
async fn cmd_events(args: &EventsArgs, formatter: &OutputFormatter) -> Result<()> {
    let director = HttpDirector::new(&args.director)?;
    let events = director.events(&EventsFilter::from(args)).await?;

    eprintln!("{}", formatter.format_events(&events));
    Ok(())
}
