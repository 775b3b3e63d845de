use anyhow::Context as _;
use clap::Parser;
use puppet_cache_invalidate::settings::Settings;
use puppet_cache_invalidate::{CacheIdentifier, ConfigurationError, Error, InvalidationReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Invalidate the Puppet Server environment cache simultaneously on multiple servers.
///
/// See https://puppet.com/docs/puppetserver/latest/admin-api/v1/environment-cache.html
///
/// Example: invalidate the environment cache for the 'production' environment
///
///   $ puppet-environment-cache-invalidate production
#[derive(Parser, Debug)]
#[command(name = "puppet-environment-cache-invalidate", version)]
struct Cli {
    /// Puppet environment whose cache is invalidated
    #[arg(value_name = "ENVIRONMENT", conflicts_with = "all_environments")]
    environment: Option<String>,

    /// Invalidate the cache of every environment
    #[arg(long)]
    all_environments: bool,

    /// Config file (default: /etc/puppet-environment-cache-invalidate.yaml, then
    /// $HOME/.puppet-environment-cache-invalidate/puppet-environment-cache-invalidate.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds (overrides the config file)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log in JSON format
    #[arg(long)]
    log_json: bool,

    /// Log to syslog instead of stdout
    #[arg(long)]
    log_syslog: bool,
}

impl Cli {
    fn cache(&self) -> Result<CacheIdentifier, ConfigurationError> {
        match (&self.environment, self.all_environments) {
            (Some(environment), _) if !environment.is_empty() => {
                Ok(CacheIdentifier::new(environment.as_str()))
            }
            (_, true) => Ok(CacheIdentifier::all()),
            _ => Err(ConfigurationError::MissingCacheIdentifier),
        }
    }
}

/// Logging switches: a flag or the matching settings key turns each one on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Logging {
    debug: bool,
    json: bool,
    syslog: bool,
}

impl Logging {
    fn resolve(cli: &Cli, settings: Option<&Settings>) -> Self {
        let from_settings = settings.map_or_else(Self::default, |s| Self {
            debug: s.debug,
            json: s.log_json,
            syslog: s.log_syslog,
        });
        Self {
            debug: cli.debug || from_settings.debug,
            json: cli.log_json || from_settings.json,
            syslog: cli.log_syslog || from_settings.syslog,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref());

    if let Err(e) = init_tracing(Logging::resolve(&cli, settings.as_ref().ok())) {
        eprintln!("ERROR: setting up logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli, settings).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => {
            error!("failed to invalidate some servers cache");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: Cli,
    settings: Result<Settings, ConfigurationError>,
) -> anyhow::Result<InvalidationReport> {
    let cache = cli.cache()?;

    let mut settings = settings.context("loading configuration")?;
    if let Some(timeout) = cli.timeout {
        settings.timeout = timeout;
    }

    let job = settings.into_job(cache)?;
    tracing::debug!(
        servers = job.servers.len(),
        timeout = ?job.timeout,
        "invalidating environment cache"
    );

    let report = job.run().await.map_err(run_error)?;
    render(&report);

    Ok(report)
}

fn run_error(e: Error) -> anyhow::Error {
    match e {
        Error::Credential(_) => anyhow::Error::new(e).context("building authenticated HTTP client"),
        e => e.into(),
    }
}

fn render(report: &InvalidationReport) {
    for outcome in report.outcomes() {
        match outcome.error() {
            Some(e) => error!(
                server = %outcome.server(),
                environment = %outcome.cache(),
                error = %e,
                "fail to invalidate environment cache"
            ),
            None => info!(
                server = %outcome.server(),
                environment = %outcome.cache(),
                "environment cache invalidated"
            ),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn init_tracing(logging: Logging) -> anyhow::Result<()> {
    let default_level = if logging.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    // RUST_LOG wins over the default level.
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    // Syslog replaces stdout entirely.
    let layer: BoxedLayer = if logging.syslog {
        syslog_layer(logging.json)?
    } else if logging.json {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .json()
            .boxed()
    } else {
        fmt::layer().with_target(logging.debug).boxed()
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()?;

    Ok(())
}

#[cfg(unix)]
fn syslog_layer(json: bool) -> anyhow::Result<BoxedLayer> {
    let identity = std::ffi::CString::new(puppet_cache_invalidate::settings::APP_NAME)?;
    let (options, facility) = Default::default();
    let writer = syslog_tracing::Syslog::new(identity, options, facility)
        .context("syslog connection already open")?;

    // The daemon stamps time, host and severity itself.
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false);

    Ok(if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    })
}

#[cfg(not(unix))]
fn syslog_layer(_json: bool) -> anyhow::Result<BoxedLayer> {
    anyhow::bail!("syslog logging is only supported on Unix")
}
