use std::io;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use kspy_core::style::Paint;
use kspy_diff::tracker::{ChangeTracker, Mode, RecordTracker, RecordWriter};
use kspy_kubehub::{KubeSource, Multiplexer, Selector, WatchTarget};
use kspy_status::{Palette, Rule, TerminalSink, TraceSession};
use tokio::signal;
use tracing::{info, warn};

mod config;

#[derive(Parser, Debug)]
#[command(name = "kspy", version, about = "Spy on your Kubernetes resources")]
struct Cli {
    /// Extra Deployment owner kinds, `group/version/Kind` or `version/Kind` (comma-separated)
    #[arg(long = "deployment-owner", env = "KSPY_DEPLOYMENT_OWNERS", value_delimiter = ',', global = true)]
    deployment_owners: Vec<String>,

    /// Disable colored output
    #[arg(long = "no-color", env = "NO_COLOR", action = ArgAction::SetTrue, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the full object when it appears, then a diff on every change
    Changes {
        /// e.g. "v1" or "apps/v1"
        api_version: String,
        kind: String,
        /// [<namespace>/]<name>
        object: String,
    },
    /// Like `changes`, restricted to the object's `.status`
    Status {
        api_version: String,
        kind: String,
        object: String,
    },
    /// Write every distinct version of the object as a JSON array
    Record {
        api_version: String,
        kind: String,
        object: String,
    },
    /// Trace a complex object and summarize what it is waiting on
    Trace {
        /// service (svc) or deployment (deploy)
        #[arg(value_name = "TYPE")]
        kind: String,
        object: String,
    },
}

fn init_tracing() {
    let env = std::env::var("KSPY_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KSPY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KSPY_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let palette = Palette::detect(cli.no_color);

    match cli.command {
        Commands::Changes { api_version, kind, object } => {
            follow(&api_version, &kind, &object, Mode::Full, &palette).await?;
        }
        Commands::Status { api_version, kind, object } => {
            follow(&api_version, &kind, &object, Mode::StatusOnly, &palette).await?;
        }
        Commands::Record { api_version, kind, object } => {
            record(&api_version, &kind, &object).await?;
        }
        Commands::Trace { kind, object } => {
            let rule: Rule = kind.parse()?;
            let owner_kinds = config::owner_kinds(&cli.deployment_owners)?;
            let (namespace, name) = config::resolve_object(&object).await?;
            info!(rule = %rule, ns = %namespace, name = %name, "trace invoked");

            let source = KubeSource::try_default().await?;
            let mut session = TraceSession::new(rule, namespace, name);
            let mut mux = Multiplexer::open(&source, session.targets(&owner_kinds)).await?;
            let mut sink = TerminalSink::stdout(palette);
            tokio::select! {
                res = session.run(&mut mux, &mut sink) => res?,
                _ = signal::ctrl_c() => info!("Ctrl-C received; stopping trace"),
            }
        }
    }
    Ok(())
}

/// Watch one named object and hand it to the caller's loop.
async fn open_object(api_version: &str, kind: &str, object: &str) -> Result<Multiplexer<String>> {
    let (namespace, name) = config::resolve_object(object).await?;
    info!(api_version = %api_version, kind = %kind, ns = %namespace, name = %name, "watching object");
    let source = KubeSource::try_default().await?;
    let target = WatchTarget::new(api_version, kind, Selector::by_name(namespace, name));
    Multiplexer::open(&source, vec![(kind.to_string(), target)]).await
}

async fn follow(api_version: &str, kind: &str, object: &str, mode: Mode, paint: &dyn Paint) -> Result<()> {
    let mut mux = open_object(api_version, kind, object).await?;
    let mut tracker = ChangeTracker::new(mode);
    println!("{}", mode.banner(paint, api_version, kind, object));
    loop {
        tokio::select! {
            next = mux.next() => match next {
                Some((_, ev)) => {
                    for line in tracker.observe(&ev).lines(paint) {
                        println!("{line}");
                    }
                }
                None => {
                    warn!("watch ended");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; stopping");
                break;
            }
        }
    }
    Ok(())
}

async fn record(api_version: &str, kind: &str, object: &str) -> Result<()> {
    let mut mux = open_object(api_version, kind, object).await?;
    let mut tracker = RecordTracker::new();
    let mut writer = RecordWriter::begin(io::stdout()).context("writing record header")?;
    loop {
        tokio::select! {
            next = mux.next() => match next {
                Some((_, ev)) => {
                    if let Some(obj) = tracker.observe(&ev) {
                        writer.push(&obj).context("writing recorded object")?;
                    }
                }
                None => {
                    warn!("watch ended");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; closing record");
                break;
            }
        }
    }
    info!(objects = writer.written(), "record finished");
    writer.finish().context("closing record")?;
    Ok(())
}
