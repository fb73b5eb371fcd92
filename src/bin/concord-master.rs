//! `concord-master`: the policy-serving master daemon (spec §5, §6).

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use concordd::center::Center;
use concordd::config::DaemonConfig;
use concordd::log::{parse_level, Logger};

#[derive(Clone, Debug, Parser)]
#[command(name = "concord-master", version)]
struct Args {
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    #[arg(short = 'i', long = "identity", value_name = "USER:GROUP")]
    identity: Option<String>,

    #[arg(long = "pid-file", value_name = "PATH")]
    pid_file: Option<Utf8PathBuf>,

    #[arg(short = 'd', long = "daemonize")]
    daemonize: bool,

    /// JSON-encoded manifests to load at startup, one per policy.
    #[arg(long = "manifest", value_name = "PATH")]
    manifests: Vec<Utf8PathBuf>,

    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    #[arg(long = "log-target", value_name = "TARGET", default_value = "stderr")]
    log_target: String,

    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match DaemonConfig::init(args.config.as_ref().map(|p| p.as_std_path()), foldhash::HashMap::default()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    if let Some(spec) = &args.identity {
        match spec.split_once(':') {
            Some((user, group)) => config.identity = Some((user.to_string(), group.to_string())),
            None => {
                eprintln!("--identity must be USER:GROUP");
                return ExitCode::from(2);
            }
        }
    }
    config.pid_file = args.pid_file;
    config.daemonize = args.daemonize;

    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.inner.log_level));
    let logger = match Logger::launch(level, &args.log_target, args.log_file.as_deref()) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("could not start logging: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = concordd::daemon::daemonize(&config) {
        tracing::error!("{e}");
        return ExitCode::from(2);
    }

    let center = std::sync::Arc::new(Center::new(config, logger));

    for path in &args.manifests {
        match concordd::manager::load_manifest(path.as_str()) {
            Ok(mut manifest) => {
                let mut state = center.state.lock().unwrap();
                state.manifest.policies.append(&mut manifest.policies);
                state.manifest.hosts.append(&mut manifest.hosts);
            }
            Err(e) => {
                tracing::error!("could not load manifest '{path}': {e}");
                return ExitCode::from(2);
            }
        }
    }

    tokio::spawn({
        let center = center.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received shutdown signal");
                center.request_shutdown();
            }
        }
    });

    match concordd::manager::run_master(center).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(3)
        }
    }
}
