//! `cw-run`: issue a one-shot command to agents matching a filter (spec §6).

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use concord_api::{JobReport, Pdu, PduType};
use concord_cli::{ExitKind, LogLevel, PduClient};
use tracing::{error, info, warn};

#[derive(Clone, Debug, Parser)]
#[command(name = "cw-run", version)]
struct Args {
    /// Username to authenticate the request as.
    #[arg(short = 'u', long = "user")]
    user: Option<String>,

    /// Password to authenticate the request with.
    #[arg(short = 'p', long = "pass")]
    pass: Option<String>,

    /// Public key (hex) to present instead of a password.
    #[arg(short = 'k', long = "pubkey")]
    pubkey: Option<String>,

    /// How long to wait for the job to finish, in seconds.
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", default_value_t = 60)]
    timeout_s: u64,

    /// Polling cadence while waiting for the job to finish, in milliseconds.
    #[arg(short = 's', long = "sleep", value_name = "MS", default_value_t = 500)]
    sleep_ms: u64,

    /// Only target agents whose identity matches this filter.
    #[arg(short = 'w', long = "filter", default_value = "*")]
    filter: String,

    /// Config file to load (defaults to $HOME/.concord/config).
    #[arg(short = 'c', long = "config")]
    config: Option<Utf8PathBuf>,

    /// Include agents that have opted out of ordinary runs.
    #[arg(long = "optouts")]
    optouts: bool,

    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warning")]
    log_level: LogLevel,

    /// Command and arguments to run.
    #[arg(required = true)]
    cmd: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .init();

    match run(args).await {
        Ok(kind) => kind.into(),
        Err(kind) => kind.into(),
    }
}

async fn run(args: Args) -> Result<ExitKind, ExitKind> {
    let config_path = args.config.as_ref().map(|p| p.as_std_path());
    let cfg = concord_cfg::Config::init(config_path, foldhash::HashMap::default()).map_err(|e| {
        error!("configuration error: {e}");
        ExitKind::ConfigError
    })?;

    let server_addr = if cfg.server.contains(':') {
        cfg.server.clone()
    } else {
        format!("{}:7773", cfg.server)
    };
    let server = server_addr.parse::<SocketAddr>().map_err(|e| {
        error!("invalid server address in config ('{server_addr}'): {e}");
        ExitKind::ConfigError
    })?;

    let user = args.user.unwrap_or_else(|| std::env::var("USER").unwrap_or_default());
    let cmd_line = args.cmd.join(" ");

    let payload = vec![
        user.into_bytes(),
        args.pass.unwrap_or_default().into_bytes(),
        args.pubkey.unwrap_or_default().into_bytes(),
        args.filter.into_bytes(),
        if args.optouts { b"1".to_vec() } else { b"0".to_vec() },
        cmd_line.into_bytes(),
    ];
    let request = Pdu::new(PduType::Request, payload);

    let mut client = PduClient::connect(server).await.map_err(|e| {
        error!("{e}");
        ExitKind::InvalidArgument
    })?;

    let deadline = Duration::from_secs(args.timeout_s);
    let mut reply = client
        .request(&request, deadline.as_millis() as u64)
        .await
        .map_err(|e| {
            error!("{e}");
            map_client_error(&e)
        })?;

    // A SUBMITTED reply means the job is still running; poll with CHECK
    // until RESULT, ERROR, or the overall timeout is exhausted.
    let started = tokio::time::Instant::now();
    while reply.pdu_type() == Some(PduType::Submitted) {
        if started.elapsed() >= deadline {
            return Err(ExitKind::Timeout);
        }
        tokio::time::sleep(Duration::from_millis(args.sleep_ms)).await;
        let job_id = reply.payload.first().cloned().unwrap_or_default();
        let check = Pdu::new(PduType::Check, vec![job_id]);
        reply = client
            .request(&check, args.sleep_ms.max(1000))
            .await
            .map_err(|e| map_client_error(&e))?;
    }

    match reply.pdu_type() {
        Some(PduType::Result) => {
            let Some(packed) = reply.payload.first() else {
                warn!("RESULT PDU carried no report payload");
                return Ok(ExitKind::Ok);
            };
            let text = String::from_utf8_lossy(packed);
            match JobReport::unpack(&text) {
                Ok(report) => {
                    print_report(&report);
                    Ok(ExitKind::Ok)
                }
                Err(e) => {
                    error!("could not parse job report: {e}");
                    Err(ExitKind::ProtocolError)
                }
            }
        }
        Some(PduType::Error) => {
            let message = reply
                .payload
                .get(1)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            error!("master returned an error: {message}");
            Err(ExitKind::ProtocolError)
        }
        other => {
            warn!("unexpected reply PDU type: {other:?}");
            Err(ExitKind::ProtocolError)
        }
    }
}

fn map_client_error(e: &concord_cli::client::ClientError) -> ExitKind {
    use concord_cli::client::ClientError;
    match e {
        ClientError::Unreachable(_) => ExitKind::InvalidArgument,
        ClientError::Timeout => ExitKind::Timeout,
        ClientError::Protocol(_) => ExitKind::ProtocolError,
    }
}

fn print_report(report: &JobReport) {
    info!("job finished in {} us", report.duration_usec());
    for resource in &report.resources {
        println!("{} {}", resource.type_tag, resource.key);
        for action in &resource.actions {
            println!("  [{}] {}", action.outcome.as_str(), action.description);
        }
    }
}
