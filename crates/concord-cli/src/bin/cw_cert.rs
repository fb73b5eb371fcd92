//! `cw-cert`: key/CSR generation, signing, fingerprinting, listing, and
//! revocation (spec §6, §4.5).

use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use concord_cert::{fingerprint, Certificate, Crl, Csr, KeyPair, Subject, TrustDb};
use concord_cli::{ExitKind, LogLevel};
use tracing::info;

#[derive(Clone, Debug, Parser)]
#[command(name = "cw-cert", version)]
struct Args {
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warning")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Generate an RSA keypair and write it PEM-encoded to `out`.
    GenKey {
        #[arg(long, default_value_t = 2048)]
        bits: usize,
        out: Utf8PathBuf,
    },
    /// Generate and self-sign a CA certificate from a keypair.
    SelfSign {
        key: Utf8PathBuf,
        #[arg(long)]
        fqdn: String,
        #[arg(long)]
        org: String,
        #[arg(long, default_value_t = 3650)]
        days: u32,
        out: Utf8PathBuf,
    },
    /// Sign a CSR against a CA certificate and key.
    Sign {
        ca_cert: Utf8PathBuf,
        ca_key: Utf8PathBuf,
        #[arg(long)]
        fqdn: String,
        #[arg(long)]
        org: String,
        #[arg(long, default_value_t = 365)]
        days: u32,
        out: Utf8PathBuf,
    },
    /// Print a certificate's SHA-1 fingerprint.
    Fingerprint { cert: Utf8PathBuf },
    /// List the public keys held in a trust database.
    List { trust_db: Utf8PathBuf },
    /// Revoke a certificate, recording it in a CRL.
    Revoke {
        crl: Utf8PathBuf,
        cert: Utf8PathBuf,
        ca_key: Utf8PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .init();

    match run(args.command) {
        Ok(kind) => kind.into(),
        Err(kind) => kind.into(),
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

fn run(command: Command) -> Result<ExitKind, ExitKind> {
    match command {
        Command::GenKey { bits, out } => {
            let key = KeyPair::generate(bits).map_err(fatal)?;
            let pem = key.to_private_pem().map_err(fatal)?;
            std::fs::write(&out, pem).map_err(fatal)?;
            info!("wrote {bits}-bit RSA key to {out}");
            Ok(ExitKind::Ok)
        }
        Command::SelfSign { key, fqdn, org, days, out } => {
            let pem = std::fs::read_to_string(&key).map_err(fatal)?;
            let key = KeyPair::from_private_pem(&pem).map_err(fatal)?;
            let subject = Subject {
                country: "US".to_string(),
                state: String::new(),
                locality: String::new(),
                org,
                org_unit: String::new(),
                cert_type: "ca".to_string(),
                fqdn,
            };
            let csr = Csr::new(&key, subject);
            let cert = concord_cert::sign_csr(&csr, None, &key, days, now()).map_err(fatal)?;
            std::fs::write(&out, cert.encode()).map_err(fatal)?;
            info!("wrote self-signed certificate to {out}");
            Ok(ExitKind::Ok)
        }
        Command::Sign { ca_cert, ca_key, fqdn, org, days, out } => {
            let ca_cert_bytes = std::fs::read_to_string(&ca_cert).map_err(fatal)?;
            let ca_cert = Certificate::decode(&ca_cert_bytes).map_err(fatal)?;
            let ca_pem = std::fs::read_to_string(&ca_key).map_err(fatal)?;
            let ca_key = KeyPair::from_private_pem(&ca_pem).map_err(fatal)?;

            let leaf_key = KeyPair::generate(2048).map_err(fatal)?;
            let subject = Subject {
                country: "US".to_string(),
                state: String::new(),
                locality: String::new(),
                org,
                org_unit: String::new(),
                cert_type: "agent".to_string(),
                fqdn,
            };
            let csr = Csr::new(&leaf_key, subject);
            let cert = concord_cert::sign_csr(&csr, Some((&ca_cert, &ca_key)), &ca_key, days, now()).map_err(fatal)?;
            std::fs::write(&out, cert.encode()).map_err(fatal)?;
            info!("wrote signed certificate to {out}");
            Ok(ExitKind::Ok)
        }
        Command::Fingerprint { cert } => {
            let bytes = std::fs::read_to_string(&cert).map_err(fatal)?;
            let cert = Certificate::decode(&bytes).map_err(fatal)?;
            println!("{}", fingerprint(&cert));
            Ok(ExitKind::Ok)
        }
        Command::List { trust_db } => {
            let bytes = std::fs::read_to_string(&trust_db).map_err(fatal)?;
            let db = TrustDb::decode(&bytes).map_err(fatal)?;
            for key in db.keys() {
                println!("{key}");
            }
            Ok(ExitKind::Ok)
        }
        Command::Revoke { crl, cert, ca_key } => {
            let crl_bytes = std::fs::read_to_string(&crl).map_err(fatal)?;
            let mut crl_doc = Crl::decode(&crl_bytes).map_err(fatal)?;
            let cert_bytes = std::fs::read_to_string(&cert).map_err(fatal)?;
            let cert_doc = Certificate::decode(&cert_bytes).map_err(fatal)?;
            let ca_pem = std::fs::read_to_string(&ca_key).map_err(fatal)?;
            let ca_key = KeyPair::from_private_pem(&ca_pem).map_err(fatal)?;

            crl_doc.revoke(&cert_doc, &ca_key, now()).map_err(fatal)?;
            std::fs::write(&crl, crl_doc.encode()).map_err(fatal)?;
            info!("revoked {}", fingerprint(&cert_doc));
            Ok(ExitKind::Ok)
        }
    }
}

fn fatal(e: impl std::fmt::Display) -> ExitKind {
    tracing::error!("{e}");
    ExitKind::ConfigError
}
