//! Logging (SPEC_FULL §0: `tracing`/`tracing-subscriber`, simplified to
//! stdout/stderr/file targets — syslog forwarding is out of scope here).

use std::fmt;
use std::fs::OpenOptions;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

pub struct Logger {
    filter: Handle<EnvFilter, Registry>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    /// Launch the process-wide logger. Panics if a global `tracing`
    /// subscriber has already been installed (spec §5: the logger is one of
    /// the few pieces of process-wide mutable state).
    pub fn launch(level: LevelFilter, target: &str, file_path: Option<&str>) -> Result<&'static Logger, String> {
        let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
        let (filter, handle) = reload::Layer::new(env_filter);

        let fmt_layer: Box<dyn Layer<Layered<reload::Layer<EnvFilter, Registry>, Registry>> + Send + Sync> = match target {
            "stderr" => Box::new(FmtLayer::default().with_writer(std::io::stderr)),
            "stdout" => Box::new(FmtLayer::default().with_writer(std::io::stdout)),
            "file" => {
                let path = file_path.ok_or("log_target 'file' requires a path")?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("could not open log file '{path}': {e}"))?;
                Box::new(FmtLayer::default().with_writer(std::sync::Mutex::new(file)))
            }
            other => return Err(format!("unknown log_target '{other}'")),
        };

        Registry::default()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| e.to_string())?;

        let logger = Box::leak(Box::new(Logger { filter: handle }));
        Ok(logger)
    }

    pub fn update_level(&self, level: LevelFilter) -> Result<(), String> {
        self.filter
            .modify(|f| *f = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy())
            .map_err(|e| e.to_string())
    }

    /// A `Logger` with a live reload handle but no installed global
    /// subscriber, for tests that need a `&'static Logger` without racing
    /// other tests over the one-per-process `tracing` dispatcher.
    #[cfg(test)]
    pub fn test_instance() -> Self {
        let (_filter, handle) = reload::Layer::new(EnvFilter::new("info"));
        Logger { filter: handle }
    }
}

pub fn parse_level(s: &str) -> LevelFilter {
    match s {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warning" | "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}
