use std::io;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::core::config::AppPaths;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Used when `RUST_LOG` is unset or unparsable. Keeps the query logging of
/// sqlx and the HTML parser out of the info stream.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,html5ever=warn,selectors=warn";

/// Which binary is logging. Each gets its own file under the log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Server,
    Scrape,
    Generate,
}

impl LogTarget {
    pub fn file_name(self) -> &'static str {
        match self {
            LogTarget::Server => "server.log",
            LogTarget::Scrape => "scrape.log",
            LogTarget::Generate => "generate.log",
        }
    }

    /// `scrape` writes its JSON to stdout, so its console log goes to stderr.
    fn console_on_stderr(self) -> bool {
        matches!(self, LogTarget::Scrape)
    }
}

fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init(paths: &AppPaths, target: LogTarget) {
    let log_dir = &paths.log_dir;
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, target.file_name());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let rust_log = std::env::var("RUST_LOG").ok();

    let console_layer = if target.console_on_stderr() {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    let _ = tracing_subscriber::registry()
        .with(env_filter(rust_log.as_deref()))
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
