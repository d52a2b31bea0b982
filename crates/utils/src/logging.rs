//! provides logging helpers

use std::path::Path;
use std::path::PathBuf;

use tracing::Subscriber;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Environment variable pointing at a log file; stderr is used when unset.
pub const LOG_PATH_ENV_VAR: &str = "WEBHOOK_LOG_PATH";

const MAX_LOG_FILES: usize = 7;

/// Build the formatting layer, writing to a daily rolling file when `log_path`
/// is given and to stderr otherwise.
pub fn get_fmt_layer<S>(log_path: Option<String>) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if let Some((dir, prefix)) = log_path.as_deref().and_then(split_log_path) {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&prefix)
            .max_log_files(MAX_LOG_FILES)
            .build(&dir)
        {
            Ok(appender) => {
                return layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed();
            }
            Err(e) => {
                eprintln!("failed to create log file in {}: {e}", dir.display());
            }
        }
    }

    layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .boxed()
}

/// Split a log file path into its directory and file name prefix.
fn split_log_path(log_path: &str) -> Option<(PathBuf, String)> {
    let path = Path::new(log_path);
    let prefix = path.file_name()?.to_str()?.to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, prefix))
}

/// initiate the global tracing subscriber
pub fn init(log_path: Option<String>) {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt_layer = get_fmt_layer(log_path).with_filter(env_filter);

    registry().with(fmt_layer).init();
}
