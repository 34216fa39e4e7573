//! # Logging
//!
//! One call to [`init_logging`] installs the global `tracing` subscriber:
//! a formatter on stdout, an [`EnvFilter`] built from the configured level,
//! and, when the host supplies one, a [`LoggerSink`] that receives every
//! event that passes the filter.
//!
//! ```ignore
//! use bridge_traits::log::LogLevel;
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug),
//! )?;
//! tracing::info!(track_id = 7, "Playback requested");
//! ```
//!
//! Fields whose name looks like a credential (`auth_token`,
//! `authorization`, ...) reach the sink as `[REDACTED]`.

use crate::error::{Error, Result};

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime::Handle;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Environment variable holding a full filter directive string.
pub const LOG_FILTER_ENV: &str = "DEVICE_LOG";
/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "DEVICE_LOG_FORMAT";

const REDACTED: &str = "[REDACTED]";

const OWN_TARGETS: &[&str] = &[
    "device_audio_workspace",
    "core_runtime",
    "core_playback",
    "core_control",
    "core_service",
    "bridge_desktop",
];

/// Dependencies that are noisy below `warn`.
const CHATTY_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "sqlx"];

const CREDENTIAL_MARKERS: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Default in debug builds.
    Pretty,
    /// One JSON object per event.
    Json,
    /// One line per event. Default in release builds, suits serial consoles.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config(format!("unknown log format `{}`", other))),
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates when no `filter` is given.
    pub level: LogLevel,
    /// Full directive string; replaces the generated one.
    pub filter: Option<String>,
    pub sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close (pretty format only).
    pub span_events: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            sink: None,
            span_events: false,
            show_target: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("sink", &self.sink.is_some())
            .field("span_events", &self.span_events)
            .field("show_target", &self.show_target)
            .field("show_threads", &self.show_threads)
            .finish()
    }
}

impl LoggingConfig {
    /// Defaults overridden by [`LOG_FILTER_ENV`] and [`LOG_FORMAT_ENV`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            if !filter.trim().is_empty() {
                config.filter = Some(filter);
            }
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn with_threads(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }

    /// The directive string the filter is built from.
    pub fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str();
        OWN_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .chain(CHATTY_TARGETS.iter().map(|target| format!("{}=warn", target)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(formatter(&config))
        .with(SinkForwarder {
            sink: config.sink.clone(),
        })
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))
}

fn formatter(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads);

    match config.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => {
            let spans = if config.span_events {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            };
            layer.pretty().with_span_events(spans).boxed()
        }
    }
}

fn log_level_of(level: &Level) -> LogLevel {
    if *level == Level::ERROR {
        LogLevel::Error
    } else if *level == Level::WARN {
        LogLevel::Warn
    } else if *level == Level::INFO {
        LogLevel::Info
    } else if *level == Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

/// Mirrors events into the host sink.
struct SinkForwarder {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let meta = event.metadata();
        let level = log_level_of(meta.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.take().unwrap_or_else(|| meta.name().to_owned());
        let mut entry = LogEntry::new(level, meta.target(), message);
        entry.fields = fields.values;
        if let Some(span) = ctx.lookup_current() {
            entry.fields.insert("span".to_owned(), span.name().to_owned());
        }

        let sink = Arc::clone(sink);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("log sink rejected entry: {}", e);
                    }
                });
            }
            Err(_) => {
                // No runtime on this thread: deliver inline.
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("log sink rejected entry: {}", e);
                }
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, rendered: String) {
        match field.name() {
            "message" => self.message = Some(rendered),
            name => {
                let value = redact_if_sensitive(name, &rendered);
                self.values.insert(name.to_owned(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

/// `value`, or `[REDACTED]` when `field` names a credential.
///
/// ```ignore
/// tracing::debug!(token = %redact_if_sensitive("token", &token), "Credential loaded");
/// ```
pub fn redact_if_sensitive(field: &str, value: &str) -> String {
    let lowered = field.to_ascii_lowercase();
    if CREDENTIAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        REDACTED.to_owned()
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for CapturingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn capture<F: FnOnce()>(emit: F) -> Vec<LogEntry> {
        let sink = Arc::new(CapturingSink::default());
        let shared: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(SinkForwarder { sink: Some(shared) });
        tracing::subscriber::with_default(subscriber, emit);
        let entries = sink.entries.lock().clone();
        entries
    }

    #[test]
    fn test_generated_directives() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();
        assert!(directives.contains("core_playback=debug"));
        assert!(directives.contains("core_control=debug"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_custom_filter_wins() {
        let directives = LoggingConfig::default()
            .with_filter("core_control=trace")
            .directives();
        assert_eq!(directives, "core_control=trace");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("syslog".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_forwarded_event_is_redacted() {
        let entries = capture(|| {
            tracing::warn!(
                target: "core_playback",
                attempt = 2,
                auth_token = "xyz",
                "Retrying stream"
            );
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.target, "core_playback");
        assert_eq!(entry.message, "Retrying stream");
        assert_eq!(entry.fields["attempt"], "2");
        assert_eq!(entry.fields["auth_token"], REDACTED);
    }

    #[test]
    fn test_events_below_sink_level_are_dropped() {
        let entries = capture(|| {
            tracing::trace!("Block written");
            tracing::debug!("Status pushed");
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Status pushed");
    }
}
