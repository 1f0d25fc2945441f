//! # sift-telemetry
//!
//! Tracing setup for the sift binary: env-filtered stderr output (JSON or
//! human-readable), runtime per-module level changes, and an optional
//! in-memory capture of warn+ events so a run can report its own
//! degradations.

mod capture;

pub use capture::{DiagnosticLayer, DiagnosticRecord, DiagnosticSink};

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Errors from telemetry reconfiguration.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid filter directive: {0}")]
    InvalidDirective(String),

    #[error("failed to reload filter: {0}")]
    Reload(String),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "sift_llm" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Keep warn+ events in memory for the run report.
    pub capture_diagnostics: bool,
    /// Ring buffer size for captured events.
    pub diagnostics_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::WARN,
            module_levels: Vec::new(),
            json: false,
            capture_diagnostics: true,
            diagnostics_capacity: 256,
        }
    }
}

/// Handle returned by [`init_telemetry`]. Keep it alive for the process.
pub struct TelemetryGuard {
    diagnostics: Option<Arc<DiagnosticSink>>,
    base_level: Level,
    level_filter: Arc<RwLock<Vec<(String, Level)>>>,
    reload_handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl TelemetryGuard {
    /// Change the log level for a specific module at runtime.
    pub fn set_module_level(&self, module: &str, level: Level) -> Result<(), TelemetryError> {
        let directives = {
            let mut levels = self.level_filter.write();
            if let Some(entry) = levels.iter_mut().find(|(m, _)| m == module) {
                entry.1 = level;
            } else {
                levels.push((module.to_string(), level));
            }
            filter_directives(self.base_level, &levels)
        };

        let Some(handle) = &self.reload_handle else {
            return Ok(());
        };
        let filter = EnvFilter::try_new(&directives)
            .map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?;
        handle
            .reload(filter)
            .map_err(|e| TelemetryError::Reload(e.to_string()))
    }

    /// Get current per-module log level overrides.
    pub fn module_levels(&self) -> Vec<(String, Level)> {
        self.level_filter.read().clone()
    }

    /// Access captured warn+ events.
    pub fn diagnostics(&self) -> Option<&DiagnosticSink> {
        self.diagnostics.as_deref()
    }
}

/// Build an `EnvFilter` directive string from a base level and overrides.
pub fn filter_directives(base: Level, module_levels: &[(String, Level)]) -> String {
    let mut filter = base.to_string().to_lowercase();
    for (module, level) in module_levels {
        filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    filter
}

/// Parse a level name such as "info" or "WARN".
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Parse a `module=level` override such as `sift_llm=debug`.
pub fn parse_module_level(value: &str) -> Result<(String, Level), TelemetryError> {
    let invalid = || TelemetryError::InvalidDirective(value.to_string());
    let (module, level) = value.split_once('=').ok_or_else(invalid)?;
    let module = module.trim();
    if module.is_empty() {
        return Err(invalid());
    }
    let level = parse_level(level).ok_or_else(invalid)?;
    Ok((module.to_string(), level))
}

/// Run `f` under a temporary subscriber that keeps its warn+ events.
///
/// For work that happens before [`init_telemetry`], such as loading the
/// settings that configure it. Pass the records to [`replay`] afterwards.
pub fn capture_early<T>(f: impl FnOnce() -> T) -> (T, Vec<DiagnosticRecord>) {
    let sink = Arc::new(DiagnosticSink::new(EARLY_CAPACITY));
    let subscriber = tracing_subscriber::registry().with(DiagnosticLayer::new(Arc::clone(&sink)));
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, sink.records())
}

/// Re-emit records from [`capture_early`] through the current subscriber.
pub fn replay(records: &[DiagnosticRecord]) {
    for record in records {
        let fields = serde_json::Value::Object(record.fields.clone());
        if record.level == "ERROR" {
            tracing::error!(origin = %record.target, %fields, "{}", record.message);
        } else {
            tracing::warn!(origin = %record.target, %fields, "{}", record.message);
        }
    }
}

const EARLY_CAPACITY: usize = 64;

/// Initialize the telemetry subsystem. Call once at startup.
///
/// A second call leaves the existing global subscriber in place and returns a
/// guard without a reload handle.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let level_filter = Arc::new(RwLock::new(config.module_levels.clone()));

    let directives = filter_directives(config.log_level, &config.module_levels);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let plain_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let diagnostics = config
        .capture_diagnostics
        .then(|| Arc::new(DiagnosticSink::new(config.diagnostics_capacity)));
    let diagnostic_layer = diagnostics.clone().map(DiagnosticLayer::new);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(plain_layer)
        .with(diagnostic_layer)
        .try_init()
        .is_ok();

    if !installed {
        eprintln!("sift-telemetry: global subscriber already set; keeping it");
    }

    TelemetryGuard {
        diagnostics: if installed { diagnostics } else { None },
        base_level: config.log_level,
        level_filter,
        reload_handle: installed.then_some(reload_handle),
    }
}
