//! Verbosity-gated trace output of a session

use dlms_core::{DlmsError, DlmsResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Target of packet and progress traces
pub const TRACE_TARGET: &str = "dlms::trace";
/// Target of diagnostic error dumps
pub const DIAGNOSTIC_TARGET: &str = "dlms::diagnostic";

/// Trace verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TraceLevel {
    Off,
    Error,
    Warning,
    #[default]
    Info,
    Verbose,
}

impl FromStr for TraceLevel {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(TraceLevel::Off),
            "error" => Ok(TraceLevel::Error),
            "warning" => Ok(TraceLevel::Warning),
            "info" => Ok(TraceLevel::Info),
            "verbose" => Ok(TraceLevel::Verbose),
            other => Err(DlmsError::InvalidData(format!(
                "Invalid trace level option '{}'. (Off, Error, Warning, Info, Verbose)",
                other
            ))),
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceLevel::Off => "Off",
            TraceLevel::Error => "Error",
            TraceLevel::Warning => "Warning",
            TraceLevel::Info => "Info",
            TraceLevel::Verbose => "Verbose",
        };
        f.write_str(name)
    }
}

/// Destination of trace lines
pub trait TraceSink: Send + Sync {
    fn write(&self, level: TraceLevel, line: &str);

    /// Full dump of an unexpected failure
    fn diagnostic(&self, error: &DlmsError) {
        log::error!(target: DIAGNOSTIC_TARGET, "{:?}", error);
    }
}

/// Sink forwarding to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn write(&self, level: TraceLevel, line: &str) {
        match level {
            TraceLevel::Off => {}
            TraceLevel::Error => log::error!(target: TRACE_TARGET, "{}", line),
            TraceLevel::Warning => log::warn!(target: TRACE_TARGET, "{}", line),
            TraceLevel::Info => log::info!(target: TRACE_TARGET, "{}", line),
            TraceLevel::Verbose => log::debug!(target: TRACE_TARGET, "{}", line),
        }
    }
}

/// Sink plus the configured minimum level
#[derive(Clone)]
pub struct Tracer {
    level: TraceLevel,
    sink: Arc<dyn TraceSink>,
}

impl Tracer {
    /// Tracer writing to `sink` up to `level`
    pub fn new(level: TraceLevel, sink: Arc<dyn TraceSink>) -> Self {
        Self { level, sink }
    }

    /// Configured verbosity
    pub fn level(&self) -> TraceLevel {
        self.level
    }

    /// Whether lines at `level` reach the sink
    pub fn enabled(&self, level: TraceLevel) -> bool {
        level != TraceLevel::Off && self.level >= level
    }

    /// Write `line` when `level` is enabled
    ///
    /// # Arguments
    ///
    /// * `line` - Text of the trace line
    /// * `level` - Verbosity the line is written at
    pub fn write(&self, line: &str, level: TraceLevel) {
        if self.enabled(level) {
            self.sink.write(level, line);
        }
    }

    /// Hand `error` to the diagnostic sink unless tracing is off
    pub fn diagnostic(&self, error: &DlmsError) {
        if self.level != TraceLevel::Off {
            self.sink.diagnostic(error);
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TraceLevel::default(), Arc::new(LogSink))
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").field("level", &self.level).finish()
    }
}

/// Bytes as space separated upper-case hex
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wall clock time of a packet trace
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
