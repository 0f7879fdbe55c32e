//! Session configuration and builder
//!
//! ```rust,ignore
//! use dlms_client::{SessionBuilder, TraceLevel};
//!
//! let session = SessionBuilder::new()
//!     .wait_time(Duration::from_secs(5))
//!     .iec(true)
//!     .trace(TraceLevel::Verbose)
//!     .build(client, media);
//! ```

use crate::protocol::ProtocolClient;
use crate::session::Session;
use crate::trace::{LogSink, TraceLevel, TraceSink, Tracer};
use dlms_transport::Media;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing and tracing parameters of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait for each receive attempt
    pub wait_time: Duration,
    /// Start with the IEC 62056-21 mode E sign-on on serial media
    pub iec: bool,
    pub trace: TraceLevel,
    /// Initial size of the receive buffer, before the link limits are known
    pub reply_capacity: usize,
    /// Pause after the serial line was reopened at the negotiated speed
    pub settle_time: Duration,
    /// Wait for the optional reply to the IEC acknowledgement
    pub ack_wait_time: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_millis(5000),
            iec: false,
            trace: TraceLevel::Info,
            reply_capacity: 8 + 1024,
            settle_time: Duration::from_secs(1),
            ack_wait_time: Duration::from_millis(200),
        }
    }
}

/// Builder for [`Session`]
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    sink: Option<Arc<dyn TraceSink>>,
    cancel: Option<CancellationToken>,
}

impl SessionBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all settings
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Time to wait for each receive
    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.config.wait_time = wait_time;
        self
    }

    /// Start serial sessions with the IEC sign-on
    pub fn iec(mut self, iec: bool) -> Self {
        self.config.iec = iec;
        self
    }

    /// Trace verbosity
    pub fn trace(mut self, level: TraceLevel) -> Self {
        self.config.trace = level;
        self
    }

    /// Initial receive buffer size
    pub fn reply_capacity(mut self, capacity: usize) -> Self {
        self.config.reply_capacity = capacity;
        self
    }

    /// Pause after switching the serial line speed
    pub fn settle_time(mut self, settle_time: Duration) -> Self {
        self.config.settle_time = settle_time;
        self
    }

    /// Time to wait for the optional IEC acknowledgement
    pub fn ack_wait_time(mut self, ack_wait_time: Duration) -> Self {
        self.config.ack_wait_time = ack_wait_time;
        self
    }

    /// Trace destination; defaults to [`LogSink`]
    pub fn sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Token the caller cancels to interrupt the session
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the session
    ///
    /// # Arguments
    ///
    /// * `client` - Protocol client of the session
    /// * `media` - Transport to the meter
    ///
    /// # Returns
    ///
    /// A closed session; call `open` before reading
    pub fn build<C, M>(self, client: C, media: M) -> Session<C, M>
    where
        C: ProtocolClient,
        M: Media,
    {
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        let tracer = Tracer::new(self.config.trace, sink);
        Session::from_parts(
            client,
            media,
            self.config,
            tracer,
            self.cancel.unwrap_or_default(),
        )
    }
}
