//! Serial port media implementation

use crate::media::{receive_buffered, LineSettings, Media, MediaKind, ReceiveParameters};
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use std::fmt;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialStream;

/// Serial port media settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub line: LineSettings,
    pub flow_control: tokio_serial::FlowControl,
}

impl SerialSettings {
    /// Settings for `port_name` at 9600 8N1
    pub fn new(port_name: impl Into<String>) -> Self {
        Self::with_line(port_name, LineSettings::default())
    }

    /// Settings for `port_name` with an explicit line configuration
    pub fn with_line(port_name: impl Into<String>, line: LineSettings) -> Self {
        Self {
            port_name: port_name.into(),
            line,
            flow_control: tokio_serial::FlowControl::None,
        }
    }
}

/// Serial port media
pub struct SerialMedia {
    stream: Option<SerialStream>,
    settings: SerialSettings,
    pending: BytesMut,
}

impl fmt::Debug for SerialMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialMedia")
            .field("settings", &self.settings)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl SerialMedia {
    /// Closed serial media; `open` opens the port
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            stream: None,
            settings,
            pending: BytesMut::new(),
        }
    }

    /// Port name and current line settings
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Names of the serial ports present on this machine
    pub fn port_names() -> Vec<String> {
        tokio_serial::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }

    fn not_connected() -> DlmsError {
        DlmsError::Connection(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "Serial stream not connected",
        ))
    }
}

#[async_trait]
impl Media for SerialMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Serial
    }

    async fn open(&mut self) -> DlmsResult<()> {
        if self.stream.is_some() {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let line = self.settings.line;
        let builder = tokio_serial::new(&self.settings.port_name, line.baud_rate)
            .data_bits(line.data_bits)
            .stop_bits(line.stop_bits)
            .parity(line.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open serial port {}: {}", self.settings.port_name, e),
            ))
        })?;

        log::debug!(
            "Opened {} at {} baud",
            self.settings.port_name,
            line.baud_rate
        );
        self.pending.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush().await;
        }
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        let stream = self.stream.as_mut().ok_or_else(Self::not_connected)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, params: &mut ReceiveParameters) -> DlmsResult<bool> {
        let stream = self.stream.as_mut().ok_or_else(Self::not_connected)?;
        let result = receive_buffered(stream, &mut self.pending, params).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    fn configure_line(&mut self, line: LineSettings) -> DlmsResult<()> {
        self.settings.line = line;
        Ok(())
    }
}
