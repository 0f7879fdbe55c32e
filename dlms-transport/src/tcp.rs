//! TCP media implementation

use crate::media::{receive_buffered, Media, MediaKind, ReceiveParameters};
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Default DLMS/COSEM wrapper port
pub const DEFAULT_TCP_PORT: u16 = 4059;

/// TCP media settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    /// Bound on connection establishment; `None` waits for the OS
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Settings for `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// TCP media
#[derive(Debug)]
pub struct TcpMedia {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    pending: BytesMut,
}

impl TcpMedia {
    /// Unconnected TCP media; `open` connects
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            pending: BytesMut::new(),
        }
    }

    /// Remote address settings
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn not_connected() -> DlmsError {
        DlmsError::Connection(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "TCP stream not connected",
        ))
    }
}

#[async_trait]
impl Media for TcpMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Network
    }

    async fn open(&mut self) -> DlmsResult<()> {
        if self.stream.is_some() {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let address = (self.settings.host.as_str(), self.settings.port);
        let stream = match self.settings.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| {
                    DlmsError::TransportTimeout(format!(
                        "Failed to connect to {}:{} in given time",
                        self.settings.host, self.settings.port
                    ))
                })??,
            None => TcpStream::connect(address).await?,
        };
        stream.set_nodelay(true)?;

        log::debug!("Connected to {}:{}", self.settings.host, self.settings.port);
        self.pending.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
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
}
