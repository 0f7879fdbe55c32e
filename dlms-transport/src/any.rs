use crate::media::{LineSettings, Media, MediaKind, ReceiveParameters};
use crate::serial::SerialMedia;
use crate::tcp::TcpMedia;
use async_trait::async_trait;
use dlms_core::DlmsResult;

/// Media chosen at run time from the reader settings
#[derive(Debug)]
pub enum AnyMedia {
    Tcp(TcpMedia),
    Serial(SerialMedia),
}

#[async_trait]
impl Media for AnyMedia {
    fn kind(&self) -> MediaKind {
        match self {
            AnyMedia::Tcp(m) => m.kind(),
            AnyMedia::Serial(m) => m.kind(),
        }
    }

    async fn open(&mut self) -> DlmsResult<()> {
        match self {
            AnyMedia::Tcp(m) => m.open().await,
            AnyMedia::Serial(m) => m.open().await,
        }
    }

    async fn close(&mut self) -> DlmsResult<()> {
        match self {
            AnyMedia::Tcp(m) => m.close().await,
            AnyMedia::Serial(m) => m.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            AnyMedia::Tcp(m) => m.is_open(),
            AnyMedia::Serial(m) => m.is_open(),
        }
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        match self {
            AnyMedia::Tcp(m) => m.send(data).await,
            AnyMedia::Serial(m) => m.send(data).await,
        }
    }

    async fn receive(&mut self, params: &mut ReceiveParameters) -> DlmsResult<bool> {
        match self {
            AnyMedia::Tcp(m) => m.receive(params).await,
            AnyMedia::Serial(m) => m.receive(params).await,
        }
    }

    fn configure_line(&mut self, line: LineSettings) -> DlmsResult<()> {
        match self {
            AnyMedia::Tcp(m) => m.configure_line(line),
            AnyMedia::Serial(m) => m.configure_line(line),
        }
    }
}

impl From<TcpMedia> for AnyMedia {
    fn from(media: TcpMedia) -> Self {
        AnyMedia::Tcp(media)
    }
}

impl From<SerialMedia> for AnyMedia {
    fn from(media: SerialMedia) -> Self {
        AnyMedia::Serial(media)
    }
}
