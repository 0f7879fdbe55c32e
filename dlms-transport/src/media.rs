//! Media contract shared by every transport

use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Kind of physical transport, which drives framing decisions upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Network stream (TCP); frames are length-prefixed by the protocol
    Network,
    /// Character/serial line; supports bit-rate reconfiguration
    Serial,
}

/// Per-attempt receive parameters
///
/// Constructed fresh for each logical receive; `reply` holds the bytes of a
/// successful receive until the caller takes them.
#[derive(Debug, Clone)]
pub struct ReceiveParameters {
    /// Terminator byte; `None` for length-prefixed framing
    pub eop: Option<u8>,
    /// Minimum number of bytes to wait for
    pub count: usize,
    pub wait_time: Duration,
    /// Return everything buffered instead of stopping at the terminator
    pub all_data: bool,
    pub reply: Option<Vec<u8>>,
}

impl ReceiveParameters {
    /// Receive parameters
    ///
    /// # Arguments
    ///
    /// * `eop` - Terminator byte, `None` for length based framing
    /// * `count` - Minimum number of bytes to wait for
    /// * `wait_time` - Time to wait before giving up
    pub fn new(eop: Option<u8>, count: usize, wait_time: Duration) -> Self {
        Self {
            eop,
            count,
            wait_time,
            all_data: false,
            reply: None,
        }
    }

    /// Number of buffered bytes that form a complete reply, if any
    ///
    /// With a terminator the reply ends at the first terminator found at or
    /// after position `count - 1`; without one, exactly `count` bytes are taken.
    pub fn complete_len(&self, buffered: &[u8]) -> Option<usize> {
        let min = self.count.max(1);
        if buffered.len() < min {
            return None;
        }
        match self.eop {
            None => Some(min),
            Some(eop) => buffered[min - 1..]
                .iter()
                .position(|&b| b == eop)
                .map(|pos| if self.all_data { buffered.len() } else { min + pos }),
        }
    }
}

/// Line parameters of a serial media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
}

impl LineSettings {
    /// 8 data bits, no parity, one stop bit
    pub fn eight_n_one(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            parity: tokio_serial::Parity::None,
            stop_bits: tokio_serial::StopBits::One,
        }
    }

    /// 300 baud 7E1, the line state an IEC 62056-21 sign-on starts from
    pub fn iec_sign_on() -> Self {
        Self {
            baud_rate: 300,
            data_bits: tokio_serial::DataBits::Seven,
            parity: tokio_serial::Parity::Even,
            stop_bits: tokio_serial::StopBits::One,
        }
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::eight_n_one(9600)
    }
}

/// Byte transport to a remote meter
#[async_trait]
pub trait Media: Send {
    fn kind(&self) -> MediaKind;

    /// Open the transport at its currently configured parameters
    async fn open(&mut self) -> DlmsResult<()>;

    async fn close(&mut self) -> DlmsResult<()>;

    fn is_open(&self) -> bool;

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()>;

    /// Wait for a reply described by `params`
    ///
    /// Returns `Ok(false)` when nothing complete arrived within
    /// `params.wait_time`. On `Ok(true)` the bytes are in `params.reply`.
    async fn receive(&mut self, params: &mut ReceiveParameters) -> DlmsResult<bool>;

    /// Change line parameters; applied on the next `open`
    fn configure_line(&mut self, _line: LineSettings) -> DlmsResult<()> {
        Err(DlmsError::Unsupported(
            "media does not support line configuration".to_string(),
        ))
    }
}

/// Shared handle giving exclusive access to a media
///
/// An exchange holds the guard from its first send to its last receive so no
/// other user of the same handle can interleave traffic.
#[derive(Debug)]
pub struct MediaHandle<M> {
    inner: Arc<Mutex<M>>,
}

impl<M> MediaHandle<M> {
    /// Share `media` between exchanges
    pub fn new(media: M) -> Self {
        Self {
            inner: Arc::new(Mutex::new(media)),
        }
    }

    /// Lock the media for one exchange
    pub async fn exclusive_access(&self) -> MutexGuard<'_, M> {
        self.inner.lock().await
    }
}

impl<M> Clone for MediaHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Fill `pending` from `reader` until `params` is satisfied or the wait expires
pub(crate) async fn receive_buffered<R>(
    reader: &mut R,
    pending: &mut BytesMut,
    params: &mut ReceiveParameters,
) -> DlmsResult<bool>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let deadline = Instant::now() + params.wait_time;
    loop {
        if let Some(len) = params.complete_len(pending) {
            params.reply = Some(pending.split_to(len).to_vec());
            return Ok(true);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }

        match tokio::time::timeout(remaining, reader.read_buf(pending)).await {
            Err(_) => return Ok(false),
            Ok(Ok(0)) => {
                return Err(DlmsError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Connection closed by the remote",
                )));
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(DlmsError::Connection(e)),
        }
    }
}
