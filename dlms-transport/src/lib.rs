//! Media layer for the DLMS/COSEM meter reader
//!
//! A media is a bidirectional byte transport with open/close, send, and a
//! parameterised receive (terminator byte or byte count, timeout). Two kinds
//! matter to framing: network streams and serial lines.

pub mod media;
pub mod tcp;
pub mod serial;
pub mod any;

pub use dlms_core::{DlmsError, DlmsResult};
pub use media::{LineSettings, Media, MediaHandle, MediaKind, ReceiveParameters};
pub use tcp::{TcpMedia, TcpSettings, DEFAULT_TCP_PORT};
pub use serial::{SerialMedia, SerialSettings};
pub use any::AnyMedia;
pub use tokio_serial::{DataBits, Parity, StopBits};
