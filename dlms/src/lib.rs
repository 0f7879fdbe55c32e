//! DLMS/COSEM meter reader
//!
//! Reads structured data from a remote meter over TCP or a serial line.
//!
//! # Architecture
//!
//! - `dlms-core`: error type, OBIS codes, decoded values
//! - `dlms-transport`: media layer (TCP, Serial)
//! - `dlms-client`: session engine, protocol client contract, reader settings
//!
//! # Usage
//!
//! ```rust,ignore
//! use dlms::client::{ReaderArgs, ReaderSettings, SessionBuilder};
//!
//! let settings = ReaderSettings::from_args(ReaderArgs::parse())?;
//! let mut session = SessionBuilder::new()
//!     .config(settings.session_config())
//!     .build(my_protocol_client, settings.media());
//! session.read_all().await?;
//! ```

// Re-export core types
pub use dlms_core::{DataObject, DataType, DlmsError, DlmsResult, ObisCode};

// Re-export the media layer
pub mod transport {
    pub use dlms_transport::*;
}

// Re-export client API
pub mod client {
    pub use dlms_client::*;
}

pub use dlms_client::{ProtocolClient, Session, SessionBuilder, SessionConfig};
