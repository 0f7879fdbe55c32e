//! DLMS/COSEM meter reading session
//!
//! This crate drives a meter through a [`Session`]: connection setup with the
//! optional IEC 62056-21 sign-on, request/reply exchanges with receive
//! retries, block reassembly and the bulk readout of an association.
//!
//! APDU encoding stays outside; it is supplied through the
//! [`ProtocolClient`] trait. Bytes travel over any [`dlms_transport::Media`].
//!
//! ```rust,ignore
//! let settings = ReaderSettings::from_args(ReaderArgs::parse())?;
//! let client = MyClient::new(&settings.client);
//! let mut session = SessionBuilder::new()
//!     .config(settings.session_config())
//!     .build(client, settings.media());
//! session.read_all().await?;
//! ```

pub mod config;
pub mod objects;
pub mod protocol;
pub mod reply;
pub mod session;
pub mod settings;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{SessionBuilder, SessionConfig};
pub use objects::{CaptureColumn, CosemObject, ObjectCatalog, ObjectType, ReadTarget};
pub use protocol::{Authentication, Conformance, InterfaceType, ProtocolClient, Request, Security};
pub use reply::ReplyData;
pub use session::{Rows, Session};
pub use settings::{ClientSettings, MediaSettings, ReaderArgs, ReaderSettings, Referencing};
pub use trace::{LogSink, TraceLevel, TraceSink, Tracer};
