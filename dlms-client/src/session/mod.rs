//! Meter reading session
//!
//! A [`Session`] owns one protocol client and one media for the lifetime of a
//! run. Its operations are split over the submodules:
//!
//! - `exchange`: one request/reply round trip with receive retries
//! - `block`: multi-block and multi-request reassembly
//! - `connect`: IEC sign-on, link setup and association
//! - `reader`: single, batched and bulk reads

mod block;
mod connect;
mod exchange;
mod reader;

pub use connect::{baud_rate_for_digit, iec_acknowledgement, parse_identification, IEC_SIGN_ON};
pub use exchange::MAX_RECEIVE_ATTEMPTS;
pub use reader::Rows;

use crate::config::{SessionBuilder, SessionConfig};
use crate::objects::ObjectCatalog;
use crate::protocol::{InterfaceType, ProtocolClient, Security};
use crate::reply::ReplyData;
use crate::trace::{TraceLevel, Tracer};
use dlms_core::{DlmsError, DlmsResult};
use dlms_transport::{Media, MediaHandle};
use tokio_util::sync::CancellationToken;

/// A DLMS/COSEM client session over one media
pub struct Session<C, M> {
    client: C,
    media: MediaHandle<M>,
    config: SessionConfig,
    tracer: Tracer,
    objects: ObjectCatalog,
    reply_capacity: usize,
    /// Batched reads are allowed; cleared for the rest of the session on failure
    multiple_references: bool,
    cancel: CancellationToken,
}

impl<C, M> Session<C, M>
where
    C: ProtocolClient,
    M: Media,
{
    /// Session with the default log sink
    ///
    /// # Arguments
    ///
    /// * `client` - Protocol client that encodes and decodes packets
    /// * `media` - Transport to the meter, opened by `open`
    /// * `config` - Timing and trace settings
    pub fn new(client: C, media: M, config: SessionConfig) -> Self {
        SessionBuilder::new().config(config).build(client, media)
    }

    pub(crate) fn from_parts(
        client: C,
        media: M,
        config: SessionConfig,
        tracer: Tracer,
        cancel: CancellationToken,
    ) -> Self {
        if tracer.enabled(TraceLevel::Info) {
            tracer.write(
                &format!(
                    "Authentication: {}, ClientAddress: 0x{:X}, ServerAddress: 0x{:X}",
                    client.authentication(),
                    client.client_address(),
                    client.server_address()
                ),
                TraceLevel::Info,
            );
        }
        let reply_capacity = config.reply_capacity;
        Self {
            client,
            media: MediaHandle::new(media),
            config,
            tracer,
            objects: ObjectCatalog::new(),
            reply_capacity,
            multiple_references: false,
            cancel,
        }
    }

    /// Protocol client of the session
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable protocol client of the session
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Shared handle to the media
    pub fn media(&self) -> &MediaHandle<M> {
        &self.media
    }

    /// Settings the session was built with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Trace writer of the session
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Objects of the association, filled by `read_association_view`
    pub fn objects(&self) -> &ObjectCatalog {
        &self.objects
    }

    /// Mutable object catalog
    pub fn objects_mut(&mut self) -> &mut ObjectCatalog {
        &mut self.objects
    }

    /// Current receive buffer size; grows to the negotiated frame size on open
    pub fn reply_capacity(&self) -> usize {
        self.reply_capacity
    }

    /// Whether batched reads are still attempted
    pub fn supports_multiple_references(&self) -> bool {
        self.multiple_references
    }

    /// Token that interrupts this session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the cancellation token fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn check_cancelled(&self) -> DlmsResult<()> {
        if self.cancel.is_cancelled() {
            Err(DlmsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Release is only meaningful where the association outlives the link
    fn release_required(&self) -> bool {
        self.client.interface_type() == InterfaceType::Wrapper
            || self.client.security() != Security::None
    }

    async fn release(&mut self, reply: &mut ReplyData) -> DlmsResult<()> {
        let request = self.client.release_request()?;
        self.read_data_block(&request, reply).await
    }

    /// Release and disconnect, then close the media
    ///
    /// A failing release is ignored. Once the session was cancelled, or the
    /// media is no longer open, only the local media is closed.
    pub async fn close(&mut self) -> DlmsResult<()> {
        let media = self.media.clone();
        if !media.exclusive_access().await.is_open() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            log::debug!("Session cancelled, closing media without disconnect");
            return media.exclusive_access().await.close().await;
        }

        self.tracer.write("DisconnectRequest", TraceLevel::Info);
        let mut reply = ReplyData::new();
        if self.release_required() {
            if let Err(e) = self.release(&mut reply).await {
                log::debug!("Release failed: {}", e);
            }
        }
        reply.clear();
        let result = match self.client.disconnect_request() {
            Ok(request) => self.exchange_request(&request, &mut reply).await,
            Err(e) => Err(e),
        };
        let closed = media.exclusive_access().await.close().await;
        result.and(closed)
    }
}
