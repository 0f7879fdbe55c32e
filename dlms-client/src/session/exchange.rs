//! One request/reply round trip

use super::Session;
use crate::protocol::{InterfaceType, ProtocolClient, Request};
use crate::reply::ReplyData;
use crate::trace::{timestamp, to_hex, TraceLevel};
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use dlms_transport::{Media, MediaKind, ReceiveParameters};

/// HDLC frame flag
const HDLC_FLAG: u8 = 0x7E;
/// Smallest HDLC frame worth waiting for
const HDLC_MIN_COUNT: usize = 5;
/// Length of the wrapper header carrying the payload length
const WRAPPER_HEADER_COUNT: usize = 8;
/// Consecutive empty receives before an exchange times out
pub const MAX_RECEIVE_ATTEMPTS: usize = 3;

/// Terminator byte used for `interface` over `kind`
fn frame_terminator(interface: InterfaceType, kind: MediaKind) -> Option<u8> {
    if interface == InterfaceType::Wrapper && kind == MediaKind::Network {
        None
    } else {
        Some(HDLC_FLAG)
    }
}

impl<C, M> Session<C, M>
where
    C: ProtocolClient,
    M: Media,
{
    /// Send `data` and receive until the client reports the reply complete
    ///
    /// Empty `data` is a no-op unless `reply` is streaming, in which case the
    /// next block is received without sending anything.
    pub async fn read_dlms_packet(&mut self, data: &[u8], reply: &mut ReplyData) -> DlmsResult<()> {
        if data.is_empty() && !reply.is_streaming() {
            return Ok(());
        }
        self.check_cancelled()?;

        let media = self.media.clone();
        let mut media = media.exclusive_access().await;
        let eop = frame_terminator(self.client.interface_type(), media.kind());
        let count = if eop.is_some() {
            HDLC_MIN_COUNT
        } else {
            WRAPPER_HEADER_COUNT
        };
        let mut params = ReceiveParameters::new(eop, count, self.config.wait_time);

        reply.error = 0;
        if !reply.is_streaming() {
            self.tracer.write(
                &format!("TX: {}\t{}", timestamp(), to_hex(data)),
                TraceLevel::Verbose,
            );
            media.send(data).await?;
        }

        let mut received = BytesMut::with_capacity(self.reply_capacity);
        let mut trace = Vec::new();
        let result = self
            .pump(&mut *media, data, &mut params, reply, &mut received, &mut trace)
            .await;

        let level = if result.is_ok() && reply.error == 0 {
            TraceLevel::Verbose
        } else {
            TraceLevel::Error
        };
        self.tracer
            .write(&format!("RX: {}\t{}", timestamp(), to_hex(&trace)), level);

        if reply.error != 0 {
            return Err(DlmsError::Protocol(reply.error));
        }
        result
    }

    /// Exchange every packet of `request` in order, clearing `reply` in between
    pub async fn exchange_request(&mut self, request: &Request, reply: &mut ReplyData) -> DlmsResult<()> {
        match request {
            Request::Single(data) => self.read_dlms_packet(data, reply).await,
            Request::Multiple(packets) => {
                for data in packets {
                    reply.clear();
                    self.read_dlms_packet(data, reply).await?;
                }
                Ok(())
            }
        }
    }

    async fn pump(
        &mut self,
        media: &mut M,
        data: &[u8],
        params: &mut ReceiveParameters,
        reply: &mut ReplyData,
        received: &mut BytesMut,
        trace: &mut Vec<u8>,
    ) -> DlmsResult<()> {
        let mut notify = ReplyData::new();
        loop {
            if self.client.get_data(received, reply, &mut notify)? {
                return Ok(());
            }

            if !notify.data.is_empty() {
                if !notify.is_more_data() {
                    self.tracer.write(
                        &format!("Notification: {}", to_hex(&notify.data)),
                        TraceLevel::Info,
                    );
                    notify.clear();
                    continue;
                }
            } else if params.eop.is_none() {
                params.count = self.client.frame_size(received);
            }

            let mut failures = 0;
            loop {
                let complete = tokio::select! {
                    result = media.receive(params) => result?,
                    _ = self.cancel.cancelled() => return Err(DlmsError::Cancelled),
                };
                if complete {
                    break;
                }
                failures += 1;
                if failures == MAX_RECEIVE_ATTEMPTS {
                    return Err(DlmsError::TransportTimeout(
                        "Failed to receive reply from the device in given time.".to_string(),
                    ));
                }
                if trace.is_empty() && !data.is_empty() {
                    self.tracer.write(
                        &format!("Data send failed. Try to resend {}/{}", failures, MAX_RECEIVE_ATTEMPTS),
                        TraceLevel::Info,
                    );
                    media.send(data).await?;
                }
            }

            if let Some(chunk) = params.reply.take() {
                trace.extend_from_slice(&chunk);
                received.extend_from_slice(&chunk);
            }
        }
    }
}
