//! Block transfer: pull every block of a reply

use super::Session;
use crate::protocol::{ProtocolClient, Request};
use crate::reply::ReplyData;
use dlms_core::{DlmsError, DlmsResult};
use dlms_transport::Media;

impl<C, M> Session<C, M>
where
    C: ProtocolClient,
    M: Media,
{
    /// Exchange `request` and keep asking for blocks while more are pending
    pub async fn read_data_block(&mut self, request: &Request, reply: &mut ReplyData) -> DlmsResult<()> {
        match request {
            Request::Single(data) => self.read_blocks(data, reply).await,
            Request::Multiple(packets) => {
                for data in packets {
                    reply.clear();
                    self.read_blocks(data, reply).await?;
                }
                Ok(())
            }
        }
    }

    async fn read_blocks(&mut self, data: &[u8], reply: &mut ReplyData) -> DlmsResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.read_dlms_packet(data, reply).await?;
        while reply.is_more_data() {
            if reply.is_streaming() {
                self.read_dlms_packet(&[], reply).await?;
            } else {
                let next = self.client.receiver_ready(reply)?;
                if next.is_empty() {
                    return Err(DlmsError::InvalidData(
                        "No request for the next block".to_string(),
                    ));
                }
                self.read_dlms_packet(&next, reply).await?;
            }
        }
        Ok(())
    }
}
