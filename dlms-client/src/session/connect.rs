//! Connection establishment
//!
//! Optional IEC 62056-21 mode E sign-on on serial lines, then SNRM/UA,
//! AARQ/AARE and, for high level security, the challenge exchange.

use super::Session;
use crate::protocol::{Conformance, ProtocolClient};
use crate::reply::ReplyData;
use crate::trace::{timestamp, to_hex, TraceLevel};
use dlms_core::{DlmsError, DlmsResult};
use dlms_transport::{LineSettings, Media, MediaKind, ReceiveParameters};

/// Request message of the IEC sign-on
pub const IEC_SIGN_ON: &[u8] = b"/?!\r\n";
const IDENTIFICATION_MARKER: u8 = b'/';
/// Position of the baud rate character in the identification message
const BAUD_RATE_OFFSET: usize = 4;
const ACK: u8 = 0x06;
/// Protocol control character: normal protocol procedure
const PROTOCOL_CONTROL: u8 = b'2';
/// Mode control character: binary HDLC mode
const MODE_CONTROL: u8 = b'2';
/// Extra room on top of the negotiated information field
const FRAME_OVERHEAD: usize = 40;

/// Bit rate announced by an identification baud rate character
pub fn baud_rate_for_digit(digit: u8) -> DlmsResult<u32> {
    match digit {
        b'0' => Ok(300),
        b'1' => Ok(600),
        b'2' => Ok(1200),
        b'3' => Ok(2400),
        b'4' => Ok(4800),
        b'5' => Ok(9600),
        b'6' => Ok(230400),
        _ => Err(DlmsError::Handshake("Unknown baud rate.".to_string())),
    }
}

/// Baud rate character and bit rate of an identification message
pub fn parse_identification(reply: &[u8]) -> DlmsResult<(u8, u32)> {
    if reply.first() != Some(&IDENTIFICATION_MARKER) {
        return Err(DlmsError::Handshake(format!(
            "Invalid response : {}",
            String::from_utf8_lossy(reply).trim_end()
        )));
    }
    let digit = *reply
        .get(BAUD_RATE_OFFSET)
        .ok_or_else(|| DlmsError::Handshake("Identification message too short".to_string()))?;
    Ok((digit, baud_rate_for_digit(digit)?))
}

/// Acknowledgement selecting binary mode at the announced speed
pub fn iec_acknowledgement(digit: u8) -> [u8; 6] {
    [ACK, PROTOCOL_CONTROL, digit, MODE_CONTROL, b'\r', b'\n']
}

impl<C, M> Session<C, M>
where
    C: ProtocolClient,
    M: Media,
{
    /// Open the media and associate with the meter
    pub async fn open(&mut self) -> DlmsResult<()> {
        self.check_cancelled()?;
        let serial = {
            let mut media = self.media.exclusive_access().await;
            media.open().await?;
            media.kind() == MediaKind::Serial
        };
        if self.config.iec && serial {
            self.iec_handshake().await?;
        }

        let mut reply = ReplyData::new();
        if let Some(snrm) = self.client.snrm_request()? {
            self.read_dlms_packet(&snrm, &mut reply).await?;
            self.client.parse_ua_response(&reply.data)?;
            self.reply_capacity = self.client.max_info_tx() + FRAME_OVERHEAD;
        }

        reply.clear();
        let aarq = self.client.aarq_request()?;
        self.read_data_block(&aarq, &mut reply).await?;
        self.client.parse_aare_response(&reply.data)?;

        if self.client.authentication().requires_challenge() {
            reply.clear();
            for packet in self.client.application_association_request()? {
                self.read_dlms_packet(&packet, &mut reply).await?;
            }
            self.client
                .parse_application_association_response(&reply.data)?;
        }

        self.multiple_references = self
            .client
            .negotiated_conformance()
            .contains(Conformance::MULTIPLE_REFERENCES);
        log::debug!(
            "Association established, multiple references {}",
            if self.multiple_references { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    async fn iec_handshake(&mut self) -> DlmsResult<()> {
        let handle = self.media.clone();
        let mut media = handle.exclusive_access().await;
        let mut params = ReceiveParameters::new(Some(b'\n'), 1, self.config.wait_time);

        self.trace_tx(IEC_SIGN_ON);
        media.send(IEC_SIGN_ON).await?;
        let mut identification = self.receive_line(&mut *media, &mut params).await?;
        if identification == IEC_SIGN_ON {
            // local echo
            identification = self.receive_line(&mut *media, &mut params).await?;
        }

        let (digit, bit_rate) = parse_identification(&identification)?;
        self.tracer
            .write(&format!("Bitrate is : {}", bit_rate), TraceLevel::Info);

        let ack = iec_acknowledgement(digit);
        self.trace_tx(&ack);
        media.send(&ack).await?;
        params.wait_time = self.config.ack_wait_time;
        if media.receive(&mut params).await? {
            if let Some(reply) = params.reply.take() {
                self.trace_rx(&reply);
            }
        }

        media.close().await?;
        media.configure_line(LineSettings::eight_n_one(bit_rate))?;
        media.open().await?;
        drop(media);
        tokio::time::sleep(self.config.settle_time).await;
        Ok(())
    }

    async fn receive_line(&self, media: &mut M, params: &mut ReceiveParameters) -> DlmsResult<Vec<u8>> {
        let complete = tokio::select! {
            result = media.receive(params) => result?,
            _ = self.cancel.cancelled() => return Err(DlmsError::Cancelled),
        };
        if !complete {
            return Err(DlmsError::TransportTimeout(
                "Failed to receive reply from the media.".to_string(),
            ));
        }
        let reply = params.reply.take().unwrap_or_default();
        self.trace_rx(&reply);
        Ok(reply)
    }

    fn trace_tx(&self, data: &[u8]) {
        self.tracer.write(
            &format!("TX: {}\t{}", timestamp(), to_hex(data)),
            TraceLevel::Verbose,
        );
    }

    fn trace_rx(&self, data: &[u8]) {
        self.tracer.write(
            &format!("RX: {}\t{}", timestamp(), to_hex(data)),
            TraceLevel::Verbose,
        );
    }
}
