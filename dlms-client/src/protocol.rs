//! Contract of the protocol client that owns APDU encoding and decoding
//!
//! The session never looks inside a frame. It asks a [`ProtocolClient`] for
//! the bytes to send, feeds it whatever the media returned, and lets it decide
//! when a reply is complete.

use crate::objects::{CosemObject, ObjectCatalog, ReadTarget};
use crate::reply::ReplyData;
use bytes::BytesMut;
use chrono::{DateTime, Local};
use dlms_core::{DataObject, DlmsError, DlmsResult};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Framing layer below the application protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceType {
    #[default]
    Hdlc,
    /// IEC 62056-47 wrapper, used on TCP/UDP
    Wrapper,
}

/// Authentication mechanism of the association
///
/// Ordered by strength; anything above [`Authentication::Low`] needs the
/// extra challenge/response round trips after the AARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Authentication {
    #[default]
    None,
    Low,
    High,
    HighMd5,
    HighSha1,
    HighGmac,
    HighSha256,
}

impl Authentication {
    /// Whether the association needs the challenge exchange after AARE
    pub fn requires_challenge(&self) -> bool {
        *self > Authentication::Low
    }
}

impl FromStr for Authentication {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Authentication::None),
            "low" => Ok(Authentication::Low),
            "high" => Ok(Authentication::High),
            "highmd5" => Ok(Authentication::HighMd5),
            "highsha1" => Ok(Authentication::HighSha1),
            "highgmac" => Ok(Authentication::HighGmac),
            "highsha256" => Ok(Authentication::HighSha256),
            other => Err(DlmsError::InvalidData(format!(
                "Invalid Authentication option: '{}'. (None, Low, High, HighMd5, HighSha1, HighGmac, HighSha256)",
                other
            ))),
        }
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Authentication::None => "None",
            Authentication::Low => "Low",
            Authentication::High => "High",
            Authentication::HighMd5 => "HighMD5",
            Authentication::HighSha1 => "HighSHA1",
            Authentication::HighGmac => "HighGMAC",
            Authentication::HighSha256 => "HighSHA256",
        };
        f.write_str(name)
    }
}

/// Security policy applied to xDLMS APDUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    None,
    Authentication,
    Encryption,
    AuthenticationEncryption,
}

/// Negotiated conformance block (DLMS UA 1000-2, 7.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Conformance(u32);

impl Conformance {
    /// General protection
    pub const GENERAL_PROTECTION: Conformance = Conformance(0x2);
    /// General block transfer
    pub const GENERAL_BLOCK_TRANSFER: Conformance = Conformance(0x4);
    /// Short name read
    pub const READ: Conformance = Conformance(0x8);
    /// Short name write
    pub const WRITE: Conformance = Conformance(0x10);
    /// Short name unconfirmed write
    pub const UNCONFIRMED_WRITE: Conformance = Conformance(0x20);
    /// Attribute 0 with set
    pub const ATTRIBUTE0_SUPPORTED_WITH_SET: Conformance = Conformance(0x100);
    /// Priority management
    pub const PRIORITY_MGMT_SUPPORTED: Conformance = Conformance(0x200);
    /// Attribute 0 with get
    pub const ATTRIBUTE0_SUPPORTED_WITH_GET: Conformance = Conformance(0x400);
    /// Block transfer with get or read
    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: Conformance = Conformance(0x800);
    /// Block transfer with set or write
    pub const BLOCK_TRANSFER_WITH_SET_OR_WRITE: Conformance = Conformance(0x1000);
    /// Block transfer with action
    pub const BLOCK_TRANSFER_WITH_ACTION: Conformance = Conformance(0x2000);
    /// Several attributes in one request
    pub const MULTIPLE_REFERENCES: Conformance = Conformance(0x4000);
    /// Information report
    pub const INFORMATION_REPORT: Conformance = Conformance(0x8000);
    /// Data notification
    pub const DATA_NOTIFICATION: Conformance = Conformance(0x10000);
    /// Access service
    pub const ACCESS: Conformance = Conformance(0x20000);
    /// Parameterized access
    pub const PARAMETERIZED_ACCESS: Conformance = Conformance(0x40000);
    /// Logical name get
    pub const GET: Conformance = Conformance(0x80000);
    /// Logical name set
    pub const SET: Conformance = Conformance(0x100000);
    /// Selective access
    pub const SELECTIVE_ACCESS: Conformance = Conformance(0x200000);
    /// Event notification
    pub const EVENT_NOTIFICATION: Conformance = Conformance(0x400000);
    /// Logical name action
    pub const ACTION: Conformance = Conformance(0x800000);

    /// Conformance from its raw bit mask
    pub const fn from_bits(bits: u32) -> Self {
        Conformance(bits)
    }

    /// Raw bit mask
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(&self, other: Conformance) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Conformance) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`
    pub fn remove(&mut self, other: Conformance) {
        self.0 &= !other.0;
    }
}

impl BitOr for Conformance {
    type Output = Conformance;

    fn bitor(self, rhs: Conformance) -> Conformance {
        Conformance(self.0 | rhs.0)
    }
}

/// Bytes to put on the wire for one logical operation
///
/// An empty payload means there is nothing to send in that phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Single(Vec<u8>),
    /// One operation split into independent exchanges, sent in order
    Multiple(Vec<Vec<u8>>),
}

impl Request {
    /// Packets to send, in order
    pub fn packets(&self) -> &[Vec<u8>] {
        match self {
            Request::Single(data) => std::slice::from_ref(data),
            Request::Multiple(packets) => packets,
        }
    }
}

impl From<Vec<u8>> for Request {
    fn from(data: Vec<u8>) -> Self {
        Request::Single(data)
    }
}

impl From<Vec<Vec<u8>>> for Request {
    fn from(packets: Vec<Vec<u8>>) -> Self {
        Request::Multiple(packets)
    }
}

/// Stateful DLMS/COSEM encoder and decoder
///
/// Implementations keep their own association state (invoke ids, block
/// numbers, ciphering counters); the session only sequences the calls.
pub trait ProtocolClient: Send {
    fn interface_type(&self) -> InterfaceType;

    fn authentication(&self) -> Authentication;

    fn security(&self) -> Security {
        Security::None
    }

    fn client_address(&self) -> u16;

    fn server_address(&self) -> u32;

    /// Conformance agreed in the AARE; empty before association
    fn negotiated_conformance(&self) -> Conformance;

    /// Maximum information field length the remote accepts
    fn max_info_tx(&self) -> usize;

    /// Link setup frame; `None` when the framing needs no link setup
    fn snrm_request(&mut self) -> DlmsResult<Option<Vec<u8>>>;

    fn parse_ua_response(&mut self, data: &[u8]) -> DlmsResult<()>;

    fn aarq_request(&mut self) -> DlmsResult<Request>;

    fn parse_aare_response(&mut self, data: &[u8]) -> DlmsResult<()>;

    /// Challenge/response packets for high level authentication
    fn application_association_request(&mut self) -> DlmsResult<Vec<Vec<u8>>>;

    fn parse_application_association_response(&mut self, data: &[u8]) -> DlmsResult<()>;

    fn release_request(&mut self) -> DlmsResult<Request>;

    fn disconnect_request(&mut self) -> DlmsResult<Request>;

    fn read_request(&mut self, object: &CosemObject, index: u8) -> DlmsResult<Request>;

    /// Batched read of several attributes; may be split over several requests
    fn read_list_request(&mut self, targets: &[(&CosemObject, u8)]) -> DlmsResult<Vec<Request>>;

    fn write_request(&mut self, object: &CosemObject, index: u8) -> DlmsResult<Request>;

    /// Read of the association object list
    fn objects_request(&mut self) -> DlmsResult<Request>;

    fn parse_objects(&mut self, data: &[u8], only_known: bool) -> DlmsResult<ObjectCatalog>;

    /// Selective access by entry; `index` is 1-based
    fn read_rows_by_entry_request(
        &mut self,
        object: &CosemObject,
        index: u32,
        count: u32,
    ) -> DlmsResult<Request>;

    fn read_rows_by_range_request(
        &mut self,
        object: &CosemObject,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> DlmsResult<Request>;

    /// Continuation request for the next block of `reply`
    fn receiver_ready(&mut self, reply: &ReplyData) -> DlmsResult<Vec<u8>>;

    /// Decode what has been received so far
    ///
    /// Consumes complete frames from `data`. Returns `true` once the reply is
    /// complete. Unsolicited frames go to `notify` instead of `reply`.
    fn get_data(
        &mut self,
        data: &mut BytesMut,
        reply: &mut ReplyData,
        notify: &mut ReplyData,
    ) -> DlmsResult<bool>;

    /// Bytes still missing from the frame at the head of `data`
    fn frame_size(&self, data: &BytesMut) -> usize;

    /// Store a decoded value on `object` and return the value to report
    fn update_value(
        &mut self,
        object: &mut CosemObject,
        index: u8,
        value: DataObject,
    ) -> DlmsResult<DataObject> {
        object.set_value(index, value.clone())?;
        Ok(value)
    }

    fn update_values(
        &mut self,
        targets: &mut [ReadTarget<'_>],
        values: Vec<DataObject>,
    ) -> DlmsResult<()> {
        for (target, value) in targets.iter_mut().zip(values) {
            self.update_value(&mut *target.object, target.index, value)?;
        }
        Ok(())
    }
}
