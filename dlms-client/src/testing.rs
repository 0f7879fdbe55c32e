//! Scripted media and protocol client for session tests
//!
//! Test frames are `[kind, len, payload..]`:
//!
//! | kind | meaning |
//! |---|---|
//! | 0x01 | last block; value is the accumulated data |
//! | 0x02 | block, more follow after a receiver ready |
//! | 0x03 | block, more follow without a request |
//! | 0x04 | unsolicited notification |
//! | 0x05 | remote error, code in the first byte |
//! | 0x06 | list reply, one `Unsigned8` per byte |
//! | 0x07 | profile buffer, one single-cell row per byte |
//! | 0x08 | capture objects, count in the first byte |

use crate::objects::{CosemObject, ObjectCatalog};
use crate::protocol::{Authentication, Conformance, InterfaceType, ProtocolClient, Request, Security};
use crate::reply::ReplyData;
use crate::trace::{TraceLevel, TraceSink};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Local};
use dlms_core::{DataObject, DataType, DlmsError, DlmsResult};
use dlms_transport::{LineSettings, Media, MediaKind, ReceiveParameters};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const SNRM: &[u8] = &[0x93];
pub const AARQ: &[u8] = &[0x60];
pub const RELEASE: &[u8] = &[0x62];
pub const DISCONNECT: &[u8] = &[0x53];
pub const OBJECTS: &[u8] = &[0xC0, 0x00];
pub const RECEIVER_READY: &[u8] = &[0xCA];
pub const READ_LIST: u8 = 0xC1;

pub fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![kind, payload.len() as u8];
    out.extend_from_slice(payload);
    out
}

pub fn capture_frame(count: u8) -> Vec<u8> {
    frame(0x08, &[count])
}

/// Register 1.0.1.8.0.255 attribute 2 as a capture column
pub fn capture_definition() -> DataObject {
    DataObject::Structure(vec![
        DataObject::Unsigned16(3),
        DataObject::OctetString(vec![1, 0, 1, 8, 0, 255]),
        DataObject::Integer8(2),
        DataObject::Unsigned16(0),
    ])
}

/// Media replaying scripted receives
#[derive(Debug)]
pub struct MockMedia {
    kind: MediaKind,
    pub open: bool,
    /// `None` is a receive that times out
    pub replies: VecDeque<Option<Vec<u8>>>,
    pub sent: Vec<Vec<u8>>,
    pub receives: usize,
    /// Terminator and count of every receive
    pub params: Vec<(Option<u8>, usize)>,
    pub lines: Vec<LineSettings>,
    pub opened: usize,
    pub closed: usize,
}

impl MockMedia {
    fn with_kind(kind: MediaKind) -> Self {
        Self {
            kind,
            open: false,
            replies: VecDeque::new(),
            sent: Vec::new(),
            receives: 0,
            params: Vec::new(),
            lines: Vec::new(),
            opened: 0,
            closed: 0,
        }
    }

    pub fn network() -> Self {
        Self::with_kind(MediaKind::Network)
    }

    pub fn serial() -> Self {
        Self::with_kind(MediaKind::Serial)
    }

    pub fn push_reply(&mut self, data: Vec<u8>) {
        self.replies.push_back(Some(data));
    }

    pub fn push_timeout(&mut self) {
        self.replies.push_back(None);
    }
}

#[async_trait]
impl Media for MockMedia {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn open(&mut self) -> DlmsResult<()> {
        self.open = true;
        self.opened += 1;
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        self.open = false;
        self.closed += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        self.sent.push(data.to_vec());
        Ok(())
    }

    async fn receive(&mut self, params: &mut ReceiveParameters) -> DlmsResult<bool> {
        self.receives += 1;
        self.params.push((params.eop, params.count));
        match self.replies.pop_front() {
            Some(Some(data)) => {
                params.reply = Some(data);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn configure_line(&mut self, line: LineSettings) -> DlmsResult<()> {
        self.lines.push(line);
        Ok(())
    }
}

/// Protocol client speaking the test frame format
pub struct ScriptedClient {
    pub interface_type: InterfaceType,
    pub authentication: Authentication,
    pub security: Security,
    pub conformance: Conformance,
    pub max_info_tx: usize,
    /// Returned by `parse_objects`
    pub catalog: ObjectCatalog,
    pub fail_aare: bool,
    pub fail_update: bool,
    /// Called while the AARE is parsed
    pub on_aare: Option<Box<dyn FnMut() + Send>>,
    pub app_association_parsed: usize,
    pub rows_by_entry: Vec<(u32, u32)>,
    pub rows_by_range: usize,
}

impl ScriptedClient {
    fn with_interface(interface_type: InterfaceType) -> Self {
        Self {
            interface_type,
            authentication: Authentication::None,
            security: Security::None,
            conformance: Conformance::GET,
            max_info_tx: 128,
            catalog: ObjectCatalog::new(),
            fail_aare: false,
            fail_update: false,
            on_aare: None,
            app_association_parsed: 0,
            rows_by_entry: Vec::new(),
            rows_by_range: 0,
        }
    }

    pub fn hdlc() -> Self {
        Self::with_interface(InterfaceType::Hdlc)
    }

    pub fn wrapper() -> Self {
        Self::with_interface(InterfaceType::Wrapper)
    }
}

impl ProtocolClient for ScriptedClient {
    fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }

    fn authentication(&self) -> Authentication {
        self.authentication
    }

    fn security(&self) -> Security {
        self.security
    }

    fn client_address(&self) -> u16 {
        0x10
    }

    fn server_address(&self) -> u32 {
        0x1
    }

    fn negotiated_conformance(&self) -> Conformance {
        self.conformance
    }

    fn max_info_tx(&self) -> usize {
        self.max_info_tx
    }

    fn snrm_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        Ok((self.interface_type == InterfaceType::Hdlc).then(|| SNRM.to_vec()))
    }

    fn parse_ua_response(&mut self, _data: &[u8]) -> DlmsResult<()> {
        Ok(())
    }

    fn aarq_request(&mut self) -> DlmsResult<Request> {
        Ok(Request::Single(AARQ.to_vec()))
    }

    fn parse_aare_response(&mut self, _data: &[u8]) -> DlmsResult<()> {
        if let Some(callback) = self.on_aare.as_mut() {
            callback();
        }
        if self.fail_aare {
            return Err(DlmsError::InvalidData("Invalid AARE".to_string()));
        }
        Ok(())
    }

    fn application_association_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        Ok(vec![vec![0xC3, 1], vec![0xC3, 2]])
    }

    fn parse_application_association_response(&mut self, _data: &[u8]) -> DlmsResult<()> {
        self.app_association_parsed += 1;
        Ok(())
    }

    fn release_request(&mut self) -> DlmsResult<Request> {
        Ok(Request::Single(RELEASE.to_vec()))
    }

    fn disconnect_request(&mut self) -> DlmsResult<Request> {
        Ok(Request::Single(DISCONNECT.to_vec()))
    }

    fn read_request(&mut self, _object: &CosemObject, index: u8) -> DlmsResult<Request> {
        Ok(Request::Single(vec![0xC0, index]))
    }

    fn read_list_request(&mut self, targets: &[(&CosemObject, u8)]) -> DlmsResult<Vec<Request>> {
        Ok(vec![Request::Single(vec![READ_LIST, targets.len() as u8])])
    }

    fn write_request(&mut self, _object: &CosemObject, index: u8) -> DlmsResult<Request> {
        Ok(Request::Single(vec![0xC2, index]))
    }

    fn objects_request(&mut self) -> DlmsResult<Request> {
        Ok(Request::Single(OBJECTS.to_vec()))
    }

    fn parse_objects(&mut self, _data: &[u8], _only_known: bool) -> DlmsResult<ObjectCatalog> {
        Ok(self.catalog.clone())
    }

    fn read_rows_by_entry_request(
        &mut self,
        _object: &CosemObject,
        index: u32,
        count: u32,
    ) -> DlmsResult<Request> {
        self.rows_by_entry.push((index, count));
        Ok(Request::Single(vec![0xC0, 0x20]))
    }

    fn read_rows_by_range_request(
        &mut self,
        _object: &CosemObject,
        _start: DateTime<Local>,
        _end: DateTime<Local>,
    ) -> DlmsResult<Request> {
        self.rows_by_range += 1;
        Ok(Request::Single(vec![0xC0, 0x21]))
    }

    fn receiver_ready(&mut self, _reply: &ReplyData) -> DlmsResult<Vec<u8>> {
        Ok(RECEIVER_READY.to_vec())
    }

    fn get_data(
        &mut self,
        data: &mut BytesMut,
        reply: &mut ReplyData,
        notify: &mut ReplyData,
    ) -> DlmsResult<bool> {
        if data.len() < 2 || data.len() < 2 + data[1] as usize {
            return Ok(false);
        }
        let len = data[1] as usize;
        let frame = data.split_to(2 + len);
        let payload = &frame[2..];
        match frame[0] {
            0x04 => {
                notify.data.extend_from_slice(payload);
                Ok(false)
            }
            0x05 => {
                reply.error = payload.first().copied().unwrap_or(1) as u16;
                Ok(true)
            }
            0x06 => {
                reply.value_type = DataType::Array;
                reply.value = Some(DataObject::Array(
                    payload.iter().map(|b| DataObject::Unsigned8(*b)).collect(),
                ));
                Ok(true)
            }
            0x07 => {
                reply.value_type = DataType::Array;
                reply.value = Some(DataObject::Array(
                    payload
                        .iter()
                        .map(|b| DataObject::Structure(vec![DataObject::Unsigned8(*b)]))
                        .collect(),
                ));
                Ok(true)
            }
            0x08 => {
                let count = payload.first().copied().unwrap_or(0) as usize;
                reply.value_type = DataType::Array;
                reply.value = Some(DataObject::Array(vec![capture_definition(); count]));
                Ok(true)
            }
            kind => {
                reply.data.extend_from_slice(payload);
                reply.set_more_data(kind != 0x01);
                reply.set_streaming(kind == 0x03);
                if kind == 0x01 {
                    let value = if reply.data.len() == 1 {
                        DataObject::Unsigned8(reply.data[0])
                    } else {
                        DataObject::OctetString(reply.data.to_vec())
                    };
                    reply.value_type = value.data_type();
                    reply.value = Some(value);
                }
                Ok(true)
            }
        }
    }

    fn frame_size(&self, data: &BytesMut) -> usize {
        if data.len() < 2 {
            2 - data.len()
        } else {
            (2 + data[1] as usize).saturating_sub(data.len()).max(1)
        }
    }

    fn update_value(
        &mut self,
        object: &mut CosemObject,
        index: u8,
        value: DataObject,
    ) -> DlmsResult<DataObject> {
        if self.fail_update {
            return Err(DlmsError::InvalidData("Value does not fit the attribute".to_string()));
        }
        object.set_value(index, value.clone())?;
        Ok(value)
    }
}

/// Sink keeping every trace line in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(TraceLevel, String)>>>,
    diagnostics: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<(TraceLevel, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn lines_at(&self, level: TraceLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    pub fn contains(&self, level: TraceLevel, needle: &str) -> bool {
        self.lines_at(level).iter().any(|line| line.contains(needle))
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl TraceSink for MemorySink {
    fn write(&self, level: TraceLevel, line: &str) {
        self.lines.lock().unwrap().push((level, line.to_string()));
    }

    fn diagnostic(&self, error: &DlmsError) {
        self.diagnostics.lock().unwrap().push(format!("{:?}", error));
    }
}
