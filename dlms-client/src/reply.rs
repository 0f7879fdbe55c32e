//! Reply accumulator filled by the protocol client during an exchange

use bytes::BytesMut;
use dlms_core::{DataObject, DataType};

/// State of one logical exchange
///
/// `error` is the remote's error code; any non-zero value ends the exchange
/// with [`dlms_core::DlmsError::Protocol`].
#[derive(Debug, Clone, Default)]
pub struct ReplyData {
    /// Application data gathered so far
    pub data: BytesMut,
    pub value: Option<DataObject>,
    pub value_type: DataType,
    pub error: u16,
    more_data: bool,
    streaming: bool,
}

impl ReplyData {
    /// Empty reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset before a new logical exchange
    pub fn clear(&mut self) {
        self.data.clear();
        self.value = None;
        self.value_type = DataType::None;
        self.error = 0;
        self.more_data = false;
        self.streaming = false;
    }

    /// More blocks are pending and the remote has not reported an error
    pub fn is_more_data(&self) -> bool {
        self.more_data && self.error == 0
    }

    /// Mark that further blocks are pending
    pub fn set_more_data(&mut self, more_data: bool) {
        self.more_data = more_data;
    }

    /// The remote keeps sending blocks without a continuation request
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Mark that the meter keeps sending without continuation requests
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Take the decoded values of a list reply
    pub fn take_values(&mut self) -> Vec<DataObject> {
        match self.value.take() {
            Some(DataObject::Array(items)) => items,
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }
}
