//! Core types and utilities for the DLMS/COSEM meter reader
//!
//! This crate provides the error taxonomy shared by every layer, OBIS
//! logical names, and the decoded value model handed back by the protocol
//! client.

pub mod error;
pub mod obis_code;
pub mod datatypes;

pub use error::{DlmsError, DlmsResult};
pub use obis_code::ObisCode;
pub use datatypes::{DataObject, DataType};
