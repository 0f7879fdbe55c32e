//! Decoded value model handed back by the protocol client

pub mod data_object;

pub use data_object::{DataObject, DataType};
