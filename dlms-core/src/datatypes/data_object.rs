//! Data object types for DLMS/COSEM values

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded attribute value as produced by the protocol client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    Null,
    Boolean(bool),
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Float32(f32),
    Float64(f64),
    Enumerate(u8),
    OctetString(Vec<u8>),
    VisibleString(Vec<u8>),
    Utf8String(Vec<u8>),
    /// Array of DataObjects
    Array(Vec<DataObject>),
    /// Structure (ordered list of DataObjects)
    Structure(Vec<DataObject>),
}

/// Declared type of an attribute
///
/// `None` means the type has not been declared yet; the first successful read
/// adopts the type reported by the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    None,
    NullData,
    Boolean,
    Integer,
    LongInteger,
    DoubleLong,
    Long64,
    Unsigned,
    LongUnsigned,
    DoubleLongUnsigned,
    Long64Unsigned,
    Float32,
    Float64,
    Enumerate,
    OctetString,
    VisibleString,
    Utf8String,
    Array,
    Structure,
}

impl DataType {
    /// Whether values of this type are integers or floating point numbers
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            DataType::Integer
                | DataType::LongInteger
                | DataType::DoubleLong
                | DataType::Long64
                | DataType::Unsigned
                | DataType::LongUnsigned
                | DataType::DoubleLongUnsigned
                | DataType::Long64Unsigned
                | DataType::Enumerate
                | DataType::Float32
                | DataType::Float64
        )
    }
}

impl DataObject {
    /// Type tag of the value
    pub fn data_type(&self) -> DataType {
        match self {
            DataObject::Null => DataType::NullData,
            DataObject::Boolean(_) => DataType::Boolean,
            DataObject::Integer8(_) => DataType::Integer,
            DataObject::Integer16(_) => DataType::LongInteger,
            DataObject::Integer32(_) => DataType::DoubleLong,
            DataObject::Integer64(_) => DataType::Long64,
            DataObject::Unsigned8(_) => DataType::Unsigned,
            DataObject::Unsigned16(_) => DataType::LongUnsigned,
            DataObject::Unsigned32(_) => DataType::DoubleLongUnsigned,
            DataObject::Unsigned64(_) => DataType::Long64Unsigned,
            DataObject::Float32(_) => DataType::Float32,
            DataObject::Float64(_) => DataType::Float64,
            DataObject::Enumerate(_) => DataType::Enumerate,
            DataObject::OctetString(_) => DataType::OctetString,
            DataObject::VisibleString(_) => DataType::VisibleString,
            DataObject::Utf8String(_) => DataType::Utf8String,
            DataObject::Array(_) => DataType::Array,
            DataObject::Structure(_) => DataType::Structure,
        }
    }

    /// Whether the value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, DataObject::Null)
    }

    /// Integer view of any unsigned or non-negative signed value
    pub fn as_u64(&self) -> DlmsResult<u64> {
        let value = match *self {
            DataObject::Unsigned8(v) | DataObject::Enumerate(v) => Some(v as u64),
            DataObject::Unsigned16(v) => Some(v as u64),
            DataObject::Unsigned32(v) => Some(v as u64),
            DataObject::Unsigned64(v) => Some(v),
            DataObject::Integer8(v) => u64::try_from(v).ok(),
            DataObject::Integer16(v) => u64::try_from(v).ok(),
            DataObject::Integer32(v) => u64::try_from(v).ok(),
            DataObject::Integer64(v) => u64::try_from(v).ok(),
            _ => None,
        };
        value.ok_or_else(|| {
            DlmsError::InvalidData(format!(
                "Expected non-negative integer, got {:?}",
                self.data_type()
            ))
        })
    }

    /// Integer value as `i64`
    ///
    /// # Errors
    ///
    /// `InvalidData` if the value is not an integer or does not fit
    pub fn as_i64(&self) -> DlmsResult<i64> {
        match *self {
            DataObject::Integer8(v) => Ok(v as i64),
            DataObject::Integer16(v) => Ok(v as i64),
            DataObject::Integer32(v) => Ok(v as i64),
            DataObject::Integer64(v) => Ok(v),
            _ => self.as_u64().and_then(|v| {
                i64::try_from(v).map_err(|_| {
                    DlmsError::InvalidData(format!("Value {} does not fit in i64", v))
                })
            }),
        }
    }

    /// Bytes of an octet string
    ///
    /// # Errors
    ///
    /// `InvalidData` if the value is not an octet string
    pub fn as_octet_string(&self) -> DlmsResult<&[u8]> {
        match self {
            DataObject::OctetString(s) => Ok(s),
            _ => Err(DlmsError::InvalidData(format!(
                "Expected OctetString, got {:?}",
                self.data_type()
            ))),
        }
    }

    /// Elements of an array or structure
    pub fn as_elements(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Array(items) | DataObject::Structure(items) => Ok(items),
            _ => Err(DlmsError::InvalidData(format!(
                "Expected Array or Structure, got {:?}",
                self.data_type()
            ))),
        }
    }

    /// Owned elements of an array or structure; a scalar becomes a single element
    pub fn into_elements(self) -> Vec<DataObject> {
        match self {
            DataObject::Array(items) | DataObject::Structure(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataObject::Null => write!(f, "null"),
            DataObject::Boolean(b) => write!(f, "{}", b),
            DataObject::Integer8(i) => write!(f, "{}", i),
            DataObject::Integer16(i) => write!(f, "{}", i),
            DataObject::Integer32(i) => write!(f, "{}", i),
            DataObject::Integer64(i) => write!(f, "{}", i),
            DataObject::Unsigned8(u) | DataObject::Enumerate(u) => write!(f, "{}", u),
            DataObject::Unsigned16(u) => write!(f, "{}", u),
            DataObject::Unsigned32(u) => write!(f, "{}", u),
            DataObject::Unsigned64(u) => write!(f, "{}", u),
            DataObject::Float32(fl) => write!(f, "{}", fl),
            DataObject::Float64(fl) => write!(f, "{}", fl),
            DataObject::OctetString(s) => {
                for (i, byte) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            DataObject::VisibleString(s) | DataObject::Utf8String(s) => {
                write!(f, "{}", String::from_utf8_lossy(s))
            }
            DataObject::Array(items) | DataObject::Structure(items) => {
                for (i, elem) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                Ok(())
            }
        }
    }
}
