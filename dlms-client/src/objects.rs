//! COSEM object catalog as seen by the reader
//!
//! Objects are described by their interface class; the session never needs
//! class-specific behavior beyond the capability queries on [`ObjectType`].

use dlms_core::{DataObject, DataType, DlmsError, DlmsResult, ObisCode};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute indices of the Profile Generic class (class id 7)
pub mod profile_generic {
    /// Captured rows
    pub const BUFFER: u8 = 2;
    /// Column definitions
    pub const CAPTURE_OBJECTS: u8 = 3;
    /// Number of rows currently stored
    pub const ENTRIES_IN_USE: u8 = 7;
    /// Maximum number of rows
    pub const PROFILE_ENTRIES: u8 = 8;
}

/// COSEM interface class of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Data,
    Register,
    ExtendedRegister,
    DemandRegister,
    RegisterActivation,
    ProfileGeneric,
    Clock,
    ScriptTable,
    Schedule,
    SpecialDaysTable,
    AssociationShortName,
    AssociationLogicalName,
    SapAssignment,
    ImageTransfer,
    IecLocalPortSetup,
    ActivityCalendar,
    RegisterMonitor,
    SingleActionSchedule,
    IecHdlcSetup,
    PushSetup,
    SecuritySetup,
    DisconnectControl,
    Limiter,
    /// Class the catalog could not map
    Unknown(u16),
}

impl ObjectType {
    /// Object type of a COSEM class id
    ///
    /// Class ids without a dedicated variant map to `Unknown`.
    pub fn from_class_id(class_id: u16) -> Self {
        match class_id {
            1 => ObjectType::Data,
            3 => ObjectType::Register,
            4 => ObjectType::ExtendedRegister,
            5 => ObjectType::DemandRegister,
            6 => ObjectType::RegisterActivation,
            7 => ObjectType::ProfileGeneric,
            8 => ObjectType::Clock,
            9 => ObjectType::ScriptTable,
            10 => ObjectType::Schedule,
            11 => ObjectType::SpecialDaysTable,
            12 => ObjectType::AssociationShortName,
            15 => ObjectType::AssociationLogicalName,
            17 => ObjectType::SapAssignment,
            18 => ObjectType::ImageTransfer,
            19 => ObjectType::IecLocalPortSetup,
            20 => ObjectType::ActivityCalendar,
            21 => ObjectType::RegisterMonitor,
            22 => ObjectType::SingleActionSchedule,
            23 => ObjectType::IecHdlcSetup,
            40 => ObjectType::PushSetup,
            64 => ObjectType::SecuritySetup,
            70 => ObjectType::DisconnectControl,
            71 => ObjectType::Limiter,
            other => ObjectType::Unknown(other),
        }
    }

    /// COSEM class id of this type
    pub fn class_id(&self) -> u16 {
        match self {
            ObjectType::Data => 1,
            ObjectType::Register => 3,
            ObjectType::ExtendedRegister => 4,
            ObjectType::DemandRegister => 5,
            ObjectType::RegisterActivation => 6,
            ObjectType::ProfileGeneric => 7,
            ObjectType::Clock => 8,
            ObjectType::ScriptTable => 9,
            ObjectType::Schedule => 10,
            ObjectType::SpecialDaysTable => 11,
            ObjectType::AssociationShortName => 12,
            ObjectType::AssociationLogicalName => 15,
            ObjectType::SapAssignment => 17,
            ObjectType::ImageTransfer => 18,
            ObjectType::IecLocalPortSetup => 19,
            ObjectType::ActivityCalendar => 20,
            ObjectType::RegisterMonitor => 21,
            ObjectType::SingleActionSchedule => 22,
            ObjectType::IecHdlcSetup => 23,
            ObjectType::PushSetup => 40,
            ObjectType::SecuritySetup => 64,
            ObjectType::DisconnectControl => 70,
            ObjectType::Limiter => 71,
            ObjectType::Unknown(id) => *id,
        }
    }

    /// Number of attributes the class defines; 0 when unknown
    pub fn attribute_count(&self) -> u8 {
        match self {
            ObjectType::Data
            | ObjectType::ScriptTable
            | ObjectType::Schedule
            | ObjectType::SpecialDaysTable
            | ObjectType::SapAssignment => 2,
            ObjectType::Register => 3,
            ObjectType::RegisterActivation
            | ObjectType::AssociationShortName
            | ObjectType::RegisterMonitor
            | ObjectType::SingleActionSchedule
            | ObjectType::DisconnectControl => 4,
            ObjectType::ExtendedRegister => 5,
            ObjectType::SecuritySetup => 6,
            ObjectType::ImageTransfer | ObjectType::PushSetup => 7,
            ObjectType::ProfileGeneric => 8,
            ObjectType::DemandRegister
            | ObjectType::Clock
            | ObjectType::AssociationLogicalName
            | ObjectType::IecLocalPortSetup
            | ObjectType::IecHdlcSetup => 9,
            ObjectType::ActivityCalendar => 10,
            ObjectType::Limiter => 11,
            ObjectType::Unknown(_) => 0,
        }
    }

    /// Whether the object holds historical rows
    pub fn is_profile_generic(&self) -> bool {
        matches!(self, ObjectType::ProfileGeneric)
    }

    /// Whether the class id is not recognized
    pub fn is_unknown(&self) -> bool {
        matches!(self, ObjectType::Unknown(_))
    }

    /// Attribute holding the scaler and unit of register-like classes
    pub fn scaler_unit_index(&self) -> Option<u8> {
        match self {
            ObjectType::Register | ObjectType::ExtendedRegister => Some(3),
            ObjectType::DemandRegister => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Unknown(id) => write!(f, "Unknown({})", id),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One column of a profile generic buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureColumn {
    pub object_type: ObjectType,
    pub logical_name: ObisCode,
    pub attribute_index: i8,
    pub data_index: u16,
}

impl CaptureColumn {
    /// Decode `{class_id, logical_name, attribute_index, data_index}`
    pub fn from_data_object(value: &DataObject) -> DlmsResult<Self> {
        let items = value.as_elements()?;
        if items.len() != 4 {
            return Err(DlmsError::InvalidData(format!(
                "Capture object definition has {} elements, expected 4",
                items.len()
            )));
        }
        let class_id = u16::try_from(items[0].as_u64()?)
            .map_err(|_| DlmsError::InvalidData("Class id out of range".to_string()))?;
        let attribute_index = i8::try_from(items[2].as_i64()?)
            .map_err(|_| DlmsError::InvalidData("Attribute index out of range".to_string()))?;
        let data_index = u16::try_from(items[3].as_u64()?)
            .map_err(|_| DlmsError::InvalidData("Data index out of range".to_string()))?;
        Ok(Self {
            object_type: ObjectType::from_class_id(class_id),
            logical_name: ObisCode::from_slice(items[1].as_octet_string()?)?,
            attribute_index,
            data_index,
        })
    }
}

impl fmt::Display for CaptureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.object_type, self.logical_name, self.attribute_index)
    }
}

/// Declared type and last read value of one attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSlot {
    pub data_type: DataType,
    pub value: Option<DataObject>,
}

/// A remote COSEM object
#[derive(Debug, Clone, PartialEq)]
pub struct CosemObject {
    logical_name: ObisCode,
    short_name: u16,
    object_type: ObjectType,
    version: u8,
    description: String,
    attributes: BTreeMap<u8, AttributeSlot>,
    capture_objects: Vec<CaptureColumn>,
}

impl CosemObject {
    /// Object of `object_type` addressed by `logical_name`
    ///
    /// # Arguments
    ///
    /// * `object_type` - Interface class of the object
    /// * `logical_name` - OBIS code of the object
    pub fn new(object_type: ObjectType, logical_name: ObisCode) -> Self {
        Self {
            logical_name,
            short_name: 0,
            object_type,
            version: 0,
            description: String::new(),
            attributes: BTreeMap::new(),
            capture_objects: Vec::new(),
        }
    }

    /// Set the short name base address
    pub fn with_short_name(mut self, short_name: u16) -> Self {
        self.short_name = short_name;
        self
    }

    /// Set the interface class version
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Set a human readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// OBIS code of the object
    pub fn logical_name(&self) -> &ObisCode {
        &self.logical_name
    }

    /// Short name base address, 0 when referenced by logical name
    pub fn short_name(&self) -> u16 {
        self.short_name
    }

    /// Interface class of the object
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Interface class version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Human readable description, empty when unknown
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared type of attribute `index`; [`DataType::None`] until known
    pub fn data_type(&self, index: u8) -> DataType {
        self.attributes
            .get(&index)
            .map(|slot| slot.data_type)
            .unwrap_or_default()
    }

    /// Declare the data type of attribute `index`
    pub fn set_data_type(&mut self, index: u8, data_type: DataType) {
        self.attributes.entry(index).or_default().data_type = data_type;
    }

    /// Cached value of attribute `index`
    pub fn value(&self, index: u8) -> Option<&DataObject> {
        self.attributes.get(&index).and_then(|slot| slot.value.as_ref())
    }

    /// Whether attribute `index` holds a value read from the meter
    pub fn is_read(&self, index: u8) -> bool {
        self.value(index).is_some()
    }

    /// Cache a read value; the capture objects of a profile generic are decoded
    pub fn set_value(&mut self, index: u8, value: DataObject) -> DlmsResult<()> {
        if self.object_type.is_profile_generic()
            && index == profile_generic::CAPTURE_OBJECTS
        {
            self.capture_objects = match &value {
                DataObject::Null => Vec::new(),
                other => other
                    .as_elements()?
                    .iter()
                    .map(CaptureColumn::from_data_object)
                    .collect::<DlmsResult<Vec<_>>>()?,
            };
        }
        self.attributes.entry(index).or_default().value = Some(value);
        Ok(())
    }

    /// Capture columns decoded from the capture objects attribute
    pub fn capture_objects(&self) -> &[CaptureColumn] {
        &self.capture_objects
    }

    /// Attribute indices a generic readout visits
    ///
    /// Index 1 is the logical name and is only included when `all` is set.
    /// Otherwise attributes already read are skipped, except the value
    /// attribute 2 which always changes.
    pub fn attributes_to_read(&self, all: bool) -> Vec<u8> {
        (1..=self.object_type.attribute_count())
            .filter(|&index| all || (index != 1 && (index == 2 || !self.is_read(index))))
            .collect()
    }
}

/// Ordered object list of an association
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectCatalog {
    objects: Vec<CosemObject>,
}

impl ObjectCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `object` to the catalog
    pub fn push(&mut self, object: CosemObject) {
        self.objects.push(object);
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the catalog holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in association order
    pub fn iter(&self) -> std::slice::Iter<'_, CosemObject> {
        self.objects.iter()
    }

    /// Mutable objects in association order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CosemObject> {
        self.objects.iter_mut()
    }

    /// Object with the given logical name
    pub fn find_by_ln(&self, logical_name: &ObisCode) -> Option<&CosemObject> {
        self.objects.iter().find(|o| o.logical_name() == logical_name)
    }

    /// Mutable object with the given logical name
    pub fn find_by_ln_mut(&mut self, logical_name: &ObisCode) -> Option<&mut CosemObject> {
        self.objects.iter_mut().find(|o| o.logical_name() == logical_name)
    }

    /// Objects of one interface class
    pub fn of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &CosemObject> {
        self.objects.iter().filter(move |o| o.object_type() == object_type)
    }
}

impl FromIterator<CosemObject> for ObjectCatalog {
    fn from_iter<I: IntoIterator<Item = CosemObject>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ObjectCatalog {
    type Item = CosemObject;
    type IntoIter = std::vec::IntoIter<CosemObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

/// Object and attribute addressed by a read
#[derive(Debug)]
pub struct ReadTarget<'a> {
    pub object: &'a mut CosemObject,
    pub index: u8,
}

impl<'a> ReadTarget<'a> {
    /// Target attribute `index` of `object`
    pub fn new(object: &'a mut CosemObject, index: u8) -> Self {
        Self { object, index }
    }
}
