//! UUID types.

/// A 16-bit or 128-bit Bluetooth UUID, stored little-endian as it appears
/// on air.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Uuid {
    /// 16-bit UUID
    Uuid16([u8; 2]),
    /// 128-bit UUID
    Uuid128([u8; 16]),
}

/// Client Characteristic Configuration descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid = Uuid::new_short(0x2902);

/// Characteristic declaration attribute type.
pub const CHARACTERISTIC_DECLARATION: Uuid = Uuid::new_short(0x2803);

impl Uuid {
    /// Create a new 16-bit UUID.
    pub const fn new_short(val: u16) -> Self {
        Self::Uuid16(val.to_le_bytes())
    }

    /// Create a new 128-bit UUID from little-endian bytes.
    pub const fn new_long(val: [u8; 16]) -> Self {
        Self::Uuid128(val)
    }

    /// Width of the UUID in bits (16 or 128).
    pub fn bits(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 16,
            Uuid::Uuid128(_) => 128,
        }
    }

    /// Raw little-endian bytes.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Uuid::Uuid16(uuid) => uuid,
            Uuid::Uuid128(uuid) => uuid,
        }
    }

    /// The 16-bit value, if this is a short UUID.
    pub fn as_short(&self) -> Option<u16> {
        match self {
            Uuid::Uuid16(data) => Some(u16::from_le_bytes(*data)),
            Uuid::Uuid128(_) => None,
        }
    }
}

impl From<u16> for Uuid {
    fn from(data: u16) -> Self {
        Uuid::new_short(data)
    }
}

impl From<[u8; 16]> for Uuid {
    fn from(data: [u8; 16]) -> Self {
        Uuid::Uuid128(data)
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = ();

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value.len() {
            2 => Ok(Uuid::Uuid16([value[0], value[1]])),
            16 => {
                let mut bytes = [0; 16];
                bytes.copy_from_slice(value);
                Ok(Uuid::Uuid128(bytes))
            }
            _ => Err(()),
        }
    }
}
