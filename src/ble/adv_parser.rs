//! Advertising payload parsing.
//!
//! A payload is a run of AD structures, each `[len][type][data(len-1)]`.
//! Every reader here stops at the first structure whose length byte is
//! zero or runs past the end of the payload, so malformed reports can
//! never cause an out-of-bounds read.

use heapless::String;

use crate::ble::uuid::Uuid;

/// Flags.
pub const AD_TYPE_FLAGS: u8 = 0x01;
/// Incomplete list of 16-bit service UUIDs.
pub const AD_TYPE_UUID16_MORE_AVAILABLE: u8 = 0x02;
/// Complete list of 16-bit service UUIDs.
pub const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;
/// Incomplete list of 128-bit service UUIDs.
pub const AD_TYPE_UUID128_MORE_AVAILABLE: u8 = 0x06;
/// Complete list of 128-bit service UUIDs.
pub const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
/// Shortened local name.
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
/// Complete local name.
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Iterator over the `(type, data)` pairs of an advertising payload.
#[derive(Clone)]
pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.pos;
        let len = *self.data.get(i)? as usize;
        if len == 0 || i + len >= self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        let ad_type = self.data[i + 1];
        let field = &self.data[i + 2..i + 1 + len];
        self.pos = i + len + 1;
        Some((ad_type, field))
    }
}

/// Walk every AD structure in `data`.
pub fn ad_structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures { data, pos: 0 }
}

/// Return the data of the first AD structure tagged `ad_type`.
pub fn extract_field(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    ad_structures(data).find_map(|(ty, field)| (ty == ad_type).then_some(field))
}

/// Check if the payload lists `uuid` as an advertised service.
///
/// Both the "more available" and "complete" lists for the UUID's width are
/// searched, comparing the raw little-endian bytes chunk by chunk.
pub fn contains_service_uuid(data: &[u8], uuid: &Uuid) -> bool {
    let (tags, chunk) = match uuid {
        Uuid::Uuid16(_) => ([AD_TYPE_UUID16_MORE_AVAILABLE, AD_TYPE_UUID16_COMPLETE], 2),
        Uuid::Uuid128(_) => ([AD_TYPE_UUID128_MORE_AVAILABLE, AD_TYPE_UUID128_COMPLETE], 16),
    };
    let target = uuid.as_raw();

    ad_structures(data)
        .filter(|(ty, _)| tags.contains(ty))
        .any(|(_, field)| field.chunks_exact(chunk).any(|c| c == target))
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    let found = ad_structures(data)
        .find(|(ty, _)| *ty == AD_TYPE_SHORT_NAME || *ty == AD_TYPE_COMPLETE_NAME);

    let mut name = String::new();
    match found {
        Some((_, name_bytes)) => {
            for &b in name_bytes {
                if name.push(b as char).is_err() {
                    break;
                }
            }
        }
        None => {
            let _ = name.push_str("Unknown");
        }
    }
    name
}
