//! Fixed-width records
//!
//! Layout: `[key: K bytes][marker: 1 byte][payload: payload_len bytes]`.
//! Keys and payloads are NUL padded, and keys compare as unsigned byte
//! strings.

use crate::config::Geometry;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Logical deletion marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Marker {
    Active = b'0',
    Deleted = b'1',
}

impl Marker {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'0' => Some(Marker::Active),
            b'1' => Some(Marker::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Key, exactly `key_len` bytes
    pub key: Vec<u8>,
    pub marker: Marker,
    /// Payload, exactly `payload_len` bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Build an active record, padding key and payload to the geometry
    pub fn new(key: impl AsRef<[u8]>, payload: impl AsRef<[u8]>, geometry: &Geometry) -> Result<Self> {
        Ok(Record {
            key: geometry.pad_key(key.as_ref())?,
            marker: Marker::Active,
            payload: geometry.pad_payload(payload.as_ref())?,
        })
    }

    /// Demo record `i`: key is `i` zero-padded to ten digits, payload
    /// `"Record number i"` truncated to the payload width
    pub fn numbered(i: u64, geometry: &Geometry) -> Result<Self> {
        let key = format!("{:010}", i);
        let text = format!("Record number {}", i);
        let payload = &text.as_bytes()[..text.len().min(geometry.payload_len)];
        Record::new(key, payload, geometry)
    }

    pub fn is_active(&self) -> bool {
        self.marker == Marker::Active
    }

    /// Key with trailing NUL padding removed
    pub fn key_bytes(&self) -> &[u8] {
        trim_nul(&self.key)
    }

    pub fn key_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.key_bytes())
    }

    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(trim_nul(&self.payload))
    }

    /// Write this record into a `record_size` slot
    pub(crate) fn encode_into(&self, slot: &mut [u8]) {
        let key_len = self.key.len();
        slot[..key_len].copy_from_slice(&self.key);
        slot[key_len] = self.marker as u8;
        slot[key_len + 1..key_len + 1 + self.payload.len()].copy_from_slice(&self.payload);
    }

    /// Read a record from a `record_size` slot
    pub(crate) fn decode(slot: &[u8], geometry: &Geometry) -> std::result::Result<Self, String> {
        let k = geometry.key_len;
        let marker = Marker::from_u8(slot[k])
            .ok_or_else(|| format!("invalid deletion marker 0x{:02x}", slot[k]))?;

        Ok(Record {
            key: slot[..k].to_vec(),
            marker,
            payload: slot[k + 1..geometry.record_size()].to_vec(),
        })
    }
}

pub(crate) fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Printable form of a padded key, for errors and logs
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(trim_nul(key)).into_owned()
}
