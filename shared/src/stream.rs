//! Byte-oriented read/write cursor used to serialize packets

use crate::error::NetError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A packet buffer with an independent read cursor.
///
/// Fields are encoded with bincode's default fixed-width little-endian
/// layout: `i16` takes two bytes, `u64` eight, and fixed-size arrays carry no
/// length prefix. Sender and receiver therefore agree on every byte as long
/// as they write and read the same field types in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream {
    data: Vec<u8>,
    read_pos: usize,
}

impl BitStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NetError> {
        bincode::serialize_into(&mut self.data, value)?;
        Ok(())
    }

    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, NetError> {
        let mut unread = &self.data[self.read_pos..];
        let value = bincode::deserialize_from(&mut unread)?;
        self.read_pos = self.data.len() - unread.len();
        Ok(value)
    }

    /// Bytes not yet consumed by `read`.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for BitStream {
    fn from(data: Vec<u8>) -> Self {
        Self { data, read_pos: 0 }
    }
}
