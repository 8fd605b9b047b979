//! Marshalling values into a buffer
//!
//! Two routes:
//! - `BytesMarshallable`: the type writes its own fields with the buffer's
//!   primitive and stop-bit accessors.
//! - `write_serde` / `read_serde`: any serde type, bincode-encoded behind a
//!   stop-bit length.
//!
//! ```text
//!   ┌───────────────┬───────────────────────────┐
//!   │ len (stopbit) │ bincode payload (len)     │
//!   └───────────────┴───────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BytesError, Result};
use crate::store::Backing;

use super::Bytes;

/// A type that reads and writes its own binary form.
pub trait BytesMarshallable {
    fn write_marshallable<S: Backing>(&self, bytes: &mut Bytes<S>) -> Result<()>;

    /// Overwrite `self` with the value read at the read cursor.
    fn read_marshallable<S: Backing>(&mut self, bytes: &mut Bytes<S>) -> Result<()>;
}

impl<S: Backing> Bytes<S> {
    pub fn write_marshallable<M: BytesMarshallable + ?Sized>(&mut self, value: &M) -> Result<()> {
        value.write_marshallable(self)
    }

    pub fn read_marshallable<M: BytesMarshallable + ?Sized>(&mut self, value: &mut M) -> Result<()> {
        value.read_marshallable(self)
    }

    /// Bincode-encode `value` behind a stop-bit length.
    pub fn write_serde<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)?;
        self.write_with_length(&encoded)
    }

    /// Decode a value written by `write_serde`. On failure the read cursor
    /// is left where it was.
    pub fn read_serde<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mark = self.read_position;
        let result = self
            .read_length_prefixed("read serde")
            .and_then(|data| {
                data.ok_or_else(|| {
                    BytesError::Serialization("absent value where a serde value was expected".to_string())
                })
            })
            .and_then(|data| bincode::deserialize(&data).map_err(BytesError::from));
        if result.is_err() {
            self.read_position = mark;
        }
        result
    }
}
