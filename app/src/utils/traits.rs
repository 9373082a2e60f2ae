use std::io::{Read, Write};

use bincode::{Decode, Encode};

use crate::error::Result;

/// Trait for fixed-layout records living at absolute offsets of a disk image
/// # Note
/// Records are encoded with [bincode::config::legacy], so integers and floats are
/// fixed-width little-endian and arrays carry no length prefix.
/// The encoded length of every record equals [DiskRecord::SIZE].
pub trait DiskRecord: Encode + Decode<()> + Sized {
    /// the exact number of bytes this record occupies on disk
    const SIZE: usize;

    /// serialize into a writer implementing [Write](std::io::Write)
    /// # Returns
    /// The number of bytes written if successful
    fn serialize_into<W>(&self, w: &mut W) -> Result<usize>
    where
        W: Write,
    {
        let config = bincode::config::legacy();
        Ok(bincode::encode_into_std_write(self, w, config)?)
    }

    /// serialize into a [Vec](std::vec::Vec)
    fn serialize(&self) -> Result<Vec<u8>> {
        let config = bincode::config::legacy();
        Ok(bincode::encode_to_vec(self, config)?)
    }

    /// deserialize from a reader implementing [Read](std::io::Read)
    fn deserialize_from<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let config = bincode::config::legacy();
        Ok(bincode::decode_from_std_read(r, config)?)
    }

    /// deserialize from a slice
    /// # Returns
    /// A tuple containing the deserialized object and the number of bytes read
    fn deserialize(buf: &[u8]) -> Result<(Self, usize)> {
        let config = bincode::config::legacy();
        Ok(bincode::decode_from_slice(buf, config)?)
    }
}
