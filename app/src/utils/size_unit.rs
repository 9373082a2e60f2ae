//! size units accepted by `mkdisk` and `fdisk`
use byte_unit::{Byte, ByteUnit};

use crate::error::{FsError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SizeUnit {
    /// bytes
    #[value(name = "b")]
    Bytes,
    /// kibibytes
    #[default]
    #[value(name = "k")]
    Kilo,
    /// mebibytes
    #[value(name = "m")]
    Mega,
}

impl SizeUnit {
    fn byte_unit(self) -> ByteUnit {
        match self {
            SizeUnit::Bytes => ByteUnit::B,
            SizeUnit::Kilo => ByteUnit::KiB,
            SizeUnit::Mega => ByteUnit::MiB,
        }
    }

    /// convert `size` expressed in this unit to bytes
    /// # Errors
    /// [FsError::InvalidInput] when `size` is not positive or does not fit an `i32` offset
    pub fn to_bytes(self, size: i32) -> Result<i32> {
        if size <= 0 {
            return Err(FsError::InvalidInput(format!(
                "size must be positive, got {size}"
            )));
        }
        let bytes = Byte::from_unit(size as f64, self.byte_unit())
            .map_err(|e| FsError::InvalidInput(format!("{e:?}")))?
            .get_bytes();
        i32::try_from(bytes)
            .map_err(|_| FsError::InvalidInput(format!("size {size} {self:?} is too large")))
    }
}

/// render a byte count the way `mounted`/`fdisk` report it
pub fn human_size(bytes: i32) -> String {
    Byte::from_bytes(bytes.max(0) as u128)
        .get_appropriate_unit(true)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_are_binary_multiples() {
        assert_eq!(SizeUnit::Bytes.to_bytes(10).unwrap(), 10);
        assert_eq!(SizeUnit::Kilo.to_bytes(512).unwrap(), 512 * 1024);
        assert_eq!(SizeUnit::Mega.to_bytes(1).unwrap(), 1024 * 1024);
    }

    #[test]
    fn test_non_positive_or_huge_size_rejected() {
        assert!(matches!(
            SizeUnit::Kilo.to_bytes(0),
            Err(FsError::InvalidInput(_))
        ));
        assert!(matches!(
            SizeUnit::Mega.to_bytes(-3),
            Err(FsError::InvalidInput(_))
        ));
        assert!(matches!(
            SizeUnit::Mega.to_bytes(4096),
            Err(FsError::InvalidInput(_))
        ));
    }
}
