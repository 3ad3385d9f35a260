//! Serialized executable format (.mdrx files).
//!
//! ```text
//! +--------------------+
//! | Magic (4 bytes)    |  "MDRX"
//! +--------------------+
//! | Version (4 bytes)  |  u32, little endian
//! +--------------------+
//! | Length (4 bytes)   |  u32 payload length
//! +--------------------+
//! | Payload (N bytes)  |  bincode-serialized Executable
//! +--------------------+
//! ```
//!
//! The in-memory executable is the primary artifact; this format exists
//! so a compile can be cached or shipped separately from its source.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::executable::Executable;

pub const MAGIC: &[u8; 4] = b"MDRX";
pub const VERSION: u32 = 1;

#[derive(Debug)]
pub enum ExecutableFormatError {
    Io(std::io::Error),
    InvalidMagic,
    UnsupportedVersion(u32),
    Serialize(String),
    Deserialize(String),
}

impl std::fmt::Display for ExecutableFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidMagic => write!(f, "Invalid magic bytes - not a .mdrx file"),
            Self::UnsupportedVersion(v) => {
                write!(f, "Unsupported executable version: {} (current: {})", v, VERSION)
            }
            Self::Serialize(e) => write!(f, "Failed to serialize: {}", e),
            Self::Deserialize(e) => write!(f, "Failed to deserialize: {}", e),
        }
    }
}

impl std::error::Error for ExecutableFormatError {}

impl From<std::io::Error> for ExecutableFormatError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub fn save<P: AsRef<Path>>(
    executable: &Executable,
    path: P,
) -> Result<(), ExecutableFormatError> {
    let bytes = to_bytes(executable)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Executable, ExecutableFormatError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

pub fn to_bytes(executable: &Executable) -> Result<Vec<u8>, ExecutableFormatError> {
    let payload =
        bincode::serialize(executable).map_err(|e| ExecutableFormatError::Serialize(e.to_string()))?;

    let mut bytes = Vec::with_capacity(12 + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Executable, ExecutableFormatError> {
    if bytes.len() < 12 || &bytes[0..4] != MAGIC {
        return Err(ExecutableFormatError::InvalidMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version > VERSION {
        return Err(ExecutableFormatError::UnsupportedVersion(version));
    }
    let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if bytes.len() < 12 + length {
        return Err(ExecutableFormatError::Deserialize("Truncated data".to_string()));
    }

    let mut executable: Executable = bincode::deserialize(&bytes[12..12 + length])
        .map_err(|e| ExecutableFormatError::Deserialize(e.to_string()))?;
    executable.restore_after_load();
    Ok(executable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_and_version_written() {
        let exe = Executable::new();
        let bytes = to_bytes(&exe).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), VERSION);
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let result = from_bytes(b"XXXX\x01\x00\x00\x00\x00\x00\x00\x00");
        assert!(matches!(result, Err(ExecutableFormatError::InvalidMagic)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&999u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let result = from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(ExecutableFormatError::UnsupportedVersion(999))
        ));
    }

    #[test]
    fn test_round_trip_preserves_constants() {
        let mut exe = Executable::new();
        exe.add_integer_constant(41);
        exe.add_text_constant("hello");
        let bytes = to_bytes(&exe).unwrap();
        let loaded = from_bytes(&bytes).unwrap();
        assert_eq!(loaded.constant_count(), 2);
        assert_eq!(loaded.constant(0), exe.constant(0));
        assert_eq!(loaded.constant_roots().len(), 1);
    }
}
