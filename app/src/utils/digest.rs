use std::path::Path;

/// derive a 32-bit disk signature from the image path and its creation instant
///
/// the value is taken from the first 4 bytes of a [blake3] hash
pub fn disk_signature(path: &Path, created_at_nanos: u128) -> i32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(&created_at_nanos.to_le_bytes());
    let hash = hasher.finalize();
    let mut output = [0u8; 4];
    output.copy_from_slice(&hash.as_bytes()[..4]);
    i32::from_le_bytes(output)
}
