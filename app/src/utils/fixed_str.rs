//! helpers for the NUL padded byte strings stored inside records

/// copy `s` into a zeroed array of `N` bytes, truncating when it is longer
pub fn to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// read a padded byte string back, dropping trailing NULs and spaces
pub fn from_fixed(buf: &[u8]) -> String {
    let end = buf
        .iter()
        .rposition(|b| *b != 0 && *b != b' ')
        .map_or(0, |p| p + 1);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// case-insensitive comparison of a stored name against a wanted one
pub fn names_match(stored: &[u8], wanted: &str) -> bool {
    from_fixed(stored).to_lowercase() == wanted.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_pads_and_truncates() {
        let short: [u8; 4] = to_fixed("ab");
        assert_eq!(short, [b'a', b'b', 0, 0]);
        let long: [u8; 4] = to_fixed("abcdef");
        assert_eq!(&long, b"abcd");
    }

    #[test]
    fn test_from_fixed_trims_padding() {
        assert_eq!(from_fixed(b"users.txt\0\0\0"), "users.txt");
        assert_eq!(from_fixed(b"disk1  \0"), "disk1");
        assert_eq!(from_fixed(&[0u8; 8]), "");
    }

    #[test]
    fn test_names_match_ignores_case() {
        let stored: [u8; 12] = to_fixed("Docs");
        assert!(names_match(&stored, "docs"));
        assert!(names_match(&stored, "DOCS"));
        assert!(!names_match(&stored, "doc"));
    }
}
