//! Decoding of raw inbound chunks into text.

use thiserror::Error;

/// A received chunk was not valid UTF-8.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid UTF-8 in {len}-byte chunk (valid up to byte {valid_up_to})")]
pub struct DecodeError {
    /// Number of leading bytes that were valid.
    pub valid_up_to: usize,
    /// Total chunk length.
    pub len: usize,
}

/// Decodes one chunk read from the port.
///
/// The whole chunk is rejected on any invalid sequence; callers discard it and
/// keep polling. Empty input decodes to an empty string.
///
/// # Errors
///
/// Returns [`DecodeError`] if `bytes` is not valid UTF-8.
pub fn decode_inbound(bytes: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| DecodeError {
            valid_up_to: e.valid_up_to(),
            len: bytes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii_status_line() {
        assert_eq!(decode_inbound(b"FRENTE\n").unwrap(), "FRENTE\n");
    }

    #[test]
    fn test_decode_empty_chunk() {
        assert_eq!(decode_inbound(b"").unwrap(), "");
    }

    #[test]
    fn test_decode_multibyte_text() {
        assert_eq!(decode_inbound("Velocidade 70%\n".as_bytes()).unwrap(), "Velocidade 70%\n");
        assert_eq!(decode_inbound("ação".as_bytes()).unwrap(), "ação");
    }

    #[test]
    fn test_decode_rejects_invalid_sequence() {
        // Arrange
        let bytes = [b'O', b'K', 0xFF, b'!'];

        // Act
        let err = decode_inbound(&bytes).unwrap_err();

        // Assert
        assert_eq!(err, DecodeError { valid_up_to: 2, len: 4 });
    }

    #[test]
    fn test_decode_rejects_truncated_multibyte_sequence() {
        let bytes = "ã".as_bytes();
        assert!(decode_inbound(&bytes[..1]).is_err());
    }
}
