use hex::decode as hex_decode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
  #[error("invalid hex bytestring for {what}: {source}")]
  InvalidHex {
    what: String,
    #[source]
    source: hex::FromHexError,
  },

  #[error("{what} is {found} bytes long, at most {max} allowed")]
  TooLong { what: &'static str, max: usize, found: usize },
}

pub fn strip_0x_str(s: &str) -> &str {
  s.strip_prefix("0x").unwrap_or(s)
}

/// Decodes a hex string, with or without a `0x` prefix. An odd number of digits is left padded.
pub fn hex_byte_string(msg: &str, s: &str) -> Result<Vec<u8>, FormatError> {
  let digits = strip_0x_str(s.trim());
  let padded = if digits.len() % 2 == 1 { format!("0{}", digits) } else { digits.to_string() };
  hex_decode(padded.as_bytes()).map_err(|source| FormatError::InvalidHex { what: msg.to_string(), source })
}

pub fn hex_text(bs: &[u8]) -> String {
  format!("0x{}", hex::encode(bs))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_prefix_once() {
    assert_eq!(strip_0x_str("0x0x12"), "0x12");
    assert_eq!(strip_0x_str("abcd"), "abcd");
  }

  #[test]
  fn pads_odd_digit_counts() {
    assert_eq!(hex_byte_string("test", "0xabc").unwrap(), vec![0x0a, 0xbc]);
  }

  #[test]
  fn rejects_non_hex() {
    assert!(matches!(hex_byte_string("test", "0xzz"), Err(FormatError::InvalidHex { .. })));
  }
}
