use anyhow::{bail, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::fmt;

/// Text decoding chosen for an input file.
///
/// UTF-32 is handled here because `encoding_rs` only implements the WHATWG set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// A WHATWG encoding, plus the length of the byte-order mark to skip
    Standard {
        encoding: &'static Encoding,
        bom_len: usize,
    },
    Utf32Le,
    Utf32Be,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Standard { encoding, bom_len } if *bom_len > 0 => {
                write!(f, "{} (BOM)", encoding.name())
            }
            TextEncoding::Standard { encoding, .. } => f.write_str(encoding.name()),
            TextEncoding::Utf32Le => f.write_str("UTF-32LE (BOM)"),
            TextEncoding::Utf32Be => f.write_str("UTF-32BE (BOM)"),
        }
    }
}

/// Picks a decoding from the byte-order mark in the first four bytes.
///
/// Absence of a mark is the common case and yields `fallback`.
pub fn detect(bytes: &[u8], fallback: &'static Encoding) -> TextEncoding {
    let head = &bytes[..bytes.len().min(4)];
    match head {
        [0xEF, 0xBB, 0xBF, ..] => TextEncoding::Standard {
            encoding: UTF_8,
            bom_len: 3,
        },
        // Must precede the UTF-16LE check: FF FE is a prefix of both.
        [0xFF, 0xFE, 0x00, 0x00] => TextEncoding::Utf32Le,
        [0x00, 0x00, 0xFE, 0xFF] => TextEncoding::Utf32Be,
        [0xFF, 0xFE, ..] => TextEncoding::Standard {
            encoding: UTF_16LE,
            bom_len: 2,
        },
        [0xFE, 0xFF, ..] => TextEncoding::Standard {
            encoding: UTF_16BE,
            bom_len: 2,
        },
        _ => TextEncoding::Standard {
            encoding: fallback,
            bom_len: 0,
        },
    }
}

/// Decodes `bytes` after skipping the byte-order mark. Malformed input is an error.
pub fn decode(bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    match encoding {
        TextEncoding::Standard { encoding, bom_len } => {
            let body = &bytes[bom_len.min(bytes.len())..];
            match encoding.decode_without_bom_handling_and_without_replacement(body) {
                Some(text) => Ok(text.into_owned()),
                None => bail!("Input is not valid {}", encoding.name()),
            }
        }
        TextEncoding::Utf32Le => decode_utf32(bytes.get(4..).unwrap_or(&[]), u32::from_le_bytes),
        TextEncoding::Utf32Be => decode_utf32(bytes.get(4..).unwrap_or(&[]), u32::from_be_bytes),
    }
}

fn decode_utf32(body: &[u8], word: fn([u8; 4]) -> u32) -> Result<String> {
    if body.len() % 4 != 0 {
        bail!("Truncated UTF-32 input ({} trailing bytes)", body.len() % 4);
    }
    let mut text = String::with_capacity(body.len() / 4);
    for (i, chunk) in body.chunks_exact(4).enumerate() {
        let value = word([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match char::from_u32(value) {
            Some(c) => text.push(c),
            None => bail!("Invalid UTF-32 code point {:#x} at offset {}", value, 4 + i * 4),
        }
    }
    Ok(text)
}

/// Encodes `text` for writing. Characters the target cannot represent are an error
/// rather than being silently replaced with numeric references.
pub fn encode(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    // encoding_rs would substitute UTF-8 for the UTF-16 family
    if encoding.output_encoding() != encoding {
        bail!("Cannot encode text as {}", encoding.name());
    }
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        bail!("Text contains characters not representable in {}", encoding.name());
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1251;

    #[test]
    fn detects_byte_order_marks() {
        assert_eq!(
            detect(b"\xEF\xBB\xBFname", WINDOWS_1251),
            TextEncoding::Standard { encoding: UTF_8, bom_len: 3 }
        );
        assert_eq!(detect(b"\xFF\xFE\x00\x00", WINDOWS_1251), TextEncoding::Utf32Le);
        assert_eq!(detect(b"\x00\x00\xFE\xFF", WINDOWS_1251), TextEncoding::Utf32Be);
        assert_eq!(
            detect(b"\xFF\xFEn\x00", WINDOWS_1251),
            TextEncoding::Standard { encoding: UTF_16LE, bom_len: 2 }
        );
        assert_eq!(
            detect(b"\xFE\xFF\x00n", WINDOWS_1251),
            TextEncoding::Standard { encoding: UTF_16BE, bom_len: 2 }
        );
    }

    #[test]
    fn falls_back_without_mark() {
        assert_eq!(
            detect(b"name;login", WINDOWS_1251),
            TextEncoding::Standard { encoding: WINDOWS_1251, bom_len: 0 }
        );
        assert_eq!(
            detect(b"", WINDOWS_1251),
            TextEncoding::Standard { encoding: WINDOWS_1251, bom_len: 0 }
        );
    }

    #[test]
    fn decodes_cyrillic_legacy_text() -> Result<()> {
        let (bytes, _, _) = WINDOWS_1251.encode("Иванов Иван");
        let enc = detect(&bytes, WINDOWS_1251);
        assert_eq!(decode(&bytes, enc)?, "Иванов Иван");
        Ok(())
    }

    #[test]
    fn strips_utf8_bom() -> Result<()> {
        let bytes = b"\xEF\xBB\xBFname\n";
        assert_eq!(decode(bytes, detect(bytes, WINDOWS_1251))?, "name\n");
        Ok(())
    }

    #[test]
    fn decodes_utf16le_and_utf32le() -> Result<()> {
        let mut utf16 = vec![0xFF, 0xFE];
        for unit in "Ян;x".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&utf16, detect(&utf16, WINDOWS_1251))?, "Ян;x");

        let mut utf32 = vec![0xFF, 0xFE, 0x00, 0x00];
        for c in "Ян".chars() {
            utf32.extend_from_slice(&(c as u32).to_le_bytes());
        }
        assert_eq!(decode(&utf32, detect(&utf32, WINDOWS_1251))?, "Ян");
        Ok(())
    }

    #[test]
    fn malformed_utf8_is_an_error() {
        let bytes = b"\xEF\xBB\xBF\xC3\x28";
        assert!(decode(bytes, detect(bytes, WINDOWS_1251)).is_err());
    }

    #[test]
    fn encode_rejects_unmappable() {
        assert!(encode("Иванов", WINDOWS_1251).is_ok());
        assert!(encode("漢字", WINDOWS_1251).is_err());
        assert_eq!(encode("abc", UTF_8).unwrap(), b"abc".to_vec());
    }

    #[test]
    fn encode_refuses_decode_only_targets() {
        assert!(encode("abc", UTF_16LE).is_err());
        assert!(encode("abc", UTF_16BE).is_err());
    }
}
