// src/filtering/text_detection.rs

use crate::core_types::FileContent;
use content_inspector::ContentType;
use std::str;

/// Checks if a byte buffer is likely text-based.
///
/// `content_inspector` catches NUL bytes and well-known binary magic numbers
/// that would otherwise pass as valid UTF-8; the buffer must then also decode
/// as UTF-8.
///
/// # Examples
/// ```
/// use repodigest::filtering::is_likely_text_from_buffer;
///
/// assert!(is_likely_text_from_buffer(b"This is valid UTF-8 text."));
/// assert!(!is_likely_text_from_buffer(b"This contains a null byte \0."));
/// assert!(!is_likely_text_from_buffer(&[0x48, 0x65, 0x6c, 0x6c, 0x80, 0x6f]));
/// ```
pub fn is_likely_text_from_buffer(buffer: &[u8]) -> bool {
    match content_inspector::inspect(buffer) {
        ContentType::UTF_8 | ContentType::UTF_8_BOM => str::from_utf8(buffer).is_ok(),
        _ => false,
    }
}

/// Decodes file bytes, degrading to [`FileContent::Binary`] instead of failing.
///
/// # Examples
/// ```
/// use repodigest::core_types::FileContent;
/// use repodigest::filtering::decode_content;
///
/// assert_eq!(decode_content(b"hi".to_vec()), FileContent::Text("hi".to_string()));
/// assert_eq!(decode_content(vec![0xff, 0xfe, 0x00]), FileContent::Binary);
/// ```
pub fn decode_content(bytes: Vec<u8>) -> FileContent {
    if !is_likely_text_from_buffer(&bytes) {
        return FileContent::Binary;
    }
    match String::from_utf8(bytes) {
        Ok(text) => FileContent::Text(text),
        Err(_) => FileContent::Binary,
    }
}
