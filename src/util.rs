//! Small shared helpers: text decoding, normalization, image sniffing.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Get current time as seconds since Unix epoch.
pub fn time_now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Decode bytes to a string, handling various encodings.
///
/// 1. UTF-8 first (a BOM is handled by encoding_rs)
/// 2. the hint encoding (from `<?xml encoding="..."?>`) if UTF-8 is malformed
/// 3. Windows-1252, common in old ebooks
///
/// Borrows when the input is already valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from an XML declaration in the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

// ============================================================================
// Text Normalization
// ============================================================================

/// Normalize text for link and heading matching: lowercase ASCII
/// alphanumerics separated by single spaces.
pub fn normalize_link_text(text: &str) -> String {
    let lowered = text.to_lowercase().replace("&nbsp;", " ");
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Characters kept by the fuzzy text matcher, lowercased.
///
/// Everything that is not alphanumeric is dropped so punctuation, quote
/// style and whitespace differences never break a match.
pub fn searchable_chars(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase().filter(|l| l.is_alphanumeric())
}

/// Keep only lowercased alphanumeric characters.
pub fn ultra_normalize(text: &str) -> String {
    text.chars().flat_map(searchable_chars).collect()
}

// ============================================================================
// Image Format Detection
// ============================================================================

/// Image formats the reader can inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    WebP,
    /// Unknown/binary format
    Binary,
}

impl MediaFormat {
    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Binary => "application/octet-stream",
        }
    }
}

/// Detect an image format from its magic bytes.
pub fn detect_media_format(data: &[u8]) -> MediaFormat {
    if data.starts_with(&[0xFF, 0xD8]) {
        return MediaFormat::Jpeg;
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return MediaFormat::Png;
    }
    if data.starts_with(b"GIF") {
        return MediaFormat::Gif;
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return MediaFormat::WebP;
    }
    let head = &data[..data.len().min(256)];
    if head.windows(4).any(|w| w == b"<svg") {
        return MediaFormat::Svg;
    }
    MediaFormat::Binary
}

/// Build a `data:` URI for raw image bytes.
pub fn data_uri(data: &[u8]) -> String {
    let mime = detect_media_format(data).mime_type();
    format!("data:{mime};base64,{}", STANDARD.encode(data))
}

/// Parse an integer the way JavaScript's `parseInt(s, radix)` does: leading
/// valid digits only, `None` when there are none.
pub fn parse_int_prefix(s: &str, radix: u32) -> Option<u64> {
    let digits: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_digit(radix))
        .collect();
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(&digits, radix).ok()
}
