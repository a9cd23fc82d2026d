//! Byte- and path-level helpers shared by the format handlers.

use std::borrow::Cow;
use std::path::{Component, Path};

use percent_encoding::percent_decode_str;

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode bytes to a string, handling various encodings.
///
/// 1. UTF-8 (a BOM is consumed by encoding_rs)
/// 2. The hint encoding, usually from `<?xml encoding="..."?>`
/// 3. Windows-1252, common in old ebooks
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

/// Decode an XML document's bytes using its own declaration as the hint.
pub fn decode_xml(bytes: &[u8]) -> Cow<'_, str> {
    decode_text(bytes, extract_xml_encoding(bytes))
}

/// Extract the encoding name from an XML declaration.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

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
// Dates
// ============================================================================

/// Truncate an ISO timestamp to its date part.
///
/// `"2022-05-26T16:26:51Z"` becomes `"2022-05-26"`.
pub fn truncate_to_date(s: &str) -> &str {
    match s.find('T') {
        Some(t_pos) => &s[..t_pos],
        None => s,
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Resolve `rel` against the directory of the file `base`, without touching
/// the filesystem.
///
/// `..` and `.` segments collapse, a leading `/` means the archive root, and
/// the result uses forward slashes.
pub fn resolve_path(base: &str, rel: &str) -> String {
    if let Some(absolute) = rel.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut stack: Vec<&str> = Path::new(base)
        .parent()
        .unwrap_or(Path::new(""))
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    for component in Path::new(rel).components() {
        match component {
            Component::ParentDir => {
                stack.pop();
            }
            Component::Normal(c) => {
                if let Some(s) = c.to_str() {
                    stack.push(s);
                }
            }
            _ => {}
        }
    }

    stack.join("/")
}

/// Percent-decode an href from a manifest or navigation document.
pub fn decode_href(href: &str) -> String {
    percent_decode_str(href.trim())
        .decode_utf8_lossy()
        .replace('\\', "/")
}

/// Split `file#anchor` into its parts. An empty anchor counts as none.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, anchor)) if !anchor.is_empty() => (path, Some(anchor)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

// ============================================================================
// Tests
// ============================================================================
