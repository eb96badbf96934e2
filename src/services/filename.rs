// src/services/filename.rs
//! Naming of downloaded documents.
//!
//! The server's `Content-Disposition` name wins. Without one, the source URL
//! itself becomes the name, sanitized into the device's accepted character
//! set.

use percent_encoding::percent_decode_str;

/// Longest file name the device accepts.
pub const MAX_FILE_NAME_LEN: usize = 200;

const PDF_EXTENSION: &str = ".pdf";

/// Chooses the device file name for a download.
///
/// # Arguments
/// * `url` - the source URL
/// * `content_disposition` - the response's `Content-Disposition` header, if any
pub fn derive_file_name(url: &str, content_disposition: Option<&str>) -> String {
    let name = content_disposition
        .and_then(content_disposition_filename)
        .map(|n| n.replace('/', "-"))
        .unwrap_or_else(|| name_from_url(url));
    truncate_chars(&name, MAX_FILE_NAME_LEN)
}

/// Extracts the `filename` parameter, quoted or unquoted.
///
/// `filename*=UTF-8''...` values are percent-decoded.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let start = header.to_ascii_lowercase().find("filename")?;
    let rest = &header[start + "filename".len()..];

    let stop = rest.find(|c: char| c == '=' || c == ';' || c == '\n')?;
    if !rest[stop..].starts_with('=') {
        return None;
    }
    let extended = rest[..stop].trim_end().ends_with('*');
    let value = &rest[stop + 1..];

    let raw = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => match value[1..].find(quote) {
            Some(end) => value[1..1 + end].to_string(),
            None => unquoted(value),
        },
        _ => unquoted(value),
    };

    let name = if extended { decode_extended_value(&raw) } else { raw };
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn unquoted(value: &str) -> String {
    value
        .split(|c: char| c == ';' || c == '\n')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Decodes an RFC 5987 `charset'lang'value` string. Anything malformed is
/// returned as-is.
fn decode_extended_value(raw: &str) -> String {
    let mut parts = raw.splitn(3, '\'');
    let (Some(charset), Some(_lang), Some(encoded)) = (parts.next(), parts.next(), parts.next())
    else {
        return raw.to_string();
    };
    if !charset.eq_ignore_ascii_case("utf-8") {
        return raw.to_string();
    }

    match percent_decode_str(encoded).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Builds a name from the URL: query strings are dropped for direct `.pdf`
/// links (they are usually expiring access signatures), then every character
/// outside `[A-Za-z0-9_.-]` and space becomes `-`.
pub fn name_from_url(url: &str) -> String {
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let base = if without_query.to_ascii_lowercase().ends_with(PDF_EXTENSION) {
        without_query
    } else {
        url
    };

    let mut name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if !name.to_ascii_lowercase().ends_with(PDF_EXTENSION) {
        name.push_str(PDF_EXTENSION);
    }
    name
}

fn truncate_chars(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}
