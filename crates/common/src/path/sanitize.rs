// Filename sanitization for untrusted client-supplied names.
//
// NFD normalization, separator/metacharacter replacement, control character
// stripping, 255 chars and 255 UTF-8 bytes max with the extension preserved.

use unicode_normalization::UnicodeNormalization;

/// Name returned whenever sanitization would otherwise produce nothing usable.
pub const FALLBACK_NAME: &str = "unnamed_file";

/// Maximum sanitized name length in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Maximum sanitized name length in UTF-8 bytes (`NAME_MAX` on Linux).
pub const MAX_NAME_BYTES: usize = 255;

const REPLACED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Produce a filesystem-safe name from an arbitrary string.
///
/// Unicode letters and spaces survive. The function never fails and never
/// returns an empty string, `.` or `..`.
pub fn sanitize_filename(input: &str) -> String {
    if input.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let cleaned: String = input
        .nfd()
        .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
        .filter(|c| !is_stripped_control(*c))
        .collect();

    let bounded = truncate_preserving_extension(&cleaned);

    if bounded.is_empty() || bounded == "." || bounded == ".." {
        return FALLBACK_NAME.to_string();
    }

    bounded
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

fn truncate_preserving_extension(name: &str) -> String {
    if name.len() <= MAX_NAME_BYTES && name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }

    let (stem, extension) = split_stem(name);
    let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
    let suffix_chars = suffix.chars().count();

    if suffix_chars >= MAX_NAME_CHARS || suffix.len() >= MAX_NAME_BYTES {
        return bounded_prefix(name, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string();
    }

    let stem = bounded_prefix(stem, MAX_NAME_CHARS - suffix_chars, MAX_NAME_BYTES - suffix.len());
    format!("{stem}{suffix}")
}

/// Longest prefix of `value` within both limits, cut on a char boundary.
pub fn bounded_prefix(value: &str, max_chars: usize, max_bytes: usize) -> &str {
    let end = value
        .char_indices()
        .take(max_chars)
        .map(|(index, c)| index + c.len_utf8())
        .take_while(|end| *end <= max_bytes)
        .last()
        .unwrap_or(0);
    &value[..end]
}

/// Split a name into stem and extension at the last dot.
///
/// A leading dot (`.env`) or a trailing dot does not start an extension.
pub fn split_stem(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => {
            (&name[..index], Some(&name[index + 1..]))
        }
        _ => (name, None),
    }
}

/// Lowercased extension of `name`, if it has one.
pub fn file_extension(name: &str) -> Option<String> {
    split_stem(name).1.map(str::to_lowercase)
}
