// Sequential row identifiers such as `DOC007` or `LV001_RF012`.

/// Pattern used when the caller leaves `identifierPattern` blank.
pub const DEFAULT_IDENTIFIER_PATTERN: &str = "DOC001";

/// The identifier that follows every existing one matching `pattern`.
///
/// `BASE_PREFIXNNN` patterns (one underscore, digits at the end) only count
/// identifiers sharing `BASE_PREFIX`. Any other pattern is read as
/// `PREFIX` + first digit run + `SUFFIX`. The pattern's own number is the
/// floor, so an empty database starts there. A pattern without digits is
/// returned unchanged.
pub fn next_identifier<'a, I>(pattern: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let pattern = pattern.trim();
    let existing: Vec<&str> = existing.into_iter().collect();
    next_scoped(pattern, &existing).unwrap_or_else(|| pattern.to_owned())
}

fn next_scoped(pattern: &str, existing: &[&str]) -> Option<String> {
    if let Some((base, increment)) = pattern.split_once('_').filter(|(_, rest)| !rest.contains('_')) {
        if let Some((prefix, digits)) = trailing_counter(increment) {
            let head = format!("{base}_{prefix}");
            let highest = highest_counter(existing, &head, "");
            return Some(format!("{head}{}", advance(digits, highest)?));
        }
    }

    let (prefix, digits, suffix) = counter_split(pattern)?;
    let highest = highest_counter(existing, prefix, suffix);
    Some(format!("{prefix}{}{suffix}", advance(digits, highest)?))
}

/// `RF001` → `("RF", "001")`; the prefix must be non-empty.
fn trailing_counter(part: &str) -> Option<(&str, &str)> {
    let start = part.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    (start > 0 && start < part.len()).then(|| part.split_at(start))
}

/// Split at the first digit run that follows at least one character.
fn counter_split(pattern: &str) -> Option<(&str, &str, &str)> {
    let (start, _) = pattern.char_indices().skip(1).find(|(_, c)| c.is_ascii_digit())?;
    let run = pattern[start..].find(|c: char| !c.is_ascii_digit()).map_or(pattern.len(), |len| start + len);
    Some((&pattern[..start], &pattern[start..run], &pattern[run..]))
}

fn highest_counter(existing: &[&str], prefix: &str, suffix: &str) -> Option<u64> {
    existing
        .iter()
        .filter_map(|id| id.trim().strip_prefix(prefix)?.strip_suffix(suffix))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u64>().ok())
        .max()
}

/// Next counter after both the pattern's floor and the highest seen,
/// zero-padded to the pattern's width.
fn advance(digits: &str, highest: Option<u64>) -> Option<String> {
    let floor = digits.parse::<u64>().ok()?;
    let next = match highest {
        Some(highest) if highest >= floor => highest.checked_add(1)?,
        _ => floor,
    };
    Some(format!("{next:0width$}", width = digits.len()))
}
