use notypdf_common::path::sanitize::{sanitize_filename, FALLBACK_NAME, MAX_NAME_BYTES, MAX_NAME_CHARS};
use proptest::prelude::*;

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

proptest! {
    #[test]
    fn output_never_contains_separators_or_controls(input in any::<String>()) {
        let sanitized = sanitize_filename(&input);
        prop_assert!(!sanitized.is_empty());
        prop_assert!(!sanitized.chars().any(|c| FORBIDDEN.contains(&c)));
        prop_assert!(!sanitized.chars().any(is_control));
        prop_assert!(sanitized != "." && sanitized != "..");
    }

    #[test]
    fn output_is_bounded(input in ".{0,600}") {
        let sanitized = sanitize_filename(&input);
        prop_assert!(sanitized.chars().count() <= MAX_NAME_CHARS);
        prop_assert!(sanitized.len() <= MAX_NAME_BYTES);
    }

    #[test]
    fn hostile_paths_are_flattened(segments in prop::collection::vec("[a-z.]{0,8}", 1..6)) {
        let hostile = segments.join("/");
        let sanitized = sanitize_filename(&hostile);
        prop_assert!(!sanitized.contains('/'));
        prop_assert!(!sanitized.is_empty());
    }

    #[test]
    fn sanitizing_is_idempotent(input in "[\\PC]{0,300}") {
        let once = sanitize_filename(&input);
        prop_assert_eq!(sanitize_filename(&once), once.clone());
    }

    #[test]
    fn safe_ascii_names_pass_through(stem in "[A-Za-z0-9 _-]{1,40}", ext in "(pdf|txt|docx|png)") {
        let name = format!("{stem}.{ext}");
        prop_assert_eq!(sanitize_filename(&name), name);
    }
}

#[test]
fn fallback_is_itself_stable() {
    assert_eq!(sanitize_filename(FALLBACK_NAME), FALLBACK_NAME);
}
