// Request path normalization for names addressed by clients.
//
// Names coming back from clients (download, delete, move, archive) are
// relative to a container and may name one nested folder level at most.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("name is empty")]
    Empty,

    #[error("name contains null byte")]
    NullByte,

    #[error("name contains directory traversal component: {0}")]
    Traversal(String),

    #[error("name contains invalid component: {0}")]
    InvalidComponent(String),

    #[error("name is nested deeper than {max_depth} level(s)")]
    TooDeep { max_depth: usize },
}

/// Normalize a client-supplied relative name into its path components.
///
/// Rules:
/// - Apply Unicode NFD normalization (stored names are NFD)
/// - Reject null bytes and backslashes
/// - Reject absolute names and `.` / `..` components
/// - Reject empty components (`a//b`, trailing `/`)
/// - Allow at most `max_depth` components
pub fn normalize_relative_name(input: &str, max_depth: usize) -> Result<Vec<String>, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    if input.contains('\\') {
        return Err(PathError::InvalidComponent("\\".to_string()));
    }

    if input.starts_with('/') {
        return Err(PathError::InvalidComponent("/".to_string()));
    }

    let normalized: String = input.nfd().collect();
    let components: Vec<&str> = normalized.split('/').collect();

    for component in &components {
        match *component {
            "" => return Err(PathError::InvalidComponent("(empty component)".to_string())),
            "." | ".." => return Err(PathError::Traversal((*component).to_string())),
            _ => {}
        }
    }

    if components.len() > max_depth {
        return Err(PathError::TooDeep { max_depth });
    }

    Ok(components.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_name() {
        assert_eq!(normalize_relative_name("report.pdf", 2).unwrap(), vec!["report.pdf"]);
    }

    #[test]
    fn nested_name_within_depth() {
        assert_eq!(
            normalize_relative_name("invoices/march.pdf", 2).unwrap(),
            vec!["invoices", "march.pdf"]
        );
    }

    #[test]
    fn nested_name_beyond_depth() {
        assert_eq!(
            normalize_relative_name("a/b/c.pdf", 2),
            Err(PathError::TooDeep { max_depth: 2 })
        );
        assert_eq!(
            normalize_relative_name("a/c.pdf", 1),
            Err(PathError::TooDeep { max_depth: 1 })
        );
    }

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(normalize_relative_name("..", 2), Err(PathError::Traversal("..".into())));
        assert_eq!(
            normalize_relative_name("docs/../x.pdf", 3),
            Err(PathError::Traversal("..".into()))
        );
        assert_eq!(normalize_relative_name("./x.pdf", 2), Err(PathError::Traversal(".".into())));
    }

    #[test]
    fn absolute_and_backslash_are_rejected() {
        assert!(matches!(
            normalize_relative_name("/etc/passwd", 2),
            Err(PathError::InvalidComponent(_))
        ));
        assert!(matches!(
            normalize_relative_name("a\\b.pdf", 2),
            Err(PathError::InvalidComponent(_))
        ));
    }

    #[test]
    fn empty_and_null() {
        assert_eq!(normalize_relative_name("", 2), Err(PathError::Empty));
        assert_eq!(normalize_relative_name("a\0.pdf", 2), Err(PathError::NullByte));
        assert!(matches!(
            normalize_relative_name("folder/", 2),
            Err(PathError::InvalidComponent(_))
        ));
    }

    #[test]
    fn composed_and_decomposed_names_normalize_identically() {
        let composed = normalize_relative_name("caf\u{00E9}.pdf", 1).unwrap();
        let decomposed = normalize_relative_name("cafe\u{0301}.pdf", 1).unwrap();
        assert_eq!(composed, decomposed);
    }
}
