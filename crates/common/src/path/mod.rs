pub mod normalize;
pub mod sanitize;

pub use normalize::{normalize_relative_name, PathError};
pub use sanitize::{file_extension, sanitize_filename, split_stem, FALLBACK_NAME};
