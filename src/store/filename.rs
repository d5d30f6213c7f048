//! Output file naming and path confinement.

use std::path::{Component, Path, PathBuf};

use super::StoreError;

/// Extension of every exported file.
pub const PDF_EXTENSION: &str = "pdf";

/// Suffix of the in-progress file written before the atomic rename.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Keeps only `[A-Za-z0-9._-]`.
pub(crate) fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Output file name for a stem, as recorded in the ledger's `File` column.
pub(crate) fn output_file_name(stem: &str) -> String {
    format!("{}.{PDF_EXTENSION}", sanitize_stem(stem))
}

/// True when `name` is exactly one ordinary path component.
fn is_single_normal_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// Resolves `<dir>/<stem>.pdf` for a stem, rejecting anything that could
/// land outside `dir`.
///
/// `dir` must already be canonical.
pub(crate) fn confined_output_path(dir: &Path, stem: &str) -> Result<PathBuf, StoreError> {
    if !is_single_normal_component(stem) {
        return Err(StoreError::path_violation(stem));
    }

    let sanitized = sanitize_stem(stem);
    if sanitized.is_empty() || sanitized.starts_with('.') {
        return Err(StoreError::path_violation(stem));
    }

    let path = dir.join(format!("{sanitized}.{PDF_EXTENSION}"));
    if path.parent() != Some(dir) {
        return Err(StoreError::path_violation(path.display().to_string()));
    }
    Ok(path)
}

/// Sibling path used while the file is being written.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}
