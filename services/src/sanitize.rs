//! Filename sanitizer.
//!
//! Derives a filesystem-safe stored filename from the user-supplied display
//! name, falling back to the original upload name. The output is advisory:
//! uniqueness is enforced by the metadata store's constraints, not here.

/// Produce `base.ext` safe to use as a storage key.
///
/// The base is taken from `display_name` when present and non-empty after
/// cleaning, otherwise from `original_filename`, otherwise synthesized from
/// the current time. The extension comes from `original_filename`, defaulting
/// to `pdf`.
pub fn sanitize_filename(display_name: Option<&str>, original_filename: &str) -> String {
    let base = display_name
        .map(clean_base)
        .filter(|base| !base.is_empty())
        .or_else(|| {
            let cleaned = clean_base(original_filename);
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .unwrap_or_else(fallback_base);

    let ext = extension_of(original_filename).unwrap_or_else(|| "pdf".to_string());
    format!("{base}.{ext}")
}

/// Strip any extension, collapse whitespace runs to a single underscore, then
/// drop every character outside `[A-Za-z0-9_-]`.
fn clean_base(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    stem.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Non-empty, virtually-unique base without consulting storage.
fn fallback_base() -> String {
    format!("upload_{}", chrono::Utc::now().timestamp_millis())
}

fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext: String = ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    (!ext.is_empty()).then_some(ext.to_ascii_lowercase())
}
