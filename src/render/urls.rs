//! Fabric image URL normalization.
//!
//! Catalog entries may reference swatches three ways: a path relative to the
//! daemon's own static mount (`/fabrics/lino.jpg`), a Google Drive share
//! link, or any other absolute URL. The render pipeline needs a directly
//! fetchable URL for all three.

use once_cell::sync::Lazy;
use regex::Regex;

static DRIVE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"drive\.google\.com/file/d/([a-zA-Z0-9_-]+)").unwrap());

/// Rewrite a Google Drive share link to its direct-content form.
///
/// `https://drive.google.com/file/d/<ID>/view?usp=drive_link` becomes
/// `https://drive.google.com/uc?export=view&id=<ID>`. Non-Drive URLs and
/// empty input pass through unchanged, and applying the rewrite twice is a
/// no-op (the `uc?export=view` form no longer matches the share pattern).
pub fn convert_google_drive_url(url: &str) -> String {
    if url.is_empty() {
        return url.to_string();
    }

    match DRIVE_FILE_RE.captures(url).and_then(|c| c.get(1)) {
        Some(file_id) => format!(
            "https://drive.google.com/uc?export=view&id={}",
            file_id.as_str()
        ),
        None => url.to_string(),
    }
}

/// Resolve a fabric image reference to a fetchable URL.
///
/// Relative paths are joined to `base_url`; everything else goes through the
/// Drive rewrite.
pub fn resolve_fabric_url(url: &str, base_url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        convert_google_drive_url(url)
    }
}
