//! Identifier utilities.
//!
//! Extracts canonical object ids from shareable links or raw id strings and
//! builds shareable links back from `(id, kind)`. Pure string work — no
//! network involved.

use url::Url;

use crate::types::{DriveError, DriveResult, ObjectKind};

/// Extract the object id from a shareable link or a bare id.
///
/// Accepted shapes, in order:
/// 1. folder/file URLs (`.../folders/<id>`, `.../file/d/<id>/...`),
/// 2. bare ids recognized by length (19 or 33 chars, no path separators),
/// 3. any URL carrying an `id` query parameter.
pub fn extract_id(input: &str) -> DriveResult<String> {
    if input.contains("folders") || input.contains("file") {
        return capture_after(input, "folders/")
            .or_else(|| capture_after(input, "/d/"))
            .ok_or_else(|| DriveError::not_found(format!("no Drive id found in '{}'", input)));
    }
    if (input.len() == 19 || input.len() == 33) && !input.contains('/') {
        return Ok(input.to_string());
    }
    if let Ok(url) = Url::parse(input) {
        if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
            if !id.is_empty() {
                return Ok(id.into_owned());
            }
        }
    }
    Err(DriveError::not_found(format!(
        "no Drive id found in '{}'",
        input
    )))
}

/// Build the shareable link for an object.
///
/// Deterministic and pure: folders get a browsing URL, files a direct
/// download URL.
pub fn share_link(id: &str, kind: ObjectKind) -> String {
    match kind {
        ObjectKind::Folder => format!("https://drive.google.com/drive/folders/{}", id),
        ObjectKind::File => format!("https://drive.google.com/uc?id={}&export=download", id),
    }
}

/// The id characters Drive uses: alphanumerics, `-` and `_`.
pub(crate) fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn capture_after(input: &str, marker: &str) -> Option<String> {
    let start = input.find(marker)? + marker.len();
    let id: String = input[start..].chars().take_while(|c| is_id_char(*c)).collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
