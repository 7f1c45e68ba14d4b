//! Loading page texts for the CLI and other file-based callers.
//!
//! Two layouts are accepted:
//!
//! * a JSON array of strings, one per page;
//! * plain text with pages separated by form feeds (`\f`), as written by
//!   `pdftotext`. A trailing empty segment after the final form feed is
//!   dropped.
//!
//! The path `-` reads standard input.

use crate::error::ReorderError;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

/// Read and parse page texts from `source` (a path, or `-` for stdin).
pub fn load_pages(source: &str) -> Result<Vec<String>, ReorderError> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| ReorderError::InvalidPages {
                source_name: "<stdin>".into(),
                detail: e.to_string(),
            })?;
        buf
    } else {
        read_local(source)?
    };
    let name = if source == "-" { "<stdin>" } else { source };
    let pages = parse_pages(&text, name)?;
    debug!("Loaded {} pages from {}", pages.len(), name);
    Ok(pages)
}

fn read_local(path_str: &str) -> Result<String, ReorderError> {
    let path = PathBuf::from(path_str);
    if !path.exists() {
        return Err(ReorderError::FileNotFound { path });
    }
    match std::fs::read(&path) {
        Ok(bytes) => String::from_utf8(bytes).map_err(|e| ReorderError::InvalidPages {
            source_name: path_str.to_string(),
            detail: format!("not valid UTF-8: {e}"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ReorderError::PermissionDenied { path })
        }
        Err(_) => Err(ReorderError::FileNotFound { path }),
    }
}

/// Parse page texts from an in-memory document.
///
/// Input whose first non-whitespace character is `[` must be a JSON array of
/// strings; anything else is split on form feeds.
pub fn parse_pages(text: &str, source_name: &str) -> Result<Vec<String>, ReorderError> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str::<Vec<String>>(text).map_err(|e| {
            ReorderError::InvalidPages {
                source_name: source_name.to_string(),
                detail: format!("expected a JSON array of strings: {e}"),
            }
        });
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}
