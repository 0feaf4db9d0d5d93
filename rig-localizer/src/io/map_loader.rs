//! Reference map loading.
//!
//! ## File Format
//!
//! Plain text, one point per line:
//!
//! ```text
//! % simple points map
//! 0.000 1.250
//! 0.050 1.250   extra columns are ignored
//! ```
//!
//! Lines starting with `#` or `%` and blank lines are skipped.

use std::fs;
use std::path::Path;

use crate::core::types::PointCloud2D;
use crate::error::{LocalizerError, Result};

/// Load the reference map at `path`.
pub fn load_reference_map(path: impl AsRef<Path>) -> Result<PointCloud2D> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LocalizerError::File {
        action: "read reference map",
        path: path.to_path_buf(),
        source,
    })?;
    let cloud = parse_reference_map(&text).map_err(|e| match e {
        LocalizerError::Map(msg) => LocalizerError::Map(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    log::info!("Loaded reference map {} ({} points)", path.display(), cloud.len());
    Ok(cloud)
}

/// Parse map text; errors name the offending 1-based line.
pub fn parse_reference_map(text: &str) -> Result<PointCloud2D> {
    let mut cloud = PointCloud2D::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(x), Some(y)) = (fields.next(), fields.next()) else {
            return Err(LocalizerError::Map(format!(
                "line {}: expected two coordinates",
                index + 1
            )));
        };
        let parse = |field: &str| {
            field.parse::<f32>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                LocalizerError::Map(format!("line {}: invalid coordinate '{}'", index + 1, field))
            })
        };
        cloud.push_xy(parse(x)?, parse(y)?);
    }

    if cloud.is_empty() {
        return Err(LocalizerError::Map("map contains no points".to_string()));
    }
    Ok(cloud)
}
