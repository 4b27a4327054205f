//! Tile directory naming convention.
//!
//! Version 1 of the convention names a tile directory `{prefix}_{index}`:
//! the final underscore-delimited field is the tile's unsigned decimal index
//! within its mosaic, and everything before it is the mosaic prefix (which
//! may itself contain underscores). Acquisition-log filenames reuse the same
//! stem, so `scan_01_07/` and the log entry `scan_01_07.tif` resolve to the
//! same identity.
//!
//! Examples:
//! - `scan_01_07` → prefix `scan_01`, index `7`
//! - `converted_img_02_11` → prefix `converted_img_02`, index `11`
//!
//! The convention is deliberately strict: a name that does not end in
//! `_<digits>` is rejected with a typed error rather than guessed at.

use regex::Regex;
use std::sync::OnceLock;

/// Parsed tile identity under naming convention v1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileName {
    /// Mosaic prefix (everything before the final underscore field).
    pub prefix: String,
    /// Tile index within the mosaic.
    pub index: u32,
}

impl std::fmt::Display for TileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{:02}", self.prefix, self.index)
    }
}

/// Error parsing a tile directory or exposure filename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileNameError {
    /// Name doesn't match the `{prefix}_{index}` convention.
    #[error("name {0:?} doesn't match the <prefix>_<index> convention")]
    InvalidPattern(String),

    /// Index field is present but doesn't fit in a u32.
    #[error("tile index out of range in {0:?}")]
    IndexOutOfRange(String),
}

/// Tile name pattern for convention v1.
///
/// Pattern: `<prefix>_<index>` where index is the trailing digit run.
/// We capture:
/// - Group 1: prefix (non-empty, anything up to the final underscore)
/// - Group 2: index (unsigned decimal)
fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)_(\d+)$").unwrap())
}

/// Parse a tile directory name into its `(prefix, index)` identity.
///
/// # Examples
///
/// ```
/// use stackstitch::tile::parse_tile_name;
///
/// let name = parse_tile_name("scan_01_07").unwrap();
/// assert_eq!(name.prefix, "scan_01");
/// assert_eq!(name.index, 7);
/// ```
pub fn parse_tile_name(name: &str) -> Result<TileName, TileNameError> {
    let captures = tile_pattern()
        .captures(name)
        .ok_or_else(|| TileNameError::InvalidPattern(name.to_string()))?;

    let prefix = captures.get(1).unwrap().as_str().to_string();
    let index_str = captures.get(2).unwrap().as_str();
    let index = index_str
        .parse::<u32>()
        .map_err(|_| TileNameError::IndexOutOfRange(name.to_string()))?;

    Ok(TileName { prefix, index })
}

/// Parse the identity out of an acquisition-log `Filename` field.
///
/// Log entries carry the exposure filename (`scan_01_07.tif`); the identity
/// is the stem under the same convention as directory names.
pub fn parse_log_filename(filename: &str) -> Result<TileName, TileNameError> {
    let stem = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .split('.')
        .next()
        .unwrap_or(filename);
    parse_tile_name(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let name = parse_tile_name("scan_01_07").unwrap();
        assert_eq!(name.prefix, "scan_01");
        assert_eq!(name.index, 7);
    }

    #[test]
    fn test_parse_multi_underscore_prefix() {
        let name = parse_tile_name("converted_img_02_11").unwrap();
        assert_eq!(name.prefix, "converted_img_02");
        assert_eq!(name.index, 11);
    }

    #[test]
    fn test_parse_zero_padded_index() {
        let name = parse_tile_name("scan_01_007").unwrap();
        assert_eq!(name.index, 7);
    }

    #[test]
    fn test_parse_no_underscore() {
        let result = parse_tile_name("scan01");
        assert!(matches!(result, Err(TileNameError::InvalidPattern(_))));
    }

    #[test]
    fn test_parse_trailing_field_not_numeric() {
        let result = parse_tile_name("scan_01_final");
        assert!(matches!(result, Err(TileNameError::InvalidPattern(_))));
    }

    #[test]
    fn test_parse_empty_name() {
        let result = parse_tile_name("");
        assert!(matches!(result, Err(TileNameError::InvalidPattern(_))));
    }

    #[test]
    fn test_parse_index_overflow() {
        let result = parse_tile_name("scan_01_99999999999");
        assert!(matches!(result, Err(TileNameError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_parse_log_filename_strips_extension() {
        let name = parse_log_filename("scan_01_07.tif").unwrap();
        assert_eq!(name.prefix, "scan_01");
        assert_eq!(name.index, 7);
    }

    #[test]
    fn test_parse_log_filename_with_path() {
        let name = parse_log_filename("raw/scan_01_07.tif").unwrap();
        assert_eq!(name.prefix, "scan_01");
        assert_eq!(name.index, 7);
    }

    #[test]
    fn test_display_round_trips_identity() {
        let name = parse_tile_name("scan_01_07").unwrap();
        assert_eq!(parse_tile_name(&name.to_string()).unwrap(), name);
    }
}
