//! Tile grid data model.
//!
//! A [`TileRecord`] is one scanned field: its identity under the naming
//! convention, the z-stack exposure files inside its directory, and (after
//! log correlation) its position in the mosaic grid. [`MosaicGroup`] is the
//! per-prefix view the assembler consumes: only tiles with a resolved,
//! unique grid position, plus the derived grid extent.

mod naming;

pub use naming::{parse_log_filename, parse_tile_name, TileName, TileNameError};

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

/// Position of a tile in its mosaic grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    /// Row index (`Yno` in the acquisition log), 0-based.
    pub row: u32,
    /// Column index (`Xno` in the acquisition log), 0-based.
    pub col: u32,
}

/// One scanned tile: identity, source exposures, and grid position.
///
/// Created during metadata correlation. `position` is `None` until the tile
/// is matched to an acquisition-log entry; a tile that never resolves a
/// position cannot be placed and is excluded from assembly.
#[derive(Debug, Clone)]
pub struct TileRecord {
    /// Identity parsed from the directory name.
    pub name: TileName,

    /// Tile directory holding the z-stack exposures.
    pub dir: PathBuf,

    /// Exposure files, lexicographically sorted for deterministic stacking.
    pub exposures: Vec<PathBuf>,

    /// Grid position from the acquisition log, if resolved.
    pub position: Option<GridPos>,
}

impl TileRecord {
    /// Returns the resolved grid position, if any.
    pub fn position(&self) -> Option<GridPos> {
        self.position
    }
}

/// All placeable tiles for one mosaic prefix.
///
/// Grouping is a pure filter over the correlated records: tiles without a
/// resolved position are dropped (never defaulted to the origin), and
/// duplicate `(row, col)` claims are resolved deterministically in favour of
/// the lowest tile index.
#[derive(Debug, Clone)]
pub struct MosaicGroup {
    /// Mosaic prefix shared by every tile in the group.
    pub prefix: String,

    /// Placed tiles; every position is unique within the group.
    pub tiles: Vec<TileRecord>,

    /// `max(row) + 1` over the placed tiles.
    pub row_count: u32,

    /// `max(col) + 1` over the placed tiles.
    pub col_count: u32,
}

impl MosaicGroup {
    /// Tiles of one row, ordered by ascending column.
    pub fn row(&self, row: u32) -> Vec<&TileRecord> {
        let mut tiles: Vec<&TileRecord> = self
            .tiles
            .iter()
            .filter(|t| t.position.map(|p| p.row) == Some(row))
            .collect();
        tiles.sort_by_key(|t| t.position.map(|p| p.col));
        tiles
    }
}

/// Group correlated tile records by mosaic prefix.
///
/// Unplaced tiles are filtered out with a warning; duplicate grid claims
/// keep the lowest tile index. Prefixes whose tiles were all dropped do not
/// produce a group.
pub fn group_by_prefix(records: Vec<TileRecord>) -> Vec<MosaicGroup> {
    let mut by_prefix: BTreeMap<String, Vec<TileRecord>> = BTreeMap::new();

    for record in records {
        match record.position {
            Some(_) => by_prefix
                .entry(record.name.prefix.clone())
                .or_default()
                .push(record),
            None => {
                warn!(
                    prefix = %record.name.prefix,
                    index = record.name.index,
                    "tile has no grid position, excluded from assembly"
                );
            }
        }
    }

    let mut groups = Vec::new();
    for (prefix, mut tiles) in by_prefix {
        // Lowest index wins a contested position.
        tiles.sort_by_key(|t| t.name.index);

        let mut claimed: HashSet<GridPos> = HashSet::new();
        let mut placed = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let pos = tile.position.expect("grouped tiles are placed");
            if claimed.insert(pos) {
                placed.push(tile);
            } else {
                warn!(
                    prefix = %prefix,
                    index = tile.name.index,
                    row = pos.row,
                    col = pos.col,
                    "duplicate grid position, tile dropped"
                );
            }
        }

        if placed.is_empty() {
            continue;
        }

        let row_count = placed
            .iter()
            .filter_map(|t| t.position.map(|p| p.row))
            .max()
            .unwrap_or(0)
            + 1;
        let col_count = placed
            .iter()
            .filter_map(|t| t.position.map(|p| p.col))
            .max()
            .unwrap_or(0)
            + 1;

        groups.push(MosaicGroup {
            prefix,
            tiles: placed,
            row_count,
            col_count,
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prefix: &str, index: u32, position: Option<GridPos>) -> TileRecord {
        TileRecord {
            name: TileName {
                prefix: prefix.to_string(),
                index,
            },
            dir: PathBuf::from(format!("/scan/{}_{:02}", prefix, index)),
            exposures: vec![],
            position,
        }
    }

    #[test]
    fn test_group_splits_prefixes() {
        let records = vec![
            record("scan_01", 1, Some(GridPos { row: 0, col: 0 })),
            record("scan_02", 1, Some(GridPos { row: 0, col: 0 })),
            record("scan_01", 2, Some(GridPos { row: 0, col: 1 })),
        ];

        let groups = group_by_prefix(records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].prefix, "scan_01");
        assert_eq!(groups[0].tiles.len(), 2);
        assert_eq!(groups[1].prefix, "scan_02");
        assert_eq!(groups[1].tiles.len(), 1);
    }

    #[test]
    fn test_group_drops_unplaced_tiles() {
        let records = vec![
            record("scan_01", 1, Some(GridPos { row: 0, col: 0 })),
            record("scan_01", 2, None),
        ];

        let groups = group_by_prefix(records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tiles.len(), 1);
        assert_eq!(groups[0].tiles[0].name.index, 1);
    }

    #[test]
    fn test_group_with_only_unplaced_tiles_is_absent() {
        let records = vec![record("scan_01", 1, None)];
        assert!(group_by_prefix(records).is_empty());
    }

    #[test]
    fn test_duplicate_position_keeps_lowest_index() {
        let records = vec![
            record("scan_01", 5, Some(GridPos { row: 1, col: 1 })),
            record("scan_01", 2, Some(GridPos { row: 1, col: 1 })),
        ];

        let groups = group_by_prefix(records);
        assert_eq!(groups[0].tiles.len(), 1);
        assert_eq!(groups[0].tiles[0].name.index, 2);
    }

    #[test]
    fn test_grid_extent() {
        let records = vec![
            record("scan_01", 1, Some(GridPos { row: 0, col: 0 })),
            record("scan_01", 2, Some(GridPos { row: 2, col: 3 })),
        ];

        let groups = group_by_prefix(records);
        assert_eq!(groups[0].row_count, 3);
        assert_eq!(groups[0].col_count, 4);
    }

    #[test]
    fn test_row_is_ordered_by_column() {
        let records = vec![
            record("scan_01", 3, Some(GridPos { row: 0, col: 2 })),
            record("scan_01", 1, Some(GridPos { row: 0, col: 0 })),
            record("scan_01", 2, Some(GridPos { row: 0, col: 1 })),
            record("scan_01", 4, Some(GridPos { row: 1, col: 0 })),
        ];

        let groups = group_by_prefix(records);
        let row = groups[0].row(0);
        let cols: Vec<u32> = row.iter().map(|t| t.position.unwrap().col).collect();
        assert_eq!(cols, vec![0, 1, 2]);
    }
}
