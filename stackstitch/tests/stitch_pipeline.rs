//! End-to-end pipeline tests over a synthetic scan directory.
//!
//! The fixtures fabricate what an acquisition run leaves on disk: one
//! directory of z-stack exposures per tile plus an XML log per mosaic.
//! Tiles are cut from a shared procedural scene so the overlap estimator
//! has real texture to match on, and each z-stack splits its tile into a
//! left-dark and a right-dark exposure so flattening actually has to
//! merge something.

use image::{Rgba, RgbaImage};
use stackstitch::app::{StitchApp, StitchConfig};
use std::path::Path;

const TILE_W: u32 = 300;
const TILE_H: u32 = 96;
const OVERLAP: u32 = 40;
const STEP: u32 = TILE_W - OVERLAP;

/// Dim deterministic texture; values stay under 26 so the default 10x
/// contrast gain has headroom.
fn texel(x: u32, y: u32) -> u8 {
    ((x.wrapping_mul(37) ^ y.wrapping_mul(101)).wrapping_add(x * y * 13) % 26) as u8
}

/// Writes one tile directory holding a two-exposure z-stack.
///
/// The tile shows the scene region starting at `(scene_x, scene_y)`.
/// Exposure 0 blacks out the right half, exposure 1 the left half; the
/// per-pixel maximum projection reconstructs the full tile.
fn write_tile(root: &Path, prefix: &str, index: u32, scene_x: u32, scene_y: u32) {
    let dir = root.join(format!("{}_{:02}", prefix, index));
    std::fs::create_dir(&dir).unwrap();

    for (exposure, keep_left) in [(0u32, true), (1, false)] {
        let img = RgbaImage::from_fn(TILE_W, TILE_H, |x, y| {
            let visible = (x < TILE_W / 2) == keep_left;
            let v = if visible {
                texel(x + scene_x, y + scene_y)
            } else {
                0
            };
            Rgba([v, v, v, 255])
        });
        img.save(dir.join(format!("z{}.tif", exposure))).unwrap();
    }
}

fn write_log(root: &Path, prefix: &str, entries: &[(u32, u32, u32)]) {
    let mut xml = String::from("<XYStage><Mosaic>");
    for (index, row, col) in entries {
        xml.push_str(&format!(
            "<ImageInfo><Filename>{prefix}_{index:02}.tif</Filename>\
             <Xno>{col}</Xno><Yno>{row}</Yno></ImageInfo>"
        ));
    }
    xml.push_str("</Mosaic></XYStage>");
    std::fs::write(root.join(format!("{prefix}.log")), xml).unwrap();
}

/// Lays out a grid of overlapping tiles for one prefix, rows vertically
/// disjoint, horizontal neighbours sharing `OVERLAP` scene pixels.
fn write_grid(root: &Path, prefix: &str, rows: u32, cols: u32) {
    let mut entries = Vec::new();
    let mut index = 1;
    for row in 0..rows {
        for col in 0..cols {
            write_tile(root, prefix, index, col * STEP, row * TILE_H);
            entries.push((index, row, col));
            index += 1;
        }
    }
    write_log(root, prefix, &entries);
}

#[tokio::test]
async fn test_two_by_two_scan_stitches_to_one_mosaic() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scan");
    let out = tmp.path().join("out");
    std::fs::create_dir(&input).unwrap();
    write_grid(&input, "scan_01", 2, 2);

    let mut config = StitchConfig::new(&input, &out);
    config.worker_limit = 2;
    let batch = StitchApp::new(config).run().await.unwrap();

    assert_eq!(batch.mosaics.len(), 1);
    assert_eq!(batch.completed(), 1, "failure: {:?}", batch.mosaics[0].failure);

    // Flattened composites, both row rasters and the mosaic are on disk.
    for index in 1..=4 {
        assert!(out.join(format!("scan_01_{:02}.tif", index)).exists());
    }
    assert!(out.join("stitched_row_scan_01_0.tif").exists());
    assert!(out.join("stitched_row_scan_01_1.tif").exists());
    let mosaic_path = out.join("stitched_mosaic_scan_01.tif");
    assert!(mosaic_path.exists());

    let mosaic = image::open(&mosaic_path).unwrap().to_rgba8();
    // Two rows stack to full height; width is one cropped tile plus one
    // full tile, within the estimator's tolerance.
    assert_eq!(mosaic.height(), 2 * TILE_H);
    let expected_w = STEP + TILE_W;
    assert!(
        mosaic.width().abs_diff(expected_w) <= 4,
        "mosaic width {} (expected ~{})",
        mosaic.width(),
        expected_w
    );

    // The left column is never cropped, and row r sits at y = r * TILE_H
    // showing the scene from that same offset, so mosaic pixels there map
    // straight onto scene coordinates.
    for (x, y) in [(10u32, 10u32), (10, TILE_H + 10), (40, 50)] {
        assert_eq!(mosaic.get_pixel(x, y).0[0], texel(x, y));
    }
}

#[tokio::test]
async fn test_failed_mosaic_does_not_block_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scan");
    let out = tmp.path().join("out");
    std::fs::create_dir(&input).unwrap();

    // A healthy single-row mosaic...
    write_grid(&input, "scan_01", 1, 2);

    // ...and a sibling whose only exposure is undecodable.
    let broken = input.join("scan_02_01");
    std::fs::create_dir(&broken).unwrap();
    std::fs::write(broken.join("z0.tif"), b"not a raster").unwrap();
    write_log(&input, "scan_02", &[(1, 0, 0)]);

    let batch = StitchApp::new(StitchConfig::new(&input, &out)).run().await.unwrap();

    assert_eq!(batch.mosaics.len(), 2);
    assert_eq!(batch.completed(), 1);
    assert_eq!(batch.failed(), 1);

    let good = batch.mosaics.iter().find(|m| m.prefix == "scan_01").unwrap();
    let bad = batch.mosaics.iter().find(|m| m.prefix == "scan_02").unwrap();
    assert!(good.is_complete(), "failure: {:?}", good.failure);
    assert!(!bad.is_complete());
    assert!(out.join("stitched_mosaic_scan_01.tif").exists());
    assert!(!out.join("stitched_mosaic_scan_02.tif").exists());
}

#[tokio::test]
async fn test_estimation_failure_in_one_mosaic_does_not_block_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scan");
    let out = tmp.path().join("out");
    std::fs::create_dir(&input).unwrap();

    // A textured mosaic that stitches fine...
    write_grid(&input, "scan_01", 1, 2);

    // ...next to a pair of featureless tiles: every exposure decodes, but
    // the matcher finds nothing to correspond on.
    for index in [1u32, 2] {
        let dir = input.join(format!("scan_02_{:02}", index));
        std::fs::create_dir(&dir).unwrap();
        let flat = RgbaImage::from_pixel(TILE_W, TILE_H, Rgba([5, 5, 5, 255]));
        flat.save(dir.join("z0.tif")).unwrap();
    }
    write_log(&input, "scan_02", &[(1, 0, 0), (2, 0, 1)]);

    let batch = StitchApp::new(StitchConfig::new(&input, &out)).run().await.unwrap();

    let good = batch.mosaics.iter().find(|m| m.prefix == "scan_01").unwrap();
    let bad = batch.mosaics.iter().find(|m| m.prefix == "scan_02").unwrap();
    assert!(good.is_complete(), "failure: {:?}", good.failure);
    assert!(!bad.is_complete());

    // The failure is the estimator coming up empty, and it names the pair.
    let row_failure = bad.rows[0].failure.as_deref().unwrap();
    assert!(
        row_failure.contains("no overlap correspondences"),
        "unexpected failure: {}",
        row_failure
    );
    assert!(row_failure.contains("scan_02_01") && row_failure.contains("scan_02_02"));

    assert!(out.join("stitched_mosaic_scan_01.tif").exists());
    assert!(!out.join("stitched_mosaic_scan_02.tif").exists());
}

#[tokio::test]
async fn test_tiles_without_log_entries_are_left_out() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scan");
    let out = tmp.path().join("out");
    std::fs::create_dir(&input).unwrap();

    // Two placed tiles plus a stray directory no log mentions.
    write_grid(&input, "scan_01", 1, 2);
    write_tile(&input, "scan_01", 9, 0, 0);

    let batch = StitchApp::new(StitchConfig::new(&input, &out)).run().await.unwrap();

    assert_eq!(batch.completed(), 1);
    // The stray tile was never flattened into the output.
    assert!(!out.join("scan_01_09.tif").exists());
}
