use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rstest::rstest;

use lidar_tools::api::{RandomLazParams, las_info};
use lidar_tools::{
    BufferParams, Bounds, WriterParams, buffered_bounds_from_filename, compute_count,
    create_las_with_buffer, create_random_laz, las_merge, standardize,
};

const TILE: &str = "Semis_2021_0770_6278_LA93_IGN69.laz";

/// 1 km tile whose top left corner is (x km, y km)
fn tile(dir: &Path, x: i64, y: i64, seed: u64) -> PathBuf {
    let path = dir.join(format!("Semis_2021_{:04}_{:04}_LA93_IGN69.laz", x, y));
    create_random_laz(
        &path,
        &RandomLazParams {
            point_format: 6,
            num_points: 500,
            center: (x as f64 * 1000.0 + 500.0, y as f64 * 1000.0 - 500.0),
            half_width: 499.0,
            seed: Some(seed),
            ..Default::default()
        },
    )
    .unwrap();
    path
}

fn neighbourhood(dir: &Path) {
    let mut seed = 0;
    for dx in -1..=1 {
        for dy in -1..=1 {
            seed += 1;
            tile(dir, 770 + dx, 6278 + dy, seed);
        }
    }
}

#[rstest]
#[case(0.0, Bounds::new(770_000.0, 771_000.0, 6_277_000.0, 6_278_000.0))]
#[case(100.0, Bounds::new(769_900.0, 771_100.0, 6_276_900.0, 6_278_100.0))]
fn bounds_of_a_buffered_tile(#[case] buffer: f64, #[case] expected: Bounds) {
    let bounds = buffered_bounds_from_filename(TILE, buffer, 1000.0, 1000.0).unwrap();
    assert_eq!(bounds, expected);
}

#[test]
fn buffer_keeps_the_tile_and_the_border_of_its_neighbours() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    neighbourhood(input_dir.path());
    let input = input_dir.path().join(TILE);
    let output = output_dir.path().join(TILE);

    create_las_with_buffer(
        input_dir.path(),
        &input,
        &output,
        &BufferParams {
            buffer_width: 100.0,
            ..Default::default()
        },
    )
    .unwrap();

    let info = las_info(&output).unwrap();
    let expected = Bounds::new(769_900.0, 771_100.0, 6_276_900.0, 6_278_100.0);
    assert!(info.point_count > 500);
    assert!(info.point_count < 9 * 500);
    assert!(info.bounds.minx >= expected.minx && info.bounds.maxx <= expected.maxx);
    assert!(info.bounds.miny >= expected.miny && info.bounds.maxy <= expected.maxy);
    assert_eq!(info.epsg, Some(2154));
}

#[test]
fn merge_without_some_neighbours() {
    let dir = tempfile::tempdir().unwrap();
    let center = tile(dir.path(), 770, 6278, 1);
    tile(dir.path(), 771, 6278, 2);
    let output = dir.path().join("merged.laz");
    las_merge(dir.path(), &center, &output).unwrap();
    assert_eq!(las_info(&output).unwrap().point_count, 1000);
}

#[test]
fn standardized_counts() {
    let dir = tempfile::tempdir().unwrap();
    let input = tile(dir.path(), 770, 6278, 3);
    let output = dir.path().join("standard.laz");

    let before = compute_count(&[input.clone()], "Classification").unwrap();
    let written = standardize(&input, &output, &WriterParams::default(), &[2, 3]).unwrap();
    let after = compute_count(&[output.clone()], "Classification").unwrap();

    let removed = before.get("2").copied().unwrap_or(0) + before.get("3").copied().unwrap_or(0);
    assert_eq!(written as u64, 500 - removed);
    assert_eq!(after.values().sum::<u64>(), written as u64);
    assert!(!after.contains_key("2") && !after.contains_key("3"));

    let info = las_info(&output).unwrap();
    assert_eq!(info.dataformat_id, 6);
    assert_eq!(info.scale, [0.01, 0.01, 0.01]);
    assert_eq!(info.epsg, Some(2154));
}
