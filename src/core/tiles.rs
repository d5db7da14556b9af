//! Tile naming and tile grid arithmetic.
//!
//! Tiles are squares of `tile_width` map units named
//! `prefix1_prefix2_coordx_coordy_suffix`, where the coordinates are the upper
//! left corner divided by `tile_coord_scale` (kilometres for Lambert-93 tiles).
use std::path::Path;

use las::Point;

use crate::error::{Error, Result};
use crate::types::Bounds;

pub const DEFAULT_TILE_WIDTH: f64 = 1000.0;
pub const DEFAULT_TILE_COORD_SCALE: f64 = 1000.0;

/// Parts of a tile filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileName {
    /// `prefix1_prefix2`
    pub prefix: String,
    pub coord_x: i64,
    pub coord_y: i64,
    /// Remainder of the name, extension included
    pub suffix: String,
}

impl TileName {
    fn shifted(&self, dx: i64, dy: i64) -> String {
        format!(
            "{}_{:04}_{:04}_{}",
            self.prefix,
            self.coord_x + dx,
            self.coord_y + dy,
            self.suffix
        )
    }
}

/// Split the base name of a tile file into prefix, coordinates and suffix
pub fn parse_filename<P: AsRef<Path>>(file_name: P) -> Result<TileName> {
    let file_name = file_name.as_ref();
    let base = file_name
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let invalid = || Error::InvalidTileName(base.clone());
    let parts: Vec<&str> = base.splitn(5, '_').collect();
    if parts.len() != 5 {
        return Err(invalid());
    }
    let coord_x = parts[2].parse().map_err(|_| invalid())?;
    let coord_y = parts[3].parse().map_err(|_| invalid())?;
    Ok(TileName {
        prefix: format!("{}_{}", parts[0], parts[1]),
        coord_x,
        coord_y,
        suffix: parts[4].to_string(),
    })
}

/// Names of the 8 tiles around a tile: left column top to bottom, above, below,
/// then right column top to bottom. Neighbouring coordinates differ by
/// `tile_width / tile_coord_scale`.
pub fn neighbor_filenames<P: AsRef<Path>>(
    file_name: P,
    tile_width: f64,
    tile_coord_scale: f64,
) -> Result<Vec<String>> {
    let tile = parse_filename(file_name)?;
    let step = (tile_width / tile_coord_scale).round() as i64;
    Ok([
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, 1),
        (0, -1),
        (1, 1),
        (1, 0),
        (1, -1),
    ]
    .iter()
    .map(|(dx, dy)| tile.shifted(dx * step, dy * step))
    .collect())
}

/// Extent of a tile, known from its filename, grown by `buffer` on every side
pub fn buffered_bounds_from_filename<P: AsRef<Path>>(
    file_name: P,
    buffer: f64,
    tile_width: f64,
    tile_coord_scale: f64,
) -> Result<Bounds> {
    let tile = parse_filename(file_name)?;
    let x = tile.coord_x as f64 * tile_coord_scale;
    let y = tile.coord_y as f64 * tile_coord_scale;
    Ok(Bounds::new(x - buffer, x + tile_width + buffer, y - tile_width - buffer, y + buffer))
}

/// Upper left corner of the tile of `tile_width` that contains the extent.
/// Points lying exactly on the right or bottom edge still belong to the tile.
pub fn infer_tile_origin(
    minx: f64,
    maxx: f64,
    miny: f64,
    maxy: f64,
    tile_width: f64,
) -> Result<(f64, f64)> {
    let tile_x_min = (minx / tile_width).floor();
    let tile_x_max = if maxx.rem_euclid(tile_width) != 0.0 {
        (maxx / tile_width).floor()
    } else {
        (maxx / tile_width).floor() - 1.0
    };
    let tile_y_min = if miny.rem_euclid(tile_width) != 0.0 {
        (miny / tile_width).ceil()
    } else {
        (miny / tile_width).floor() + 1.0
    };
    let tile_y_max = (maxy / tile_width).ceil();

    if tile_x_max == tile_x_min && tile_y_max == tile_y_min {
        Ok((tile_x_min * tile_width, tile_y_max * tile_width))
    } else {
        Err(Error::TileOrigin {
            tile_x_min: tile_x_min as i64,
            tile_x_max: tile_x_max as i64,
            tile_y_min: tile_y_min as i64,
            tile_y_max: tile_y_max as i64,
            tile_width,
        })
    }
}

/// Tile origin of a set of points, after removing a buffer of `buffer_size`
/// around the tile
pub fn pointcloud_origin_from_tile_width(
    points: &[Point],
    tile_width: f64,
    buffer_size: f64,
) -> Result<(f64, f64)> {
    let first = points
        .first()
        .ok_or_else(|| Error::Processing("Cannot infer the tile origin of an empty point cloud".into()))?;
    let init = Bounds::new(first.x, first.x, first.y, first.y);
    let b = points.iter().fold(init, |b, p| Bounds {
        minx: b.minx.min(p.x),
        maxx: b.maxx.max(p.x),
        miny: b.miny.min(p.y),
        maxy: b.maxy.max(p.y),
    });
    let inner = b.buffered(-buffer_size);
    infer_tile_origin(inner.minx, inner.maxx, inner.miny, inner.maxy, tile_width)
}

/// Extent of the tile whose upper left corner is `origin`
pub fn tile_bbox(origin: (f64, f64), tile_width: f64) -> Bounds {
    let (x, y) = origin;
    Bounds::new(x, x + tile_width, y - tile_width, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TILE: &str = "test_data_0770_6278_LA93_IGN69.laz";

    #[test]
    fn filename_parts() {
        let tile = parse_filename(Path::new("/data/in").join(TILE)).unwrap();
        assert_eq!(
            tile,
            TileName {
                prefix: "test_data".into(),
                coord_x: 770,
                coord_y: 6278,
                suffix: "LA93_IGN69.laz".into(),
            }
        );
    }

    #[rstest]
    #[case("short_name.laz")]
    #[case("a_b_xx_6278_c.laz")]
    #[case("a_b_0770_6278")]
    fn invalid_filenames(#[case] name: &str) {
        let err = parse_filename(name).unwrap_err();
        assert!(err.to_string().contains("does not have the expected format"));
    }

    #[test]
    fn neighbors_in_merge_order() {
        let names = neighbor_filenames(TILE, 1000.0, 1000.0).unwrap();
        assert_eq!(
            names,
            vec![
                "test_data_0769_6279_LA93_IGN69.laz",
                "test_data_0769_6278_LA93_IGN69.laz",
                "test_data_0769_6277_LA93_IGN69.laz",
                "test_data_0770_6279_LA93_IGN69.laz",
                "test_data_0770_6277_LA93_IGN69.laz",
                "test_data_0771_6279_LA93_IGN69.laz",
                "test_data_0771_6278_LA93_IGN69.laz",
                "test_data_0771_6277_LA93_IGN69.laz",
            ]
        );
    }

    #[test]
    fn neighbors_of_small_tiles() {
        let names = neighbor_filenames("test_data_77055_627760_LA93_IGN69.las", 50.0, 10.0).unwrap();
        assert_eq!(names[0], "test_data_77050_627765_LA93_IGN69.las");
        assert_eq!(names[7], "test_data_77060_627755_LA93_IGN69.las");
    }

    #[test]
    fn bounds_from_filename() {
        let b = buffered_bounds_from_filename(TILE, 100.0, 1000.0, 1000.0).unwrap();
        assert_eq!(b, Bounds::new(769_900.0, 771_100.0, 6_276_900.0, 6_278_100.0));

        let b = buffered_bounds_from_filename("a_b_0077_0628_c.las", 0.0, 50.0, 10.0).unwrap();
        assert_eq!(b, Bounds::new(770.0, 820.0, 6230.0, 6280.0));
    }

    #[rstest]
    #[case(770_010.0, 770_990.0, 6_277_010.0, 6_277_990.0)]
    // on the left and top edges
    #[case(770_000.0, 770_500.0, 6_277_500.0, 6_278_000.0)]
    // on the right and bottom edges
    #[case(770_500.0, 771_000.0, 6_277_000.0, 6_277_500.0)]
    fn origin_of_a_tile(#[case] minx: f64, #[case] maxx: f64, #[case] miny: f64, #[case] maxy: f64) {
        assert_eq!(
            infer_tile_origin(minx, maxx, miny, maxy, 1000.0).unwrap(),
            (770_000.0, 6_278_000.0)
        );
    }

    #[test]
    fn origin_across_tiles_fails() {
        let err = infer_tile_origin(769_990.0, 770_500.0, 6_277_500.0, 6_277_900.0, 1000.0)
            .unwrap_err();
        assert!(matches!(err, Error::TileOrigin { .. }));
        assert!(infer_tile_origin(770_100.0, 770_500.0, 6_277_500.0, 6_278_001.0, 1000.0).is_err());
    }

    #[test]
    fn origin_of_buffered_points() {
        let point = |x, y| Point {
            x,
            y,
            ..Default::default()
        };
        let points = vec![
            point(769_980.0, 6_277_500.0),
            point(771_020.0, 6_276_980.0),
            point(770_500.0, 6_278_020.0),
        ];
        assert!(pointcloud_origin_from_tile_width(&points, 1000.0, 0.0).is_err());
        assert_eq!(
            pointcloud_origin_from_tile_width(&points, 1000.0, 20.0).unwrap(),
            (770_000.0, 6_278_000.0)
        );
        assert!(pointcloud_origin_from_tile_width(&[], 1000.0, 0.0).is_err());
    }

    #[test]
    fn bbox_of_origin() {
        assert_eq!(
            tile_bbox((770_000.0, 6_278_000.0), 1000.0),
            Bounds::new(770_000.0, 771_000.0, 6_277_000.0, 6_278_000.0)
        );
    }
}
