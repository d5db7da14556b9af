//! Merging a tile with its existing neighbours.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::api::las_info::writer_params_from_header;
use crate::core::tiles::{DEFAULT_TILE_COORD_SCALE, DEFAULT_TILE_WIDTH, neighbor_filenames};
use crate::error::{Error, Result};
use crate::io::extra_bytes::ExtraBytesLayout;
use crate::io::las::{PointCloud, read_point_cloud};

/// Paths of the neighbours of `input_file` found in `las_dir`, followed by
/// `input_file` itself
pub fn create_list<P: AsRef<Path>, Q: AsRef<Path>>(
    las_dir: P,
    input_file: Q,
    tile_width: f64,
    tile_coord_scale: f64,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(9);
    for name in neighbor_filenames(input_file.as_ref(), tile_width, tile_coord_scale)? {
        let path = las_dir.as_ref().join(name);
        if path.exists() {
            files.push(path);
        } else {
            info!("NOK : {}", path.display());
        }
    }
    files.push(input_file.as_ref().to_path_buf());
    Ok(files)
}

/// `base` followed by the typed dimensions of `other` it lacks
fn union_layout(base: &ExtraBytesLayout, other: &ExtraBytesLayout) -> Result<ExtraBytesLayout> {
    let mut layout = base.clone();
    for dim in other.dims() {
        if layout.find(dim.name()).is_some() {
            continue;
        }
        match dim.data_type() {
            Some(data_type) => {
                layout.push(dim.name(), data_type)?;
            }
            None => warn!(
                "Extra dimension {} has no data type ({} opaque bytes), dropped from the merge",
                dim.name(),
                dim.size()
            ),
        }
    }
    Ok(layout)
}

/// Concatenate clouds. The result has the header of the first cloud and the
/// union of the extra dimensions, missing values being zero.
pub fn merge_clouds(clouds: Vec<PointCloud>) -> Result<PointCloud> {
    let mut clouds = clouds.into_iter();
    let mut merged = clouds.next().ok_or(Error::EmptyTileList)?;
    for mut cloud in clouds {
        let layout = union_layout(&merged.layout, &cloud.layout)?;
        merged.set_layout(layout.clone());
        cloud.set_layout(layout);
        merged.points.append(&mut cloud.points);
    }
    Ok(merged)
}

/// Merge the tile `input_file` (1 km tile named in kilometres) with its
/// neighbours from `las_dir`
pub fn las_merge<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    las_dir: P,
    input_file: Q,
    merge_file: R,
) -> Result<()> {
    let files = create_list(
        las_dir,
        input_file,
        DEFAULT_TILE_WIDTH,
        DEFAULT_TILE_COORD_SCALE,
    )?;
    debug!("Merging {:?}", files);
    let clouds = files
        .iter()
        .map(read_point_cloud)
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_clouds(clouds)?;
    let params = writer_params_from_header(&merged.header, None)?;
    merged.write(&merge_file, &params)?;
    info!(
        "Merged {} files into {} ({} points)",
        files.len(),
        merge_file.as_ref().display(),
        merged.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_random_laz::{RandomLazParams, create_random_laz};
    use crate::types::DimensionType;
    use las::point::Format;
    use las::{Builder, Vlr};

    fn tile(dir: &Path, x: i64, y: i64, extra: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(format!("test_data_{:04}_{:04}_LA93_IGN69.laz", x, y));
        create_random_laz(
            &path,
            &RandomLazParams {
                num_points: 20,
                center: (x as f64 * 1000.0 + 500.0, y as f64 * 1000.0 - 500.0),
                half_width: 500.0,
                extra_dims: extra
                    .iter()
                    .map(|(n, t)| (n.to_string(), t.to_string()))
                    .collect(),
                ..Default::default()
            },
        )
        .unwrap();
        path
    }

    #[test]
    fn list_contains_existing_neighbours_then_the_tile() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path(), 770, 6278, &[]);
        let above = tile(dir.path(), 770, 6279, &[]);
        let left = tile(dir.path(), 769, 6278, &[]);
        let files = create_list(dir.path(), &input, 1000.0, 1000.0).unwrap();
        assert_eq!(files, vec![left, above, input]);
    }

    #[test]
    fn merge_tile_with_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path(), 770, 6278, &[("height", "float32")]);
        tile(dir.path(), 771, 6277, &[("marker", "uint8")]);
        let output = dir.path().join("merged.laz");
        las_merge(dir.path(), &input, &output).unwrap();

        let merged = read_point_cloud(&output).unwrap();
        assert_eq!(merged.len(), 40);
        // the bottom right neighbour comes first in the merge order
        assert_eq!(merged.layout.names(), vec!["marker", "height"]);
        let bounds = merged.bounds().unwrap();
        assert!(bounds.minx < 771_000.0 && bounds.maxx > 771_000.0);
    }

    #[test]
    fn lone_tile_is_merged_alone() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path(), 770, 6278, &[]);
        let output = dir.path().join("merged.laz");
        las_merge(dir.path(), &input, &output).unwrap();
        assert_eq!(read_point_cloud(&output).unwrap().len(), 20);
    }

    fn opaque_layout() -> ExtraBytesLayout {
        let mut descriptor = [0u8; 192];
        // untyped, 4 bytes
        descriptor[3] = 4;
        descriptor[4..10].copy_from_slice(b"opaque");
        let mut builder = Builder::from((1, 4));
        builder.point_format = Format::new(6).unwrap();
        builder.point_format.extra_bytes = 4;
        builder.vlrs.push(Vlr {
            user_id: "LASF_Spec".to_string(),
            record_id: 4,
            description: String::new(),
            data: descriptor.to_vec(),
        });
        ExtraBytesLayout::from_header(&builder.into_header().unwrap()).unwrap()
    }

    #[test]
    fn untyped_dimensions_are_left_out_of_the_union() {
        let opaque = opaque_layout();
        assert_eq!(opaque.names(), vec!["opaque"]);
        assert_eq!(opaque.dims()[0].data_type(), None);

        let mut base = ExtraBytesLayout::default();
        base.push("height", DimensionType::Float32).unwrap();
        let mut other = opaque;
        other.push("marker", DimensionType::Uint8).unwrap();

        let union = union_layout(&base, &other).unwrap();
        assert_eq!(union.names(), vec!["height", "marker"]);
        assert_eq!(union.record_length(), 5);
    }

    #[test]
    fn invalid_tile_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            create_list(dir.path(), "tile.laz", 1000.0, 1000.0),
            Err(Error::InvalidTileName(_))
        ));
        assert!(matches!(merge_clouds(Vec::new()), Err(Error::EmptyTileList)));
    }
}
