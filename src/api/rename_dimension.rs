//! Renaming of LAS dimensions.
use std::path::Path;

use tracing::{debug, info};

use crate::api::las_info::writer_params_from_header;
use crate::api::remove_dimensions::remove_dimensions_from_cloud;
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::{PointCloud, read_point_cloud};
use crate::types::DimensionType;

fn storage_type(cloud: &PointCloud, dim: &Dimension) -> DimensionType {
    match dim {
        Dimension::Extra(name) => cloud
            .layout
            .find(name)
            .and_then(|index| cloud.layout.dims()[index].data_type())
            .unwrap_or(DimensionType::Float64),
        standard => standard.natural_type(),
    }
}

fn rename_in_cloud(cloud: &mut PointCloud, old: &Dimension, new: &Dimension) -> Result<()> {
    if !cloud.has_dimension(old) {
        return Err(Error::Dimension(format!(
            "Dimension {} not found in point cloud",
            old
        )));
    }
    if old.is_extra() && new.is_extra() {
        // extra bytes stay in place, only the descriptor changes
        return cloud.layout.rename(old.name(), new.name());
    }
    debug!("Copying {} into {}", old, new);
    let values = cloud.values(old);
    if new.is_extra() && !cloud.has_dimension(new) {
        let data_type = storage_type(cloud, old);
        cloud.add_dimension(new.name(), data_type)?;
    }
    for (point, value) in cloud.points.iter_mut().zip(values) {
        new.set(point, &cloud.layout, value)?;
    }
    remove_dimensions_from_cloud(cloud, std::slice::from_ref(old))
}

/// Rename `old_dims[i]` to `new_dims[i]`. New names cannot be X, Y or Z.
pub fn rename_dimension<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<str>>(
    input_file: P,
    output_file: Q,
    old_dims: &[S],
    new_dims: &[S],
) -> Result<()> {
    if old_dims.len() != new_dims.len() {
        return Err(Error::InvalidArgument {
            arg: "new_dims",
            value: "Number of old dimensions must match number of new dimensions".to_string(),
        });
    }
    for dim in new_dims {
        let dim = dim.as_ref();
        if ["x", "y", "z"].contains(&dim.to_ascii_lowercase().as_str()) {
            return Err(Error::Dimension(format!(
                "New dimension {} cannot be a mandatory dimension (X,Y,Z,x,y,z)",
                dim
            )));
        }
    }

    let mut cloud = read_point_cloud(&input_file)?;
    for (old, new) in old_dims.iter().zip(new_dims) {
        let old = Dimension::parse(old.as_ref());
        let new = Dimension::parse(new.as_ref());
        rename_in_cloud(&mut cloud, &old, &new)?;
    }
    let params = writer_params_from_header(&cloud.header, None)?;
    cloud.write(&output_file, &params)?;
    info!(
        "Renamed {} dimension(s) into {}",
        old_dims.len(),
        output_file.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_random_laz::{RandomLazParams, create_random_laz};

    fn input(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("input.las");
        create_random_laz(
            &path,
            &RandomLazParams {
                point_format: 6,
                num_points: 30,
                extra_dims: vec![
                    ("height".into(), "float64".into()),
                    ("marker".into(), "int16".into()),
                ],
                seed: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        path
    }

    #[test]
    fn extra_dims_keep_values_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("renamed.las");
        rename_dimension(&input, &output, &["height", "marker"], &["elevation", "flag"]).unwrap();

        let before = read_point_cloud(&input).unwrap();
        let after = read_point_cloud(&output).unwrap();
        assert_eq!(after.layout.names(), vec!["elevation", "flag"]);
        assert_eq!(
            after.layout.dims()[1].data_type(),
            Some(DimensionType::Int16)
        );
        assert_eq!(
            before.values(&Dimension::parse("height")),
            after.values(&Dimension::parse("elevation"))
        );
    }

    #[test]
    fn standard_field_into_extra_dim() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("renamed.las");
        rename_dimension(&input, &output, &["Intensity"], &["old_intensity"]).unwrap();

        let before = read_point_cloud(&input).unwrap();
        let after = read_point_cloud(&output).unwrap();
        assert_eq!(
            before.values(&Dimension::Intensity),
            after.values(&Dimension::parse("old_intensity"))
        );
        assert!(after.values(&Dimension::Intensity).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn invalid_renames() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("renamed.las");
        let err = rename_dimension(&input, &output, &["height", "marker"], &["z_height"]).unwrap_err();
        assert!(err.to_string().contains("must match"));
        let err = rename_dimension(&input, &output, &["height"], &["z"]).unwrap_err();
        assert!(err.to_string().contains("cannot be a mandatory dimension"));
        assert!(rename_dimension(&input, &output, &["missing"], &["other"]).is_err());
    }
}
