//! Removal of dimensions from a LAS file.
use std::path::Path;

use tracing::info;

use crate::api::las_info::writer_params_from_header;
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::{PointCloud, read_point_cloud};

/// Drop extra dimensions from the layout. Standard fields cannot leave their
/// record format and are zeroed instead.
pub fn remove_dimensions_from_cloud(cloud: &mut PointCloud, dims: &[Dimension]) -> Result<()> {
    for dim in dims {
        if matches!(dim, Dimension::X | Dimension::Y | Dimension::Z) {
            return Err(Error::Dimension(format!(
                "Dimension {} is mandatory and cannot be removed",
                dim
            )));
        }
    }
    for dim in dims.iter().filter(|d| !d.is_extra()) {
        for point in cloud.points.iter_mut() {
            dim.set(point, &cloud.layout, 0.0)?;
        }
    }
    let layout = cloud
        .layout
        .retain(|name| !dims.iter().any(|d| d.is_extra() && d.name() == name));
    cloud.set_layout(layout);
    Ok(())
}

/// Rewrite `input_las` without `dims`, with its own writer parameters
pub fn remove_dimensions<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<str>>(
    input_las: P,
    dims: &[S],
    output_las: Q,
) -> Result<()> {
    let mut cloud = read_point_cloud(&input_las)?;
    let dims: Vec<Dimension> = dims.iter().map(|d| Dimension::parse(d.as_ref())).collect();
    remove_dimensions_from_cloud(&mut cloud, &dims)?;
    let params = writer_params_from_header(&cloud.header, None)?;
    cloud.write(&output_las, &params)?;
    info!(
        "Removed {} dimension(s) from {} into {}",
        dims.len(),
        input_las.as_ref().display(),
        output_las.as_ref().display()
    );
    Ok(())
}
