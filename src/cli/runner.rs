use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use lidar_tools::api::{
    BufferParams, ColorParams, DownloadParams, RandomLazParams, VirtualPointsParams,
    add_points_from_geometry_to_las, add_points_in_las, color, compare_las_classification,
    compare_las_dimensions, compute_count, create_las_with_buffer, create_random_laz,
    download_image, las_crop, las_info, las_merge, merge_counts, params_from_file,
    parse_dimension_values, parse_precision, read_replacement_map, remove_dimensions,
    rename_dimension, replace_area, replace_values, standardize, transform_geo,
};
use lidar_tools::core::params::{ExtraDims, WriterParams};
use lidar_tools::types::Bounds;

use super::args::{
    AddBufferArgs, AddPointsInPointcloudArgs, CliArgs, ColorArgs, Command, DownloadImageArgs,
    RandomLazArgs, StandardizeArgs,
};
use super::errors::AppError;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn bounds_arg(values: &[f64]) -> Result<Bounds, AppError> {
    match values {
        [minx, maxx, miny, maxy] => Ok(Bounds::new(*minx, *maxx, *miny, *maxy)),
        _ => Err(AppError::InvalidArgument {
            arg: "bounds".to_string(),
            value: format!("{:?} (expected MINX MAXX MINY MAXY)", values),
        }),
    }
}

fn name_type_pairs(items: &[String]) -> Result<Vec<(String, String)>, AppError> {
    items
        .iter()
        .map(|item| {
            item.split_once('=')
                .map(|(name, ty)| (name.trim().to_string(), ty.trim().to_string()))
                .ok_or_else(|| AppError::InvalidExtraDim { spec: item.clone() })
        })
        .collect()
}

fn run_add_buffer(args: AddBufferArgs) -> Result<(), AppError> {
    std::fs::create_dir_all(&args.output_dir)?;
    let file_name = args
        .tile_filename
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| AppError::InvalidArgument {
            arg: "tile_filename".to_string(),
            value: args.tile_filename.display().to_string(),
        })?;
    let output = args.output_dir.join(&file_name);
    let tile = args.input_dir.join(&file_name);
    let params = BufferParams {
        buffer_width: args.buffer_width,
        spatial_ref: args.spatial_reference,
        tile_width: args.tile_width,
        tile_coord_scale: args.tile_coord_scale,
    };
    create_las_with_buffer(&args.input_dir, &tile, &output, &params)?;
    info!("Buffered tile written to {}", output.display());
    Ok(())
}

fn run_download_image(args: DownloadImageArgs) -> Result<(), AppError> {
    let params = DownloadParams {
        proj: args.proj,
        layer: args.layer,
        bounds: bounds_arg(&args.bounds)?,
        pixel_per_meter: args.pixel_per_meter,
        timeout: Duration::from_secs(args.timeout),
        check_images: args.check_images,
        size_max: args.size_max,
    };
    let requests = download_image(&params, &args.output)?;
    info!(
        "Image written to {} ({} request(s))",
        args.output.display(),
        requests
    );
    Ok(())
}

fn run_color(args: ColorArgs) -> Result<(), AppError> {
    // no flag at all colorizes with both streams
    let both = !args.rgb && !args.irc;
    let params = ColorParams {
        proj: args.proj,
        pixel_per_meter: args.resolution,
        timeout: Duration::from_secs(args.timeout),
        rgb: args.rgb || both,
        irc: args.irc || both,
        vegetation: args.vegetation,
        vegetation_dim: args.vegetation_dim,
        check_images: args.check_images,
        stream_rgb: args.stream_rgb,
        stream_irc: args.stream_irc,
        size_max: args.size_max,
    };
    // temporary images are removed when the handles drop
    let _images = color(&args.input, &args.output, &params)?;
    Ok(())
}

fn run_standardize(args: StandardizeArgs) -> Result<(), AppError> {
    let mut params = match &args.params {
        Some(path) => params_from_file(path)?,
        None => WriterParams::default(),
    };
    if let Some(format) = args.record_format {
        params.dataformat_id = format.id();
    }
    if let Some(projection) = args.projection {
        params.a_srs = Some(projection);
    }
    if let Some(extra_dims) = &args.extra_dims {
        params.extra_dims = ExtraDims::from_str(extra_dims)?;
    }
    let written = standardize(&args.input, &args.output, &params, &args.classes_to_remove)?;
    info!("{} points written to {}", written, args.output.display());
    Ok(())
}

fn run_add_points_in_pointcloud(args: AddPointsInPointcloudArgs) -> Result<(), AppError> {
    let params = VirtualPointsParams {
        virtual_points_class: args.virtual_points_class,
        spatial_ref: args.spatial_ref,
        tile_width: args.tile_width,
        spacing: args.spacing,
        altitude_column: args.altitude_column,
    };
    let added =
        add_points_from_geometry_to_las(&args.input_geometry, &args.input_las, &args.output_las, &params)?;
    info!("{} virtual points added", added);
    Ok(())
}

fn run_create_random_laz(args: RandomLazArgs) -> Result<(), AppError> {
    let center = match args.center[..] {
        [x, y] => (x, y),
        _ => {
            return Err(AppError::InvalidArgument {
                arg: "center".to_string(),
                value: format!("{:?}", args.center),
            });
        }
    };
    let params = RandomLazParams {
        point_format: args.point_format,
        num_points: args.num_points,
        crs: args.crs,
        center,
        extra_dims: name_type_pairs(&args.extra_dims)?,
        seed: args.seed,
        ..Default::default()
    };
    let report = create_random_laz(&args.output, &params)?;
    info!(
        "{} points written to {} with dimensions {}",
        report.num_points,
        report.output_file,
        report.dimensions.join(", ")
    );
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(lidar_tools::Error::from)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn dispatch(command: Command) -> Result<(), AppError> {
    match command {
        Command::Info { input } => {
            let info = las_info(&input)?;
            let text = serde_json::to_string_pretty(&info).map_err(lidar_tools::Error::from)?;
            println!("{}", text);
        }
        Command::AddBuffer(args) => run_add_buffer(args)?,
        Command::Clip {
            input,
            output,
            bounds,
            spatial_reference,
        } => {
            let kept = las_crop(&input, &output, &bounds_arg(&bounds)?, &spatial_reference)?;
            info!("{} points kept in {}", kept, output.display());
        }
        Command::Merge {
            input_dir,
            input,
            output,
        } => las_merge(&input_dir, &input, &output)?,
        Command::DownloadImage(args) => run_download_image(args)?,
        Command::Color(args) => run_color(args)?,
        Command::Standardize(args) => run_standardize(args)?,
        Command::AddPointsInPointcloud(args) => run_add_points_in_pointcloud(args)?,
        Command::AddPointsInLas {
            input,
            output,
            input_geo,
            dimensions,
        } => {
            let values = parse_dimension_values(&dimensions)?;
            let output = output.unwrap_or_else(|| input.clone());
            let added = add_points_in_las(&input, &input_geo, &output, &values)?;
            info!("{} points added into {}", added, output.display());
        }
        Command::ReplaceArea {
            target_cloud,
            source_cloud,
            replacement_area,
            filter,
            output,
        } => {
            let counts = replace_area(
                &target_cloud,
                &source_cloud,
                &replacement_area,
                &output,
                filter.as_deref(),
            )?;
            info!(
                "{} target points kept, {} source points added",
                counts.target_kept, counts.source_added
            );
        }
        Command::ReplaceAttribute {
            input,
            output,
            attribute,
            replacement_map,
        } => {
            let map = read_replacement_map(&replacement_map)?;
            let replaced = replace_values(&input, &output, &map, &attribute)?;
            info!("{} values of {} replaced", replaced, attribute);
        }
        Command::Count {
            inputs,
            attribute,
            output,
        } => {
            let counts = compute_count(&inputs, &attribute)?;
            if let Some(output) = output {
                write_json(&output, &counts)?;
            }
        }
        Command::MergeCounts { inputs, output } => {
            merge_counts(&inputs, output.as_deref())?;
        }
        Command::RemoveDimensions {
            input,
            dimensions,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.clone());
            remove_dimensions(&input, &dimensions, &output)?;
        }
        Command::RenameDimension {
            input,
            output,
            old_dims,
            new_dims,
        } => rename_dimension(&input, &output, &old_dims, &new_dims)?,
        Command::CreateRandomLaz(args) => run_create_random_laz(args)?,
        Command::CompareClassification { file1, file2 } => {
            if compare_las_classification(&file1, &file2)? {
                println!("Classification is identical");
            } else {
                return Err(AppError::Differ {
                    details: "classification".to_string(),
                });
            }
        }
        Command::CompareDimensions {
            file1,
            file2,
            dimensions,
            precision,
        } => {
            let precision = parse_precision(&precision)?;
            let result = compare_las_dimensions(&file1, &file2, dimensions.as_deref(), &precision)?;
            if result.identical {
                println!("Dimensions are identical");
            } else {
                println!(
                    "Dimensions differ: {} points ({:.2}%)",
                    result.n_diff, result.percent
                );
                return Err(AppError::Differ {
                    details: format!("{} points", result.n_diff),
                });
            }
        }
        Command::TransformGeo {
            input_geo,
            output_geo,
            interpol_raster,
            segmentation,
            input_geo_snap,
        } => {
            transform_geo(
                &input_geo,
                &output_geo,
                interpol_raster.as_deref(),
                segmentation,
                input_geo_snap.as_deref(),
            )?;
        }
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);
    dispatch(args.command)?;
    Ok(())
}
