use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use lidar_tools::types::RecordFormat;

#[derive(Parser)]
#[command(name = "lidar-tools", version, about = "Tools for LIDAR LAS/LAZ tiles")]
pub struct CliArgs {
    /// Enable debug logging (otherwise RUST_LOG, info by default)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the header summary of a LAS/LAZ file as JSON
    Info {
        /// Input LAS/LAZ file
        input: PathBuf,
    },

    /// Merge a tile with the border of its neighbours
    AddBuffer(AddBufferArgs),

    /// Keep the points of a file inside a bounding box
    Clip {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// minx maxx miny maxy
        #[arg(long, num_args = 4, value_names = ["MINX", "MAXX", "MINY", "MAXY"], allow_negative_numbers = true)]
        bounds: Vec<f64>,
        #[arg(long, default_value = "EPSG:2154")]
        spatial_reference: String,
    },

    /// Merge a tile with its existing neighbours
    Merge {
        /// Directory with the tile and its neighbours
        #[arg(short = 'd', long)]
        input_dir: PathBuf,
        /// Tile file
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Download an orthoimage from the Geoplateforme WMS as a GeoTIFF
    DownloadImage(DownloadImageArgs),

    /// Colorize a point cloud from orthoimages
    Color(ColorArgs),

    /// Rewrite a file with standard writer parameters
    Standardize(StandardizeArgs),

    /// Add virtual points derived from vector geometries to a tile
    AddPointsInPointcloud(AddPointsInPointcloudArgs),

    /// Add one point per vertex of a geometry file, with constant dimension values
    AddPointsInLas {
        #[arg(short, long)]
        input: PathBuf,
        /// Output file, the input is overwritten when missing
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'g', long)]
        input_geo: PathBuf,
        /// Values of the new points, as KEY=VALUE
        #[arg(short, long, num_args = 1.., value_name = "KEY=VALUE")]
        dimensions: Vec<String>,
    },

    /// Replace the points of a target cloud inside polygons by those of a source cloud
    ReplaceArea {
        #[arg(short, long)]
        target_cloud: PathBuf,
        #[arg(short, long)]
        source_cloud: PathBuf,
        /// Vector file with the polygons to replace
        #[arg(short, long)]
        replacement_area: PathBuf,
        /// Filter applied to the target cloud first, e.g. "Classification==2"
        #[arg(short, long)]
        filter: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace values of an attribute following a JSON map {new: [olds]}
    ReplaceAttribute {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value = "Classification")]
        attribute: String,
        #[arg(short = 'm', long)]
        replacement_map: PathBuf,
    },

    /// Count the points for each value of an attribute
    Count {
        /// LAS/LAZ files, or a single directory
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long, default_value = "Classification")]
        attribute: String,
        /// JSON output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sum count files written by `count`
    MergeCounts {
        /// JSON files, or a single directory
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove dimensions from a file
    RemoveDimensions {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, num_args = 1.., required = true)]
        dimensions: Vec<String>,
        /// Output file, the input is overwritten when missing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename dimensions of a file
    RenameDimension {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        old_dims: Vec<String>,
        #[arg(long, num_args = 1.., required = true)]
        new_dims: Vec<String>,
    },

    /// Write a random point cloud
    CreateRandomLaz(RandomLazArgs),

    /// Compare the classification of two files, point by point
    CompareClassification { file1: PathBuf, file2: PathBuf },

    /// Compare dimensions of two files after sorting their points
    CompareDimensions {
        file1: PathBuf,
        file2: PathBuf,
        /// Dimensions to compare, all of them when missing
        #[arg(long, num_args = 1..)]
        dimensions: Option<Vec<String>>,
        /// Tolerances as DIM=VAL, e.g. X=0.001
        #[arg(long, num_args = 1.., value_name = "DIM=VAL")]
        precision: Vec<String>,
    },

    /// Segment, snap and add Z to the geometries of a vector file
    TransformGeo {
        #[arg(short, long)]
        input_geo: PathBuf,
        /// GeoJSON output file (.json or .geojson)
        #[arg(short, long)]
        output_geo: PathBuf,
        /// Raster giving the Z of every vertex
        #[arg(short = 'r', long)]
        interpol_raster: Option<PathBuf>,
        /// Segmentation step of the lines, none when 0
        #[arg(short, long, default_value_t = 0.0)]
        segmentation: f64,
        /// Geometries whose crossings become vertices
        #[arg(short = 'd', long)]
        input_geo_snap: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct AddBufferArgs {
    /// Directory with the tile and its neighbours
    #[arg(short, long)]
    pub input_dir: PathBuf,
    /// Tile file name, under input_dir
    #[arg(short = 'f', long)]
    pub tile_filename: PathBuf,
    /// Output directory, the output keeps the tile file name
    #[arg(short, long)]
    pub output_dir: PathBuf,
    #[arg(short, long, default_value_t = 100.0)]
    pub buffer_width: f64,
    #[arg(long, default_value = "EPSG:2154")]
    pub spatial_reference: String,
    #[arg(long, default_value_t = 1000.0)]
    pub tile_width: f64,
    #[arg(long, default_value_t = 1000.0)]
    pub tile_coord_scale: f64,
}

#[derive(Args)]
pub struct DownloadImageArgs {
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long, default_value_t = 2154)]
    pub proj: u32,
    #[arg(long, default_value = "ORTHOIMAGERY.ORTHOPHOTOS")]
    pub layer: String,
    /// minx maxx miny maxy
    #[arg(long, num_args = 4, value_names = ["MINX", "MAXX", "MINY", "MAXY"], allow_negative_numbers = true)]
    pub bounds: Vec<f64>,
    #[arg(short = 'r', long, default_value_t = 5.0)]
    pub pixel_per_meter: f64,
    /// Request timeout, in seconds
    #[arg(short, long, default_value_t = 300)]
    pub timeout: u64,
    /// Fail when the image is fully white
    #[arg(short, long, default_value_t = false)]
    pub check_images: bool,
    /// Largest image side in one request, larger images are paved
    #[arg(long, default_value_t = 5000)]
    pub size_max: usize,
}

#[derive(Args)]
pub struct ColorArgs {
    #[arg(short, long)]
    pub input: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    /// EPSG code of the images, read from the input file when missing
    #[arg(short, long)]
    pub proj: Option<u32>,
    /// Resolution, in pixel per meter
    #[arg(short = 'r', long, default_value_t = 5.0)]
    pub resolution: f64,
    /// Request timeout, in seconds
    #[arg(short, long, default_value_t = 300)]
    pub timeout: u64,
    /// Colorize Red, Green and Blue (both RGB and IRC without flags)
    #[arg(long, default_value_t = false)]
    pub rgb: bool,
    /// Colorize Infrared
    #[arg(long, default_value_t = false)]
    pub irc: bool,
    /// Raster whose first band goes into an extra dimension
    #[arg(short, long)]
    pub vegetation: Option<PathBuf>,
    #[arg(long, default_value = "Deviation")]
    pub vegetation_dim: String,
    /// Fail when an image is fully white
    #[arg(short, long, default_value_t = false)]
    pub check_images: bool,
    #[arg(long, default_value = "ORTHOIMAGERY.ORTHOPHOTOS")]
    pub stream_rgb: String,
    #[arg(long, default_value = "ORTHOIMAGERY.ORTHOPHOTOS.IRC")]
    pub stream_irc: String,
    #[arg(long, default_value_t = 5000)]
    pub size_max: usize,
}

#[derive(Args)]
pub struct StandardizeArgs {
    #[arg(short, long)]
    pub input: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    /// JSON preset merged over the standard parameters
    #[arg(long)]
    pub params: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub record_format: Option<RecordFormat>,
    /// Output CRS, e.g. EPSG:2154
    #[arg(long)]
    pub projection: Option<String>,
    /// "all", or a comma separated list of name=type
    #[arg(long)]
    pub extra_dims: Option<String>,
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub classes_to_remove: Vec<u8>,
}

#[derive(Args)]
pub struct AddPointsInPointcloudArgs {
    /// Vector file with the points or lines
    #[arg(short = 'g', long)]
    pub input_geometry: PathBuf,
    #[arg(short, long)]
    pub input_las: PathBuf,
    #[arg(short, long)]
    pub output_las: PathBuf,
    #[arg(short = 'c', long, default_value_t = 66)]
    pub virtual_points_class: u8,
    /// CRS of the cloud when its header has none
    #[arg(long)]
    pub spatial_ref: Option<String>,
    #[arg(short = 'w', long, default_value_t = 1000.0)]
    pub tile_width: f64,
    /// Distance between points along lines
    #[arg(short, long, default_value_t = 0.25)]
    pub spacing: f64,
    /// Property holding the Z of 2D geometries
    #[arg(short, long)]
    pub altitude_column: Option<String>,
}

#[derive(Args)]
pub struct RandomLazArgs {
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long, default_value_t = 3)]
    pub point_format: u8,
    #[arg(long, default_value_t = 100)]
    pub num_points: usize,
    #[arg(long, default_value_t = 2154)]
    pub crs: u16,
    #[arg(long, num_args = 2, value_names = ["X", "Y"], default_values_t = [650_000.0, 6_810_000.0])]
    pub center: Vec<f64>,
    /// Extra dimensions as name=type
    #[arg(long, num_args = 1.., value_name = "NAME=TYPE")]
    pub extra_dims: Vec<String>,
    #[arg(long)]
    pub seed: Option<u64>,
}
