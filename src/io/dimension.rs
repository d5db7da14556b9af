//! Named point dimensions, following PDAL's naming of the LAS fields
//! (`Classification`, `GpsTime`, `Red`, ...). Anything that is not a standard
//! field is an extra dimension looked up in the cloud's [`ExtraBytesLayout`].
use las::point::{Classification, Format, ScanDirection};
use las::{Color, Point};

use crate::error::{Error, Result};
use crate::io::extra_bytes::ExtraBytesLayout;
use crate::types::DimensionType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    X,
    Y,
    Z,
    Intensity,
    ReturnNumber,
    NumberOfReturns,
    ScanDirectionFlag,
    EdgeOfFlightLine,
    Classification,
    Synthetic,
    KeyPoint,
    Withheld,
    Overlap,
    ScanChannel,
    ScanAngleRank,
    UserData,
    PointSourceId,
    GpsTime,
    Red,
    Green,
    Blue,
    Infrared,
    Extra(String),
}

const STANDARD: [Dimension; 22] = [
    Dimension::X,
    Dimension::Y,
    Dimension::Z,
    Dimension::Intensity,
    Dimension::ReturnNumber,
    Dimension::NumberOfReturns,
    Dimension::ScanDirectionFlag,
    Dimension::EdgeOfFlightLine,
    Dimension::Classification,
    Dimension::Synthetic,
    Dimension::KeyPoint,
    Dimension::Withheld,
    Dimension::Overlap,
    Dimension::ScanChannel,
    Dimension::ScanAngleRank,
    Dimension::UserData,
    Dimension::PointSourceId,
    Dimension::GpsTime,
    Dimension::Red,
    Dimension::Green,
    Dimension::Blue,
    Dimension::Infrared,
];

impl Dimension {
    /// Standard names match case-insensitively; anything else is an extra dimension
    pub fn parse(name: &str) -> Dimension {
        STANDARD
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| Dimension::Extra(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Dimension::X => "X",
            Dimension::Y => "Y",
            Dimension::Z => "Z",
            Dimension::Intensity => "Intensity",
            Dimension::ReturnNumber => "ReturnNumber",
            Dimension::NumberOfReturns => "NumberOfReturns",
            Dimension::ScanDirectionFlag => "ScanDirectionFlag",
            Dimension::EdgeOfFlightLine => "EdgeOfFlightLine",
            Dimension::Classification => "Classification",
            Dimension::Synthetic => "Synthetic",
            Dimension::KeyPoint => "KeyPoint",
            Dimension::Withheld => "Withheld",
            Dimension::Overlap => "Overlap",
            Dimension::ScanChannel => "ScanChannel",
            Dimension::ScanAngleRank => "ScanAngleRank",
            Dimension::UserData => "UserData",
            Dimension::PointSourceId => "PointSourceId",
            Dimension::GpsTime => "GpsTime",
            Dimension::Red => "Red",
            Dimension::Green => "Green",
            Dimension::Blue => "Blue",
            Dimension::Infrared => "Infrared",
            Dimension::Extra(name) => name,
        }
    }

    pub fn is_extra(&self) -> bool {
        matches!(self, Dimension::Extra(_))
    }

    /// Storage type used when a standard field is copied into an extra dimension
    pub fn natural_type(&self) -> DimensionType {
        match self {
            Dimension::X | Dimension::Y | Dimension::Z | Dimension::GpsTime => {
                DimensionType::Float64
            }
            Dimension::ScanAngleRank => DimensionType::Float32,
            Dimension::Intensity
            | Dimension::PointSourceId
            | Dimension::Red
            | Dimension::Green
            | Dimension::Blue
            | Dimension::Infrared => DimensionType::Uint16,
            Dimension::Extra(_) => DimensionType::Float64,
            _ => DimensionType::Uint8,
        }
    }

    /// Standard dimensions carried by a point format, in PDAL order
    pub fn standard_for_format(format: &Format) -> Vec<Dimension> {
        STANDARD
            .iter()
            .filter(|d| match d {
                Dimension::Overlap | Dimension::ScanChannel => format.is_extended,
                Dimension::GpsTime => format.has_gps_time,
                Dimension::Red | Dimension::Green | Dimension::Blue => format.has_color,
                Dimension::Infrared => format.has_nir,
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// Value of the dimension on a point; `None` when the point does not carry it
    pub fn get(&self, point: &Point, layout: &ExtraBytesLayout) -> Option<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Some(match self {
            Dimension::X => point.x,
            Dimension::Y => point.y,
            Dimension::Z => point.z,
            Dimension::Intensity => point.intensity as f64,
            Dimension::ReturnNumber => point.return_number as f64,
            Dimension::NumberOfReturns => point.number_of_returns as f64,
            Dimension::ScanDirectionFlag => {
                flag(point.scan_direction == ScanDirection::LeftToRight)
            }
            Dimension::EdgeOfFlightLine => flag(point.is_edge_of_flight_line),
            Dimension::Classification => u8::from(point.classification) as f64,
            Dimension::Synthetic => flag(point.is_synthetic),
            Dimension::KeyPoint => flag(point.is_key_point),
            Dimension::Withheld => flag(point.is_withheld),
            Dimension::Overlap => flag(point.is_overlap),
            Dimension::ScanChannel => point.scanner_channel as f64,
            Dimension::ScanAngleRank => point.scan_angle as f64,
            Dimension::UserData => point.user_data as f64,
            Dimension::PointSourceId => point.point_source_id as f64,
            Dimension::GpsTime => point.gps_time?,
            Dimension::Red => point.color?.red as f64,
            Dimension::Green => point.color?.green as f64,
            Dimension::Blue => point.color?.blue as f64,
            Dimension::Infrared => point.nir? as f64,
            Dimension::Extra(name) => layout.get(point, layout.find(name)?),
        })
    }

    /// Set the dimension on a point. Integer fields are rounded and saturated.
    pub fn set(&self, point: &mut Point, layout: &ExtraBytesLayout, value: f64) -> Result<()> {
        let int = value.round();
        match self {
            Dimension::X => point.x = value,
            Dimension::Y => point.y = value,
            Dimension::Z => point.z = value,
            Dimension::Intensity => point.intensity = int as u16,
            Dimension::ReturnNumber => point.return_number = int as u8,
            Dimension::NumberOfReturns => point.number_of_returns = int as u8,
            Dimension::ScanDirectionFlag => {
                point.scan_direction = if int != 0.0 {
                    ScanDirection::LeftToRight
                } else {
                    ScanDirection::RightToLeft
                }
            }
            Dimension::EdgeOfFlightLine => point.is_edge_of_flight_line = int != 0.0,
            Dimension::Classification => {
                point.classification = Classification::new(int as u8)?;
            }
            Dimension::Synthetic => point.is_synthetic = int != 0.0,
            Dimension::KeyPoint => point.is_key_point = int != 0.0,
            Dimension::Withheld => point.is_withheld = int != 0.0,
            Dimension::Overlap => point.is_overlap = int != 0.0,
            Dimension::ScanChannel => point.scanner_channel = int as u8,
            Dimension::ScanAngleRank => point.scan_angle = value as f32,
            Dimension::UserData => point.user_data = int as u8,
            Dimension::PointSourceId => point.point_source_id = int as u16,
            Dimension::GpsTime => point.gps_time = Some(value),
            Dimension::Red => point.color.get_or_insert_with(Color::default).red = int as u16,
            Dimension::Green => point.color.get_or_insert_with(Color::default).green = int as u16,
            Dimension::Blue => point.color.get_or_insert_with(Color::default).blue = int as u16,
            Dimension::Infrared => point.nir = Some(int as u16),
            Dimension::Extra(name) => {
                let index = layout.find(name).ok_or_else(|| {
                    Error::Dimension(format!("Dimension {} not found in point cloud", name))
                })?;
                layout.set(point, index, value);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Dimension {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Dimension::parse(s))
    }
}
