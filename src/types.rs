//! Shared types and enums used across the tools.
//! Includes `Bounds` (2D tile/cloud extents), `RecordFormat` (standard LAS
//! record formats) and `DimensionType` (storage type of extra dimensions).
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 2D extent in map units, ordered like PDAL's `([minx, maxx], [miny, maxy])`
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub minx: f64,
    pub maxx: f64,
    pub miny: f64,
    pub maxy: f64,
}

impl Bounds {
    pub fn new(minx: f64, maxx: f64, miny: f64, maxy: f64) -> Self {
        Self {
            minx,
            maxx,
            miny,
            maxy,
        }
    }

    /// Grow (or shrink, with a negative value) the extent on every side
    pub fn buffered(&self, buffer: f64) -> Self {
        Self {
            minx: self.minx - buffer,
            maxx: self.maxx + buffer,
            miny: self.miny - buffer,
            maxy: self.maxy + buffer,
        }
    }

    /// Inclusive on every edge, like PDAL's `filters.crop`
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.minx && x <= self.maxx && y >= self.miny && y <= self.maxy
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// `([minx, maxx], [miny, maxy])`
    pub fn as_xy_ranges(&self) -> ([f64; 2], [f64; 2]) {
        ([self.minx, self.maxx], [self.miny, self.maxy])
    }

    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::Coord {
                x: self.minx,
                y: self.miny,
            },
            geo::Coord {
                x: self.maxx,
                y: self.maxy,
            },
        )
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "([{}, {}], [{}, {}])",
            self.minx, self.maxx, self.miny, self.maxy
        )
    }
}

/// Record formats accepted by the standardization tool
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum RecordFormat {
    /// No color
    Format6,
    /// RGB + NIR
    Format8,
}

impl RecordFormat {
    pub fn id(&self) -> u8 {
        match self {
            RecordFormat::Format6 => 6,
            RecordFormat::Format8 => 8,
        }
    }
}

// Manual implementation so that the values read "6" and "8" on the command line
impl clap::ValueEnum for RecordFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[RecordFormat::Format6, RecordFormat::Format8]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            RecordFormat::Format6 => clap::builder::PossibleValue::new("6").help("no color"),
            RecordFormat::Format8 => {
                clap::builder::PossibleValue::new("8").help("4 color channels")
            }
        })
    }
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Storage type of an extra dimension (LAS "extra bytes" data types 1 to 10)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float32,
    Float64,
}

impl DimensionType {
    /// Data type code of the extra bytes descriptor
    pub fn code(&self) -> u8 {
        match self {
            DimensionType::Uint8 => 1,
            DimensionType::Int8 => 2,
            DimensionType::Uint16 => 3,
            DimensionType::Int16 => 4,
            DimensionType::Uint32 => 5,
            DimensionType::Int32 => 6,
            DimensionType::Uint64 => 7,
            DimensionType::Int64 => 8,
            DimensionType::Float32 => 9,
            DimensionType::Float64 => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => DimensionType::Uint8,
            2 => DimensionType::Int8,
            3 => DimensionType::Uint16,
            4 => DimensionType::Int16,
            5 => DimensionType::Uint32,
            6 => DimensionType::Int32,
            7 => DimensionType::Uint64,
            8 => DimensionType::Int64,
            9 => DimensionType::Float32,
            10 => DimensionType::Float64,
            _ => return None,
        })
    }

    pub fn size(&self) -> usize {
        match self {
            DimensionType::Uint8 | DimensionType::Int8 => 1,
            DimensionType::Uint16 | DimensionType::Int16 => 2,
            DimensionType::Uint32 | DimensionType::Int32 | DimensionType::Float32 => 4,
            DimensionType::Uint64 | DimensionType::Int64 | DimensionType::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DimensionType::Float32 | DimensionType::Float64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DimensionType::Int8 | DimensionType::Int16 | DimensionType::Int32 | DimensionType::Int64
        )
    }
}

impl FromStr for DimensionType {
    type Err = Error;

    /// Accepts numpy names (`float64`, `uint16`, ...) and PDAL names
    /// (`double`, `ushort`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "uint8" | "uint8_t" | "uchar" | "unsigned char" => DimensionType::Uint8,
            "int8" | "int8_t" | "char" | "signed char" => DimensionType::Int8,
            "uint16" | "uint16_t" | "ushort" | "unsigned short" => DimensionType::Uint16,
            "int16" | "int16_t" | "short" => DimensionType::Int16,
            "uint32" | "uint32_t" | "uint" | "ulong" | "unsigned" => DimensionType::Uint32,
            "int32" | "int32_t" | "int" | "long" => DimensionType::Int32,
            "uint64" | "uint64_t" | "ulonglong" => DimensionType::Uint64,
            "int64" | "int64_t" | "longlong" => DimensionType::Int64,
            "float32" | "float" => DimensionType::Float32,
            "float64" | "double" => DimensionType::Float64,
            _ => {
                return Err(Error::Dimension(format!(
                    "Unsupported dimension type: {}. Supported types: float32, float64, int8, \
                     int16, int32, int64, uint8, uint16, uint32, uint64",
                    s
                )));
            }
        })
    }
}

impl std::fmt::Display for DimensionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DimensionType::Uint8 => "uint8",
            DimensionType::Int8 => "int8",
            DimensionType::Uint16 => "uint16",
            DimensionType::Int16 => "int16",
            DimensionType::Uint32 => "uint32",
            DimensionType::Int32 => "int32",
            DimensionType::Uint64 => "uint64",
            DimensionType::Int64 => "int64",
            DimensionType::Float32 => "float32",
            DimensionType::Float64 => "float64",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_buffer_and_contains() {
        let b = Bounds::new(0.0, 10.0, 100.0, 110.0).buffered(5.0);
        assert_eq!(b, Bounds::new(-5.0, 15.0, 95.0, 115.0));
        assert!(b.contains_xy(-5.0, 115.0));
        assert!(!b.contains_xy(-5.01, 100.0));
    }

    #[test]
    fn dimension_type_names() {
        assert_eq!(
            "double".parse::<DimensionType>().unwrap(),
            DimensionType::Float64
        );
        assert_eq!(
            "ushort".parse::<DimensionType>().unwrap(),
            DimensionType::Uint16
        );
        assert_eq!(
            "int16".parse::<DimensionType>().unwrap(),
            DimensionType::Int16
        );
        let err = "complex128".parse::<DimensionType>().unwrap_err();
        assert!(err.to_string().contains("Unsupported dimension type: complex128"));
    }

    #[test]
    fn dimension_type_codes_are_consistent() {
        for code in 1..=10u8 {
            let t = DimensionType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(DimensionType::from_code(0).is_none());
        assert!(DimensionType::from_code(11).is_none());
    }
}
