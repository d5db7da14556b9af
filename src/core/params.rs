use std::str::FromStr;

use las::Header;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::DimensionType;

/// Scale applied by the standard preset (1 cm)
pub const STANDARD_SCALE: f64 = 0.01;
pub const STANDARD_SRS: &str = "EPSG:2154";

/// Keyword for "every extra dimension of the input"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum All {
    All,
}

/// Keyword for an offset derived from the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Auto {
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    Value(f64),
    Auto(Auto),
}

impl Offset {
    pub fn auto() -> Self {
        Offset::Auto(Auto::Auto)
    }

    /// Resolve against the minimum coordinate of the data
    pub fn resolve(&self, min: Option<f64>) -> f64 {
        match self {
            Offset::Value(v) => *v,
            Offset::Auto(_) => min.map(f64::floor).unwrap_or(0.0),
        }
    }
}

/// `name=type` declaration of an extra dimension to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtraDimSpec {
    pub name: String,
    pub data_type: DimensionType,
}

impl FromStr for ExtraDimSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, data_type) = s.split_once('=').ok_or_else(|| Error::InvalidArgument {
            arg: "extra_dims",
            value: s.to_string(),
        })?;
        Ok(Self {
            name: name.trim().to_string(),
            data_type: data_type.parse()?,
        })
    }
}

impl TryFrom<String> for ExtraDimSpec {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ExtraDimSpec> for String {
    fn from(spec: ExtraDimSpec) -> String {
        format!("{}={}", spec.name, spec.data_type)
    }
}

/// Which extra dimensions end up in the output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraDims {
    All(All),
    Selected(Vec<ExtraDimSpec>),
}

impl ExtraDims {
    pub fn all() -> Self {
        ExtraDims::All(All::All)
    }

    pub fn none() -> Self {
        ExtraDims::Selected(Vec::new())
    }
}

impl FromStr for ExtraDims {
    type Err = Error;

    /// `all`, an empty string, or a comma separated list of `name=type`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ExtraDims::all());
        }
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ExtraDimSpec::from_str)
            .collect::<Result<Vec<_>>>()
            .map(ExtraDims::Selected)
    }
}

/// LAS writer parameters, named after PDAL's `writers.las` options so that
/// JSON presets can be shared with PDAL pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterParams {
    pub major_version: u8,
    pub minor_version: u8,
    pub global_encoding: u16,
    pub compression: bool,
    pub extra_dims: ExtraDims,
    pub scale_x: f64,
    pub scale_y: f64,
    pub scale_z: f64,
    pub offset_x: Offset,
    pub offset_y: Offset,
    pub offset_z: Offset,
    pub dataformat_id: u8,
    /// Output CRS, e.g. `EPSG:2154`; `None` keeps the CRS records of the input
    pub a_srs: Option<String>,
}

impl Default for WriterParams {
    /// The standard format: LAS 1.4, WKT CRS, compressed, 1 cm precision,
    /// record format 6, Lambert-93, no extra dimension
    fn default() -> Self {
        Self {
            major_version: 1,
            minor_version: 4,
            global_encoding: 17,
            compression: true,
            extra_dims: ExtraDims::none(),
            scale_x: STANDARD_SCALE,
            scale_y: STANDARD_SCALE,
            scale_z: STANDARD_SCALE,
            offset_x: Offset::auto(),
            offset_y: Offset::auto(),
            offset_z: Offset::auto(),
            dataformat_id: 6,
            a_srs: Some(STANDARD_SRS.to_string()),
        }
    }
}

impl WriterParams {
    /// Parameters that reproduce the layout of an existing file
    pub fn from_header(header: &Header) -> Result<Self> {
        let raw = header.clone().into_raw()?;
        let transforms = header.transforms();
        let version = header.version();
        Ok(Self {
            major_version: version.major,
            minor_version: version.minor,
            global_encoding: raw.global_encoding,
            compression: header.point_format().is_compressed,
            extra_dims: ExtraDims::all(),
            scale_x: transforms.x.scale,
            scale_y: transforms.y.scale,
            scale_z: transforms.z.scale,
            offset_x: Offset::Value(transforms.x.offset),
            offset_y: Offset::Value(transforms.y.offset),
            offset_z: Offset::Value(transforms.z.offset),
            dataformat_id: header.point_format().to_u8()?,
            a_srs: crate::io::las::epsg_of(header).map(|code| format!("EPSG:{}", code)),
        })
    }

    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        merge_params(self, overrides)
    }
}

/// Standard parameters updated with a set of overrides, e.g.
/// `{"dataformat_id": 8, "a_srs": "EPSG:2975"}`
pub fn get_writer_parameters(overrides: &Value) -> Result<WriterParams> {
    merge_params(&WriterParams::default(), overrides)
}

fn merge_params(base: &WriterParams, overrides: &Value) -> Result<WriterParams> {
    let mut merged = serde_json::to_value(base)?;
    match (merged.as_object_mut(), overrides) {
        (Some(target), Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        (_, Value::Null) => {}
        _ => {
            return Err(Error::InvalidArgument {
                arg: "writer parameters",
                value: overrides.to_string(),
            });
        }
    }
    Ok(serde_json::from_value(merged)?)
}
