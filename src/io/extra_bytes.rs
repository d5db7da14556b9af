//! Extra bytes ("extra dimensions") of LAS point records.
//!
//! The layout is described by the `LASF_Spec` / 4 VLR: one 192-byte descriptor per
//! dimension, in record order. Values live in `las::Point::extra_bytes`.
use las::{Header, Point, Vlr};

use crate::error::{Error, Result};
use crate::types::DimensionType;

pub const EXTRA_BYTES_USER_ID: &str = "LASF_Spec";
pub const EXTRA_BYTES_RECORD_ID: u16 = 4;
const DESCRIPTOR_SIZE: usize = 192;

const NAME: std::ops::Range<usize> = 4..36;
const SCALE: std::ops::Range<usize> = 112..120;
const OFFSET: std::ops::Range<usize> = 136..144;
const DESCRIPTION: std::ops::Range<usize> = 160..192;

const SCALE_BIT: u8 = 1 << 3;
const OFFSET_BIT: u8 = 1 << 4;

/// One extra dimension descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraDimension {
    name: String,
    /// `None` for undocumented or deprecated vector types, which are carried as opaque bytes
    data_type: Option<DimensionType>,
    size: usize,
    raw: [u8; DESCRIPTOR_SIZE],
}

impl ExtraDimension {
    pub fn new(name: &str, data_type: DimensionType) -> Result<Self> {
        if name.is_empty() || name.len() > NAME.len() {
            return Err(Error::Dimension(format!(
                "Extra dimension name must have 1 to 32 characters, got '{}'",
                name
            )));
        }
        let mut raw = [0u8; DESCRIPTOR_SIZE];
        raw[2] = data_type.code();
        raw[NAME.start..NAME.start + name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            name: name.to_string(),
            data_type: Some(data_type),
            size: data_type.size(),
            raw,
        })
    }

    fn parse(raw: &[u8]) -> Result<Self> {
        let raw: [u8; DESCRIPTOR_SIZE] = raw
            .try_into()
            .map_err(|_| Error::Dimension("Truncated extra bytes descriptor".into()))?;
        let code = raw[2];
        let options = raw[3];
        let (data_type, size) = match code {
            0 => (None, options as usize),
            1..=10 => {
                let t = DimensionType::from_code(code)
                    .ok_or_else(|| Error::Dimension(format!("Unknown data type {}", code)))?;
                (Some(t), t.size())
            }
            // deprecated 2- and 3-element vectors
            11..=30 => {
                let base = DimensionType::from_code((code - 1) % 10 + 1)
                    .ok_or_else(|| Error::Dimension(format!("Unknown data type {}", code)))?;
                let count = if code <= 20 { 2 } else { 3 };
                (None, base.size() * count)
            }
            _ => {
                return Err(Error::Dimension(format!(
                    "Reserved extra bytes data type {}",
                    code
                )));
            }
        };
        Ok(Self {
            name: trim_nul(&raw[NAME]),
            data_type,
            size,
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> Option<DimensionType> {
        self.data_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn description(&self) -> String {
        trim_nul(&self.raw[DESCRIPTION])
    }

    fn options(&self) -> u8 {
        self.raw[3]
    }

    pub fn scale(&self) -> Option<f64> {
        (self.options() & SCALE_BIT != 0).then(|| read_f64(&self.raw[SCALE]))
    }

    pub fn offset(&self) -> Option<f64> {
        (self.options() & OFFSET_BIT != 0).then(|| read_f64(&self.raw[OFFSET]))
    }

    fn set_name(&mut self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > NAME.len() {
            return Err(Error::Dimension(format!(
                "Extra dimension name must have 1 to 32 characters, got '{}'",
                name
            )));
        }
        self.raw[NAME].fill(0);
        self.raw[NAME.start..NAME.start + name.len()].copy_from_slice(name.as_bytes());
        self.name = name.to_string();
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> f64 {
        let Some(data_type) = self.data_type else {
            return 0.0;
        };
        let value = match data_type {
            DimensionType::Uint8 => bytes[0] as f64,
            DimensionType::Int8 => bytes[0] as i8 as f64,
            DimensionType::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            DimensionType::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            DimensionType::Uint32 => u32::from_le_bytes(le4(bytes)) as f64,
            DimensionType::Int32 => i32::from_le_bytes(le4(bytes)) as f64,
            DimensionType::Float32 => f32::from_le_bytes(le4(bytes)) as f64,
            DimensionType::Uint64 => u64::from_le_bytes(le8(bytes)) as f64,
            DimensionType::Int64 => i64::from_le_bytes(le8(bytes)) as f64,
            DimensionType::Float64 => f64::from_le_bytes(le8(bytes)),
        };
        value * self.scale().unwrap_or(1.0) + self.offset().unwrap_or(0.0)
    }

    fn encode(&self, value: f64, out: &mut [u8]) {
        let Some(data_type) = self.data_type else {
            return;
        };
        let raw = (value - self.offset().unwrap_or(0.0)) / self.scale().unwrap_or(1.0);
        // `as` saturates float to int conversions
        let int = raw.round();
        match data_type {
            DimensionType::Uint8 => out[0] = int as u8,
            DimensionType::Int8 => out[0] = (int as i8) as u8,
            DimensionType::Uint16 => out.copy_from_slice(&(int as u16).to_le_bytes()),
            DimensionType::Int16 => out.copy_from_slice(&(int as i16).to_le_bytes()),
            DimensionType::Uint32 => out.copy_from_slice(&(int as u32).to_le_bytes()),
            DimensionType::Int32 => out.copy_from_slice(&(int as i32).to_le_bytes()),
            DimensionType::Float32 => out.copy_from_slice(&(raw as f32).to_le_bytes()),
            DimensionType::Uint64 => out.copy_from_slice(&(int as u64).to_le_bytes()),
            DimensionType::Int64 => out.copy_from_slice(&(int as i64).to_le_bytes()),
            DimensionType::Float64 => out.copy_from_slice(&raw.to_le_bytes()),
        }
    }
}

fn trim_nul(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(char::from(0))
        .to_string()
}

fn read_f64(bytes: &[u8]) -> f64 {
    f64::from_le_bytes(le8(bytes))
}

fn le4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn le8(bytes: &[u8]) -> [u8; 8] {
    [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]
}

/// Ordered extra dimensions of a point record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraBytesLayout {
    dims: Vec<ExtraDimension>,
    /// Bytes at the end of the record not covered by any descriptor
    undescribed: usize,
}

impl ExtraBytesLayout {
    pub fn from_header(header: &Header) -> Result<Self> {
        let mut dims = Vec::new();
        for vlr in header.all_vlrs() {
            if is_extra_bytes_vlr(vlr) {
                for chunk in vlr.data.chunks_exact(DESCRIPTOR_SIZE) {
                    dims.push(ExtraDimension::parse(chunk)?);
                }
            }
        }
        let described: usize = dims.iter().map(|d| d.size).sum();
        let total = header.point_format().extra_bytes as usize;
        if described > total {
            return Err(Error::Dimension(format!(
                "Extra bytes descriptors cover {} bytes but point records only carry {}",
                described, total
            )));
        }
        Ok(Self {
            dims,
            undescribed: total - described,
        })
    }

    pub fn dims(&self) -> &[ExtraDimension] {
        &self.dims
    }

    pub fn names(&self) -> Vec<String> {
        self.dims.iter().map(|d| d.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty() && self.undescribed == 0
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    /// Total extra bytes per point record
    pub fn record_length(&self) -> u16 {
        (self.dims.iter().map(|d| d.size).sum::<usize>() + self.undescribed) as u16
    }

    fn start_of(&self, index: usize) -> usize {
        self.dims[..index].iter().map(|d| d.size).sum()
    }

    pub fn get(&self, point: &Point, index: usize) -> f64 {
        let dim = &self.dims[index];
        let start = self.start_of(index);
        match point.extra_bytes.get(start..start + dim.size) {
            Some(bytes) => dim.decode(bytes),
            None => 0.0,
        }
    }

    pub fn set(&self, point: &mut Point, index: usize, value: f64) {
        let dim = &self.dims[index];
        let start = self.start_of(index);
        let len = self.record_length() as usize;
        if point.extra_bytes.len() < len {
            point.extra_bytes.resize(len, 0);
        }
        dim.encode(value, &mut point.extra_bytes[start..start + dim.size]);
    }

    /// Append a new dimension; existing point buffers must then go through [`Self::remap`]
    pub fn push(&mut self, name: &str, data_type: DimensionType) -> Result<usize> {
        if self.find(name).is_some() {
            return Err(Error::Dimension(format!(
                "Extra dimension {} already exists",
                name
            )));
        }
        let dim = ExtraDimension::new(name, data_type)?;
        // undescribed bytes stay at the end of the record
        self.dims.push(dim);
        Ok(self.dims.len() - 1)
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.find(new).is_some() {
            return Err(Error::Dimension(format!(
                "Extra dimension {} already exists",
                new
            )));
        }
        let index = self
            .find(old)
            .ok_or_else(|| Error::Dimension(format!("Extra dimension {} not found", old)))?;
        self.dims[index].set_name(new)
    }

    /// Layout restricted to the dimensions for which `keep` returns true.
    /// Undescribed trailing bytes are dropped.
    pub fn retain<F: Fn(&str) -> bool>(&self, keep: F) -> Self {
        Self {
            dims: self
                .dims
                .iter()
                .filter(|d| keep(&d.name))
                .cloned()
                .collect(),
            undescribed: 0,
        }
    }

    /// Rewrite the extra bytes of a point recorded with `self` into the `target` layout.
    /// Dimensions are matched by name; missing ones are zero.
    pub fn remap(&self, target: &ExtraBytesLayout, point: &mut Point) {
        if self == target {
            return;
        }
        let mut bytes = vec![0u8; target.record_length() as usize];
        let mut dst = 0;
        for dim in &target.dims {
            if let Some(src_index) = self.find(&dim.name) {
                let src_dim = &self.dims[src_index];
                let start = self.start_of(src_index);
                if src_dim.data_type == dim.data_type && src_dim.size == dim.size {
                    if let Some(src) = point.extra_bytes.get(start..start + dim.size) {
                        bytes[dst..dst + dim.size].copy_from_slice(src);
                    }
                } else if let Some(src) = point.extra_bytes.get(start..start + src_dim.size) {
                    dim.encode(src_dim.decode(src), &mut bytes[dst..dst + dim.size]);
                }
            }
            dst += dim.size;
        }
        point.extra_bytes = bytes;
    }

    /// The descriptor VLR, or `None` when there is nothing to describe
    pub fn to_vlr(&self) -> Option<Vlr> {
        if self.dims.is_empty() {
            return None;
        }
        let mut data = Vec::with_capacity(self.dims.len() * DESCRIPTOR_SIZE);
        for dim in &self.dims {
            data.extend_from_slice(&dim.raw);
        }
        Some(Vlr {
            user_id: EXTRA_BYTES_USER_ID.to_string(),
            record_id: EXTRA_BYTES_RECORD_ID,
            description: "Extra Bytes Record".to_string(),
            data,
        })
    }
}

pub fn is_extra_bytes_vlr(vlr: &Vlr) -> bool {
    vlr.user_id.eq_ignore_ascii_case(EXTRA_BYTES_USER_ID) && vlr.record_id == EXTRA_BYTES_RECORD_ID
}
