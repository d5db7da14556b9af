//! WMS client for the IGN Géoplateforme orthoimagery streams.
//!
//! Images are requested as GeoTIFF through `GetMap`. Servers answer errors with
//! an XML `ServiceExceptionReport`, which is turned into [`WmsError::Exception`].
use std::path::Path;
use std::thread;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::Bounds;

pub const GEOPLATEFORME_WMS_URL: &str = "https://data.geopf.fr/wms-r/wms";

#[derive(Debug, Error)]
pub enum WmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("WMS exception: {0}")]
    Exception(String),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Downloaded image is white, with stream: {0}")]
    WhiteImage(String),
}

impl WmsError {
    /// Transport and HTTP status failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, WmsError::Http(_) | WmsError::Status { .. })
    }
}

/// One GetMap request
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    /// EPSG code of the requested image
    pub proj: u32,
    pub layer: String,
    pub bbox: Bounds,
    pub width: usize,
    pub height: usize,
}

impl GetMapRequest {
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}?LAYERS={}&EXCEPTIONS=text/xml&FORMAT=image/geotiff&SERVICE=WMS&VERSION=1.3.0\
             &REQUEST=GetMap&STYLES=&CRS=EPSG:{}&BBOX={},{},{},{}&WIDTH={}&HEIGHT={}",
            base_url,
            self.layer,
            self.proj,
            self.bbox.minx,
            self.bbox.miny,
            self.bbox.maxx,
            self.bbox.maxy,
            self.width,
            self.height
        )
    }
}

/// Something that can produce a georeferenced image for a request
pub trait ImageSource {
    fn fetch(&self, request: &GetMapRequest, outfile: &Path) -> Result<(), WmsError>;
}

pub struct GeoplateformeWms {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GeoplateformeWms {
    pub fn new(timeout: Duration) -> Result<Self, WmsError> {
        Self::with_url(GEOPLATEFORME_WMS_URL, timeout)
    }

    pub fn with_url(base_url: &str, timeout: Duration) -> Result<Self, WmsError> {
        if timeout < Duration::from_secs(10) {
            debug!("Debug mode with a {}s timeout", timeout.as_secs());
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl ImageSource for GeoplateformeWms {
    fn fetch(&self, request: &GetMapRequest, outfile: &Path) -> Result<(), WmsError> {
        let url = request.url(&self.base_url);
        info!("{}", url);
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(WmsError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = response.bytes()?;
        if looks_like_xml(&bytes) {
            return Err(WmsError::Exception(parse_service_exception(&bytes)?));
        }
        info!("Writing file: {}", outfile.display());
        std::fs::write(outfile, &bytes)?;
        Ok(())
    }
}

fn looks_like_xml(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"<")
}

/// Text of the `ServiceException` elements of a WMS exception report
pub fn parse_service_exception(xml: &[u8]) -> Result<String, WmsError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_exception = false;
    let mut messages = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"ServiceException" => {
                in_exception = true;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"ServiceException" => {
                in_exception = false;
            }
            Event::Text(e) if in_exception => {
                messages.push(e.unescape()?.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if messages.is_empty() {
        Ok(String::from_utf8_lossy(xml).trim().to_string())
    } else {
        Ok(messages.join("; "))
    }
}

/// `1d2h3m4s`-style rendering of a duration, largest unit first
pub fn pretty_time_delta(delta: chrono::Duration) -> String {
    let total = delta.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let seconds = total.abs();
    let (days, seconds) = (seconds / 86400, seconds % 86400);
    let (hours, seconds) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    if days > 0 {
        format!("{sign}{days}d{hours}h{minutes}m{seconds}s")
    } else if hours > 0 {
        format!("{sign}{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{sign}{minutes}m{seconds}s")
    } else {
        format!("{sign}{seconds}s")
    }
}

/// Retry policy with an exponential pause between attempts
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub times: u32,
    pub delay: Duration,
    pub factor: u32,
    /// Skip the pauses (tests)
    pub sleep: bool,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            times: 9,
            delay: Duration::from_secs(5),
            factor: 2,
            sleep: true,
        }
    }
}

impl Retry {
    /// Run `f` up to `times` times while it fails with a retryable error, then
    /// one last time whatever happens
    pub fn run<T, F>(&self, mut f: F) -> Result<T, WmsError>
    where
        F: FnMut() -> Result<T, WmsError>,
    {
        let mut delay = self.delay;
        for attempt in 1..=self.times {
            match f() {
                Err(err) if err.is_retryable() => {
                    warn!("Connection Error: {}", err);
                    let pause = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                    info!(
                        "{}/{} New attempt after a pause of {} ..",
                        attempt,
                        self.times,
                        pretty_time_delta(pause)
                    );
                    if self.sleep {
                        thread::sleep(delay);
                    }
                    delay *= self.factor;
                }
                other => return other,
            }
        }
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn getmap_url() {
        let request = GetMapRequest {
            proj: 2154,
            layer: "ORTHOIMAGERY.ORTHOPHOTOS".into(),
            bbox: Bounds::new(770550.0, 770600.0, 6277550.0, 6277600.0),
            width: 250,
            height: 250,
        };
        assert_eq!(
            request.url(GEOPLATEFORME_WMS_URL),
            "https://data.geopf.fr/wms-r/wms?LAYERS=ORTHOIMAGERY.ORTHOPHOTOS\
             &EXCEPTIONS=text/xml&FORMAT=image/geotiff&SERVICE=WMS&VERSION=1.3.0\
             &REQUEST=GetMap&STYLES=&CRS=EPSG:2154&BBOX=770550,6277550,770600,6277600\
             &WIDTH=250&HEIGHT=250"
        );
    }

    #[test]
    fn time_deltas() {
        assert_eq!(pretty_time_delta(chrono::Duration::seconds(5)), "5s");
        assert_eq!(pretty_time_delta(chrono::Duration::seconds(65)), "1m5s");
        assert_eq!(pretty_time_delta(chrono::Duration::seconds(3600)), "1h0m0s");
        assert_eq!(
            pretty_time_delta(chrono::Duration::seconds(93784)),
            "1d2h3m4s"
        );
        assert_eq!(pretty_time_delta(chrono::Duration::seconds(-61)), "-1m1s");
    }

    #[test]
    fn exception_report_text() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<ServiceExceptionReport version="1.3.0" xmlns="http://www.opengis.net/ogc">
  <ServiceException code="LayerNotDefined">Unknown layer: FOO</ServiceException>
</ServiceExceptionReport>"#;
        assert!(looks_like_xml(xml));
        assert!(!looks_like_xml(b"II*\0"));
        assert_eq!(parse_service_exception(xml).unwrap(), "Unknown layer: FOO");
    }

    #[test]
    fn retry_stops_on_success_and_on_fatal_errors() {
        let retry = Retry {
            sleep: false,
            ..Default::default()
        };
        let calls = Cell::new(0);
        let result = retry.run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(WmsError::Status {
                    status: 503,
                    url: "u".into(),
                })
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);

        calls.set(0);
        let result: Result<(), _> = retry.run(|| {
            calls.set(calls.get() + 1);
            Err(WmsError::Exception("bad layer".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);

        calls.set(0);
        let result: Result<(), _> = retry.run(|| {
            calls.set(calls.get() + 1);
            Err(WmsError::Status {
                status: 500,
                url: "u".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 10);
    }
}
