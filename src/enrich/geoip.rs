//! IP geolocation via a memory-mapped MaxMind GeoLite2/GeoIP2 City database.
//!
//! The lookup is a local data read, never a network call, so the resolver can
//! consult it inline without a suspension point.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Country/region/city triple for one IP. Fields the database does not know
/// stay `None`; there is no further fallback.
#[derive(Debug, Clone, Default)]
pub struct GeoFields {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

pub struct GeoIpService {
    reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Open a GeoLite2-City or GeoIP2-City .mmdb file.
    pub fn open(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Lookup the location for an IP address. Lookup failures degrade to an
    /// empty result; they are never surfaced.
    pub fn lookup(&self, ip: IpAddr) -> GeoFields {
        let mut fields = GeoFields::default();

        if let Ok(result) = self.reader.lookup(ip) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                fields.country = city
                    .country
                    .names
                    .english
                    .or(city.country.iso_code)
                    .map(|s| s.to_string());
                if let Some(subdivision) = city.subdivisions.first() {
                    fields.region = subdivision.names.english.map(|s| s.to_string());
                }
                fields.city = city.city.names.english.map(|s| s.to_string());
            }
        }

        fields
    }
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}
