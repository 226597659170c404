use log::warn;
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use thiserror::Error;

use crate::{coerce, frame::Table};

pub const MAX_POINTS: usize = 1000;
pub const MISSING_LABEL: &str = "No information";
const GEOGRAPHIC_LIMIT: f64 = 180.0;

#[derive(Debug, Error, PartialEq)]
pub enum ReprojectionError {
    #[error("coordinate ({easting}, {northing}) is not a finite number")]
    NonFinite { easting: f64, northing: f64 },
    #[error("coordinate ({easting}, {northing}) lies outside the projection domain")]
    OutOfDomain { easting: f64, northing: f64 },
    #[error("reprojection produced an invalid position (lon {lon}, lat {lat})")]
    InvalidPosition { lon: f64, lat: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub label: Option<String>,
}

/// Points keyed by the column names they were read from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapPayload {
    pub lat_field: String,
    pub lon_field: String,
    pub label_field: Option<String>,
    pub points: Vec<MapPoint>,
}

impl MapPayload {
    fn empty(lat_field: &str, lon_field: &str) -> Self {
        Self {
            lat_field: lat_field.to_string(),
            lon_field: lon_field.to_string(),
            label_field: None,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl Serialize for MapPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Record<'a>(&'a MapPayload, &'a MapPoint);

        impl Serialize for Record<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let Record(payload, point) = self;
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry(&payload.lat_field, &point.lat)?;
                map.serialize_entry(&payload.lon_field, &point.lon)?;
                if let (Some(field), Some(label)) = (&payload.label_field, &point.label) {
                    map.serialize_entry(field, label)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.points.len()))?;
        for point in &self.points {
            seq.serialize_element(&Record(self, point))?;
        }
        seq.end()
    }
}

/// Inverse Transverse Mercator projection (Snyder, USGS Professional Paper 1395).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    semi_major: f64,
    flattening: f64,
    scale: f64,
    central_meridian: f64,
    false_easting: f64,
    false_northing: f64,
}

impl TransverseMercator {
    pub fn utm(zone: u8, north: bool) -> Self {
        Self {
            semi_major: 6_378_137.0,
            flattening: 1.0 / 298.257_222_101,
            scale: 0.9996,
            central_meridian: f64::from(zone) * 6.0 - 183.0,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
        }
    }

    /// Returns `(longitude, latitude)` in degrees.
    pub fn to_geographic(
        &self,
        easting: f64,
        northing: f64,
    ) -> Result<(f64, f64), ReprojectionError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ReprojectionError::NonFinite { easting, northing });
        }
        let x = easting - self.false_easting;
        let y = northing - self.false_northing;
        if x.abs() > 1_000_000.0 || y.abs() > 10_002_000.0 {
            return Err(ReprojectionError::OutOfDomain { easting, northing });
        }

        let a = self.semi_major;
        let k0 = self.scale;
        let e2 = self.flattening * (2.0 - self.flattening);
        let ep2 = e2 / (1.0 - e2);
        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);

        let m = y / k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = sin1 / cos1;
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let denom = 1.0 - e2 * sin1 * sin1;
        let n1 = a / denom.sqrt();
        let r1 = a * (1.0 - e2) / denom.powf(1.5);
        let d = x / (n1 * k0);

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = self.central_meridian.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos1;

        let (lon, lat) = (lon.to_degrees(), lat.to_degrees());
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(ReprojectionError::InvalidPosition { lon, lat });
        }
        Ok((lon, lat))
    }
}

impl Default for TransverseMercator {
    fn default() -> Self {
        Self::utm(31, true)
    }
}

pub fn resolve(table: &Table, lat: &str, lon: &str, label: Option<&str>) -> MapPayload {
    resolve_with(table, lat, lon, label, &TransverseMercator::default())
}

pub fn resolve_with(
    table: &Table,
    lat: &str,
    lon: &str,
    label: Option<&str>,
    projection: &TransverseMercator,
) -> MapPayload {
    let (Some(lat_column), Some(lon_column)) = (table.column(lat), table.column(lon)) else {
        return MapPayload::empty(lat, lon);
    };
    let label_column = label.and_then(|name| table.column(name));

    let lats = coerce::coerce(&lat_column.data.values());
    let lons = coerce::coerce(&lon_column.data.values());
    let mut points = lats
        .iter()
        .zip(&lons)
        .enumerate()
        .filter_map(|(row, pair)| match pair {
            (Some(lat), Some(lon)) => Some(MapPoint {
                lat: *lat,
                lon: *lon,
                label: label_column.map(|c| {
                    c.data
                        .display(row)
                        .unwrap_or_else(|| MISSING_LABEL.to_string())
                }),
            }),
            _ => None,
        })
        .collect::<Vec<_>>();

    let mut payload = MapPayload::empty(lat, lon);
    if points.is_empty() {
        return payload;
    }

    let max_abs = points
        .iter()
        .map(|p| p.lat.abs().max(p.lon.abs()))
        .fold(0.0_f64, f64::max);
    if max_abs > GEOGRAPHIC_LIMIT {
        for point in &mut points {
            match projection.to_geographic(point.lon, point.lat) {
                Ok((lon, lat)) => {
                    point.lon = lon;
                    point.lat = lat;
                }
                Err(err) => {
                    warn!("Dropping map for '{lat}'/'{lon}': {err}");
                    return payload;
                }
            }
        }
    }

    points.truncate(MAX_POINTS);
    payload.label_field = label_column.map(|c| c.name.clone());
    payload.points = points;
    payload
}
