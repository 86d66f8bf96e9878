//! # Proximity Search
//!
//! Ranks stored reports by great-circle distance from a query point.
//!
//! ## Requirements
//!
//! - Fixed 0.5 mile search radius, closest first
//! - Optional animal type (case-insensitive) and severity filters
//! - Capped result count, 1-100 with a default of 50
//!
//! ## Implementation
//!
//! - Attribute filters are pushed down to the store scan, which also drops
//!   reports that carry no coordinates
//! - Distance uses the spherical law of cosines, accurate enough at
//!   sub-mile radii
//! - Ties on distance rank the newer (larger) report id first

use serde::Serialize;

use crate::{
    database::{ReportRecord, ReportStore, ScanFilters},
    error::AppError,
};

/// Valid latitude range in decimal degrees
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range in decimal degrees
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

pub const EARTH_RADIUS_MILES: f64 = 3959.0;
pub const SEARCH_RADIUS_MILES: f64 = 0.5;

pub const DEFAULT_REPORT_COUNT: usize = 50;
pub const MAX_REPORT_COUNT: usize = 100;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, AppError> {
        if !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(AppError::InvalidArgument(format!(
                "latitude {lat} out of range [{MIN_LAT}, {MAX_LAT}]"
            )));
        }

        if !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(AppError::InvalidArgument(format!(
                "longitude {lon} out of range [{MIN_LON}, {MAX_LON}]"
            )));
        }

        Ok(Self { lat, lon })
    }
}

/// Great-circle distance between two points in miles.
pub fn distance_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());

    // Rounding error can push the cosine just outside [-1, 1] when the
    // points coincide, and acos would then return NaN
    let arc = lat1.cos() * lat2.cos() * (lon2 - lon1).cos() + lat1.sin() * lat2.sin();

    EARTH_RADIUS_MILES * arc.clamp(-1.0, 1.0).acos()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A validated proximity search request.
#[derive(Debug, Clone)]
pub struct ProximityQuery {
    pub center: GeoPoint,
    pub animal_type: Option<String>,
    pub severity: Option<i64>,
    pub report_count: usize,
}

impl ProximityQuery {
    /// Validates the center coordinates before anything touches the store.
    /// A missing or out-of-range `report_count` falls back to the default
    /// rather than erroring.
    pub fn new(
        lat: f64,
        lon: f64,
        report_count: Option<i64>,
        animal_type: Option<String>,
        severity: Option<i64>,
    ) -> Result<Self, AppError> {
        let center = GeoPoint::new(lat, lon)?;

        let report_count = match report_count {
            Some(n) if (1..=MAX_REPORT_COUNT as i64).contains(&n) => n as usize,
            _ => DEFAULT_REPORT_COUNT,
        };

        Ok(Self {
            center,
            animal_type,
            severity,
            report_count,
        })
    }

    fn filters(&self) -> ScanFilters {
        ScanFilters {
            animal_type: self.animal_type.clone(),
            severity: self.severity,
        }
    }
}

/// A matched report plus its distance from the search center.
#[derive(Debug, Serialize)]
pub struct NearbyReport {
    #[serde(flatten)]
    pub report: ReportRecord,
    pub distance_miles: f64,
}

#[derive(Debug, Serialize)]
pub struct ProximityResult {
    pub reports: Vec<NearbyReport>,
    pub search_center: GeoPoint,
    pub search_radius_miles: f64,
    pub total_found: usize,
}

fn rank(center: GeoPoint, candidates: Vec<ReportRecord>, cap: usize) -> Vec<(ReportRecord, f64)> {
    let mut ranked: Vec<(ReportRecord, f64)> = candidates
        .into_iter()
        .filter_map(|report| {
            let point = report.geo_point()?;
            let distance = distance_miles(center, point);

            (distance <= SEARCH_RADIUS_MILES).then_some((report, distance))
        })
        .collect();

    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(b.0.report_id.cmp(&a.0.report_id)));
    ranked.truncate(cap);

    ranked
}

/// Runs a proximity search against the store.
///
/// Deterministic for a fixed store snapshot: either the full ranked result
/// is returned or an error, never a partial result.
pub async fn find_nearby(
    store: &ReportStore,
    query: &ProximityQuery,
) -> Result<ProximityResult, AppError> {
    let candidates = store.scan_located(&query.filters()).await?;

    let ranked = rank(query.center, candidates, query.report_count);

    let total_found = ranked.len();
    let reports = ranked
        .into_iter()
        .map(|(report, distance)| NearbyReport {
            report,
            distance_miles: round3(distance),
        })
        .collect();

    Ok(ProximityResult {
        reports,
        search_center: query.center,
        search_radius_miles: SEARCH_RADIUS_MILES,
        total_found,
    })
}
