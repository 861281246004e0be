//! Geographic and temporal values shared by the pipeline and the engine adapter.

use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::LayerError;

/// Landsat 8 Collection 2 Tier 1 surface reflectance archive.
pub const LANDSAT8_SR_COLLECTION: &str = "LANDSAT/LC08/C02/T1_L2";

/// Scene metadata property holding the cloud-cover percentage.
pub const CLOUD_COVER_PROPERTY: &str = "CLOUD_COVER";

/// Calendar date format used on the wire (`YYYY-MM-DD`).
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Axis-aligned lon/lat rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl Region {
    /// Area around Regina, Saskatchewan.
    pub const DEFAULT: Region = Region {
        west: -104.8,
        south: 50.2,
        east: -104.4,
        north: 50.7,
    };

    /// Build a region from a south-west and a north-east corner, both `[lng, lat]`.
    pub fn from_corners(sw: [f64; 2], ne: [f64; 2]) -> Result<Self, LayerError> {
        let [west, south] = sw;
        let [east, north] = ne;

        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(LayerError::InvalidRegion(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            return Err(LayerError::InvalidRegion(
                "longitude must be within [-180, 180]".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(LayerError::InvalidRegion(
                "latitude must be within [-90, 90]".to_string(),
            ));
        }
        if west >= east || south >= north {
            return Err(LayerError::InvalidRegion(
                "bounds must be [[west, south], [east, north]] with west < east and south < north"
                    .to_string(),
            ));
        }

        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Corner pairs in `[[west, south], [east, north]]` order.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.west, self.south], [self.east, self.north]]
    }

    /// Check whether two rectangles share any area or edge.
    pub fn intersects(&self, other: &Region) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Half-open calendar window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First included day.
    pub start: Date,
    /// First excluded day.
    pub end: Date,
}

impl DateWindow {
    /// Create a window, requiring `start < end`.
    pub fn new(start: Date, end: Date) -> Result<Self, LayerError> {
        if start >= end {
            return Err(LayerError::InvalidRequest(format!(
                "date window start {} must be before end {}",
                format_date(start),
                format_date(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, LayerError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Whether a day falls inside the window.
    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day < self.end
    }

    /// Start formatted as `YYYY-MM-DD`.
    pub fn start_str(&self) -> String {
        format_date(self.start)
    }

    /// End formatted as `YYYY-MM-DD`.
    pub fn end_str(&self) -> String {
        format_date(self.end)
    }
}

/// Parse a `YYYY-MM-DD` date. Signed years such as `+2019-01-01` are rejected.
pub fn parse_date(value: &str) -> Result<Date, LayerError> {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(LayerError::InvalidRequest(format!(
            "date {:?} is not YYYY-MM-DD",
            value
        )));
    }
    Date::parse(value, DATE_FORMAT).map_err(|e| {
        LayerError::InvalidRequest(format!("date {:?} is not YYYY-MM-DD: {}", value, e))
    })
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(day: Date) -> String {
    // Four-digit years always format.
    day.format(DATE_FORMAT).unwrap_or_else(|_| day.to_string())
}

/// Metadata for one archive scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMetadata {
    /// Scene identifier.
    pub id: String,
    /// Acquisition day.
    pub acquired: Date,
    /// Cloud-cover percentage (0..=100).
    pub cloud_cover: f64,
    /// Scene footprint.
    pub footprint: Region,
}

/// Filtered view over a remote image collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    /// Archive identifier.
    pub collection_id: String,
    /// Scenes must intersect this region.
    pub region: Region,
    /// Scenes must be acquired inside this window.
    pub window: DateWindow,
    /// Scenes must have cloud cover strictly below this value.
    pub cloud_cover_ceiling: f64,
}

impl CollectionQuery {
    /// Query the Landsat 8 surface reflectance archive.
    pub fn landsat8(region: Region, window: DateWindow, cloud_cover_ceiling: f64) -> Self {
        Self {
            collection_id: LANDSAT8_SR_COLLECTION.to_string(),
            region,
            window,
            cloud_cover_ceiling,
        }
    }

    /// Whether a scene passes every filter of this query.
    pub fn matches(&self, scene: &SceneMetadata) -> bool {
        scene.footprint.intersects(&self.region)
            && self.window.contains(scene.acquired)
            && scene.cloud_cover < self.cloud_cover_ceiling
    }
}

/// Display stretch applied when requesting map tiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    /// Bands mapped to red, green, blue.
    pub bands: [&'static str; 3],
    /// Value mapped to black.
    pub min: f64,
    /// Value mapped to full intensity.
    pub max: f64,
    /// Gamma correction.
    pub gamma: f64,
}

impl Visualization {
    /// Natural color from scaled surface reflectance.
    pub fn true_color() -> Self {
        Self {
            bands: ["SR_B4", "SR_B3", "SR_B2"],
            min: 0.0,
            max: 0.25,
            gamma: 1.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn scene(cloud_cover: f64) -> SceneMetadata {
        SceneMetadata {
            id: "LC08_035025_20190715".to_string(),
            acquired: date!(2019 - 07 - 15),
            cloud_cover,
            footprint: Region::DEFAULT,
        }
    }

    fn query() -> CollectionQuery {
        CollectionQuery::landsat8(
            Region::DEFAULT,
            DateWindow::parse("2019-01-01", "2019-12-31").unwrap(),
            50.0,
        )
    }

    #[test]
    fn cloud_cover_ceiling_is_strict() {
        let query = query();
        assert!(query.matches(&scene(49.99)));
        assert!(!query.matches(&scene(50.0)));
        assert!(!query.matches(&scene(75.0)));
    }

    #[test]
    fn query_filters_by_window_and_footprint() {
        let query = query();

        let mut late = scene(10.0);
        late.acquired = date!(2019 - 12 - 31);
        assert!(!query.matches(&late));

        let mut elsewhere = scene(10.0);
        elsewhere.footprint = Region::from_corners([10.0, 10.0], [11.0, 11.0]).unwrap();
        assert!(!query.matches(&elsewhere));
    }

    #[test]
    fn region_rejects_inverted_corners() {
        let err = Region::from_corners([-104.4, 50.7], [-104.8, 50.2]).unwrap_err();
        assert!(matches!(err, LayerError::InvalidRegion(_)));
    }

    #[test]
    fn region_rejects_out_of_range() {
        assert!(Region::from_corners([-190.0, 50.0], [-104.0, 51.0]).is_err());
        assert!(Region::from_corners([-105.0, 50.0], [-104.0, 91.0]).is_err());
        assert!(Region::from_corners([f64::NAN, 50.0], [-104.0, 51.0]).is_err());
    }

    #[test]
    fn region_corners_round_trip() {
        let region = Region::from_corners([-104.8, 50.2], [-104.4, 50.7]).unwrap();
        assert_eq!(region, Region::DEFAULT);
        assert_eq!(region.corners(), [[-104.8, 50.2], [-104.4, 50.7]]);
    }

    #[test]
    fn date_window_is_half_open() {
        let window = DateWindow::parse("2019-07-01", "2019-08-31").unwrap();
        assert!(window.contains(date!(2019 - 07 - 01)));
        assert!(window.contains(date!(2019 - 08 - 30)));
        assert!(!window.contains(date!(2019 - 08 - 31)));
        assert_eq!(window.start_str(), "2019-07-01");
        assert_eq!(window.end_str(), "2019-08-31");
    }

    #[test]
    fn date_window_rejects_bad_input() {
        assert!(DateWindow::parse("2019-7-1", "2019-08-31").is_err());
        assert!(DateWindow::parse("2019-08-31", "2019-07-01").is_err());
        assert!(DateWindow::parse("2019-07-01", "2019-07-01").is_err());
        assert!(DateWindow::parse("yesterday", "2019-07-01").is_err());
    }

    #[test]
    fn signed_years_are_rejected() {
        for value in ["+2019-01-01", "-2019-01-01", " 2019-01-01"] {
            let err = parse_date(value).unwrap_err();
            assert!(matches!(err, LayerError::InvalidRequest(_)), "{}", value);
        }
        assert_eq!(parse_date("2019-01-01").unwrap(), date!(2019 - 01 - 01));
    }
}
