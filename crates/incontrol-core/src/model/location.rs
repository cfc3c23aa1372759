use incontrol_api::LocationFix;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last known GPS position of a device.
///
/// Every field is optional; a device that never reported a fix (or whose
/// location fetch failed) has an empty location, which serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Latitude and longitude, when both are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Take the newest fix (the API lists it first).
    pub fn from_fixes(fixes: Vec<LocationFix>) -> Self {
        fixes.into_iter().next().map(Self::from).unwrap_or_default()
    }
}

impl From<LocationFix> for Location {
    fn from(fix: LocationFix) -> Self {
        Self {
            latitude: fix.la,
            longitude: fix.lo,
            altitude: fix.at,
            speed: fix.sp,
            timestamp: fix.ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_location_serializes_as_empty_object() {
        let loc = Location::from_fixes(Vec::new());
        assert!(loc.is_empty());
        assert_eq!(serde_json::to_value(&loc).expect("json"), json!({}));
    }

    #[test]
    fn newest_fix_wins() {
        let fixes: Vec<LocationFix> = serde_json::from_value(json!([
            {"la": 1.5, "lo": 2.5, "ts": "newest"},
            {"la": 9.0, "lo": 9.0, "ts": "older"}
        ]))
        .expect("fixes");

        let loc = Location::from_fixes(fixes);
        assert_eq!(loc.coordinates(), Some((1.5, 2.5)));
        assert_eq!(loc.timestamp, Some(json!("newest")));
        assert!(loc.altitude.is_none());
    }
}
