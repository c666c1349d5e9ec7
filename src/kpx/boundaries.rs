use std::path::Path;

use serde_json::Value;

use crate::kpx::KpxError;

/// GeoJSON feature property holding the canonical province name. The
/// choropleth traces join on `properties.CTP_KOR_NM`.
pub const FEATURE_NAME_PROPERTY: &str = "CTP_KOR_NM";

/// Load the province boundary GeoJSON and return it unmodified.
///
/// The document is passed through to the Plotly traces as-is; no geometry
/// is interpreted server-side. Malformed JSON fails the load.
pub fn load_boundaries(path: &Path) -> Result<Value, KpxError> {
    let text = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&text)?;
    Ok(value)
}

/// Number of features in a boundary document, for the startup summary.
/// Zero if the document is not a feature collection.
pub fn feature_count(boundaries: &Value) -> usize {
    boundaries["features"].as_array().map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_document_is_returned_unmodified() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"CTP_KOR_NM": "서울특별시"},
                    "geometry": {"type": "Polygon", "coordinates": [[[126.9, 37.5], [127.0, 37.5], [127.0, 37.6], [126.9, 37.5]]]}
                }
            ]
        }"#;
        let path = std::env::temp_dir().join("haebaram-boundaries-test.geojson");
        std::fs::write(&path, text).unwrap();

        let boundaries = load_boundaries(&path).unwrap();
        assert_eq!(boundaries, serde_json::from_str::<Value>(text).unwrap());
        assert_eq!(feature_count(&boundaries), 1);
        assert_eq!(
            boundaries["features"][0]["properties"][FEATURE_NAME_PROPERTY],
            "서울특별시"
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let path = std::env::temp_dir().join("haebaram-boundaries-bad-test.geojson");
        std::fs::write(&path, "{\"type\": \"FeatureCollection\",").unwrap();

        assert!(matches!(load_boundaries(&path), Err(KpxError::Json(_))));

        std::fs::remove_file(&path).ok();
    }
}
