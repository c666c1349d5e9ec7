use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Canonical full administrative name of a province or metropolitan city,
/// as used in the boundary GeoJSON's `CTP_KOR_NM` property.
pub type RegionName = &'static str;

/// The aggregate "mainland" row in the KPX export. Not a region; always
/// dropped before analysis.
pub const SENTINEL_REGION: &str = "육지";

/// Short-form / historical region names mapped to their canonical full
/// administrative names. Raw values outside this table pass through
/// unchanged.
pub static REGION_MAPPING: Lazy<HashMap<&'static str, RegionName>> = Lazy::new(|| {
    HashMap::from([
        ("서울시", "서울특별시"),
        ("부산시", "부산광역시"),
        ("대구시", "대구광역시"),
        ("인천시", "인천광역시"),
        ("광주시", "광주광역시"),
        ("대전시", "대전광역시"),
        ("울산시", "울산광역시"),
        ("세종시", "세종특별자치시"),
        ("제주", "제주특별자치도"),
        ("제주도", "제주특별자치도"),
    ])
});

/// Resolve a raw region value to its canonical name.
pub fn canonical_name(raw: &str) -> &str {
    REGION_MAPPING.get(raw).copied().unwrap_or(raw)
}

/// Whether a raw region value is the mainland aggregate row.
pub fn is_sentinel(raw: &str) -> bool {
    raw == SENTINEL_REGION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms_canonicalize() {
        assert_eq!(canonical_name("서울시"), "서울특별시");
        assert_eq!(canonical_name("제주"), "제주특별자치도");
        assert_eq!(canonical_name("제주도"), "제주특별자치도");
    }

    #[test]
    fn test_unmapped_names_pass_through() {
        assert_eq!(canonical_name("경기도"), "경기도");
        assert_eq!(canonical_name("강원특별자치도"), "강원특별자치도");
    }

    #[test]
    fn test_mapping_values_are_fixed_points() {
        // A canonical name must never map onwards to something else.
        for canonical in REGION_MAPPING.values() {
            assert_eq!(canonical_name(canonical), *canonical);
        }
    }

    #[test]
    fn test_sentinel() {
        assert!(is_sentinel("육지"));
        assert!(!is_sentinel("서울특별시"));
    }
}
