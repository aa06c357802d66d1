//! Governorate codes embedded in positions 8-9 of a National ID

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Static code table. Codes are the two digits as they appear in the ID.
const GOVERNORATES: &[(&str, &str)] = &[
    ("01", "Cairo"),
    ("02", "Alexandria"),
    ("03", "Port Said"),
    ("04", "Suez"),
    ("11", "Damietta"),
    ("12", "Dakahlia"),
    ("13", "Sharkia"),
    ("14", "Qalyubia"),
    ("15", "Kafr El Sheikh"),
    ("16", "Gharbia"),
    ("17", "Monufia"),
    ("18", "Beheira"),
    ("19", "Ismailia"),
    ("21", "Giza"),
    ("22", "Beni Suef"),
    ("23", "Fayoum"),
    ("24", "Minya"),
    ("25", "Assiut"),
    ("26", "Sohag"),
    ("27", "Qena"),
    ("28", "Aswan"),
    ("29", "Luxor"),
    ("31", "Red Sea"),
    ("32", "New Valley"),
    ("33", "Matrouh"),
    ("34", "North Sinai"),
    ("35", "South Sinai"),
    ("88", "Foreign Residents"),
];

static BY_CODE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| GOVERNORATES.iter().copied().collect());

/// Resolve a two-digit governorate code to its name
pub fn lookup(code: &str) -> Option<&'static str> {
    BY_CODE.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(lookup("01"), Some("Cairo"));
        assert_eq!(lookup("21"), Some("Giza"));
        assert_eq!(lookup("88"), Some("Foreign Residents"));
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(lookup("00"), None);
        assert_eq!(lookup("05"), None);
        assert_eq!(lookup("99"), None);
        assert_eq!(lookup("1"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_table_has_unique_codes() {
        assert_eq!(BY_CODE.len(), GOVERNORATES.len());
        assert_eq!(GOVERNORATES.len(), 28);
    }
}
