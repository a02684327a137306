//! Store metadata attached to each upload.

use serde::{Deserialize, Serialize};

/// Retail category, serialized with the catalog's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Supermercato")]
    Supermarket,
    #[serde(rename = "Discount")]
    Discount,
    #[serde(rename = "Elettronica")]
    Electronics,
    #[serde(rename = "Sport")]
    Sport,
    #[serde(rename = "Casa e Giardino")]
    HomeAndGarden,
    #[serde(rename = "Farmacia")]
    Pharmacy,
    #[serde(rename = "Altro")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::Supermarket,
        Self::Discount,
        Self::Electronics,
        Self::Sport,
        Self::HomeAndGarden,
        Self::Pharmacy,
        Self::Other,
    ];

    /// Label the catalog expects in the `category` field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Supermarket => "Supermercato",
            Self::Discount => "Discount",
            Self::Electronics => "Elettronica",
            Self::Sport => "Sport",
            Self::HomeAndGarden => "Casa e Giardino",
            Self::Pharmacy => "Farmacia",
            Self::Other => "Altro",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Supermarket => "supermarket",
            Self::Discount => "discount",
            Self::Electronics => "electronics",
            Self::Sport => "sport",
            Self::HomeAndGarden => "home",
            Self::Pharmacy => "pharmacy",
            Self::Other => "other",
        }
    }

    /// Parse either a catalog label (`Casa e Giardino`) or a short key (`home`).
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s) || c.key().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inferred metadata for one flyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub category: Category,
    /// Italian postal code (CAP) sent as `location.cap`.
    pub cap: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label_or_key() {
        assert_eq!(Category::from_label("Supermercato"), Some(Category::Supermarket));
        assert_eq!(Category::from_label("casa e giardino"), Some(Category::HomeAndGarden));
        assert_eq!(Category::from_label("home"), Some(Category::HomeAndGarden));
        assert_eq!(Category::from_label("groceries"), None);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::Pharmacy).unwrap();
        assert_eq!(json, "\"Farmacia\"");
    }
}
