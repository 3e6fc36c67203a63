// Listing data model shared by the provider client, the cache store and the account store

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Rent,
    Sale,
}

impl ListingType {
    pub const ALL: [ListingType; 2] = [ListingType::Rent, ListingType::Sale];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Rent => "rent",
            ListingType::Sale => "sale",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingCategory {
    #[serde(rename = "HDB")]
    Hdb,
    Condo,
    Landed,
}

impl ListingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingCategory::Hdb => "HDB",
            ListingCategory::Condo => "Condo",
            ListingCategory::Landed => "Landed",
        }
    }
}

impl fmt::Display for ListingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-defined display attribute (price, bedroom count, formatted labels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub category: String,
    pub url: String,
}

/// One property as returned by the listings provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub listing_type: ListingType,
    pub category: ListingCategory,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    pub address: String,
    #[serde(default)]
    pub cluster_ids: Vec<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl Listing {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn cover_photo(&self) -> Option<&Photo> {
        self.photos.first()
    }
}

/// Per listing type bookkeeping of how far pagination has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub current_count: usize,
    pub page_size: u32,
    pub page_num: u32,
}

impl PaginationCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_count: 0,
            page_size,
            page_num: 1,
        }
    }
}

/// A user's bookmark holding a stringified snapshot of the listing at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedListing {
    pub user_id: String,
    pub listing_id: String,
    pub snapshot: String,
    pub saved_at: DateTime<Utc>,
}

impl SavedListing {
    pub fn from_listing(user_id: &str, listing: &Listing) -> Result<Self, serde_json::Error> {
        Ok(Self {
            user_id: user_id.to_string(),
            listing_id: listing.id.clone(),
            snapshot: serde_json::to_string(listing)?,
            saved_at: Utc::now(),
        })
    }

    pub fn listing(&self) -> Result<Listing, serde_json::Error> {
        serde_json::from_str(&self.snapshot)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn listing(id: &str, listing_type: ListingType, price: f64) -> Listing {
        let mut attributes = BTreeMap::new();
        attributes.insert("price".to_string(), AttributeValue::Number(price));
        attributes.insert("bedrooms".to_string(), AttributeValue::Text("3".to_string()));
        Listing {
            id: id.to_string(),
            listing_type,
            category: ListingCategory::Condo,
            attributes,
            address: format!("{} Orchard Road", id),
            cluster_ids: vec![format!("cluster-{}", id)],
            photos: vec![Photo {
                id: format!("{}-p1", id),
                category: "Living room".to_string(),
                url: format!("https://img.example.com/{}/1.jpg", id),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(ListingType::Rent, "\"rent\"")]
    #[test_case(ListingType::Sale, "\"sale\"")]
    fn test_listing_type_wire_names(listing_type: ListingType, expected: &str) {
        assert_eq!(serde_json::to_string(&listing_type).unwrap(), expected);
    }

    #[test]
    fn test_listing_decodes_heterogeneous_attributes() {
        let value = json!({
            "id": "L1",
            "listing_type": "rent",
            "category": "HDB",
            "attributes": { "price": 2800, "price_label": "S$2,800/mo" },
            "address": "Blk 123 Tampines St 11",
            "cluster_ids": ["tampines-11"],
            "photos": [{ "id": "p1", "category": "Kitchen", "url": "https://img/1.jpg" }]
        });

        let listing: Listing = serde_json::from_value(value).unwrap();
        assert_eq!(listing.category, ListingCategory::Hdb);
        assert_eq!(listing.attribute("price"), Some(&AttributeValue::Number(2800.0)));
        assert_eq!(
            listing.attribute("price_label"),
            Some(&AttributeValue::Text("S$2,800/mo".to_string()))
        );
        assert_eq!(listing.cover_photo().map(|p| p.id.as_str()), Some("p1"));
    }

    #[test]
    fn test_saved_listing_snapshot_restores_listing() {
        let listing = fixtures::listing("L9", ListingType::Sale, 1_250_000.0);
        let saved = SavedListing::from_listing("user-1", &listing).unwrap();

        assert_eq!(saved.listing_id, "L9");
        assert_eq!(saved.listing().unwrap(), listing);
    }

    #[test]
    fn test_cursor_starts_on_first_page() {
        let cursor = PaginationCursor::new(20);
        assert_eq!(cursor.page_num, 1);
        assert_eq!(cursor.current_count, 0);
    }
}
