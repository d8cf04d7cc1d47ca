/// Item catalog
///
/// Loaded once at startup from a JSON object keyed by item id:
///
/// ```text
/// {"1": {"name": "Rusty Sword", "type": "weapon", "price": 12000}}
/// ```
///
/// The catalog is never mutated afterwards, which is what allows clients to
/// cache it for the whole lifetime of a server process.
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Catalog item identifier
///
/// Rendered as a decimal string when used as a JSON object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item id as sent by clients: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawItemId {
    Number(i64),
    Text(String),
}

impl RawItemId {
    /// Ids that are not integers can never name a catalog entry
    pub fn parse(&self) -> MarketResult<ItemId> {
        match self {
            RawItemId::Number(n) => Ok(ItemId(*n)),
            RawItemId::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(ItemId)
                .map_err(|_| MarketError::UnknownItem),
        }
    }
}

impl From<ItemId> for RawItemId {
    fn from(id: ItemId) -> Self {
        RawItemId::Number(id.0)
    }
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub price: i64,
}

/// Read-only set of purchasable items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    items: BTreeMap<ItemId, Item>,
}

impl Catalog {
    /// Parse and validate a catalog document
    pub fn from_json(json: &str) -> MarketResult<Self> {
        let catalog: Catalog = serde_json::from_str(json)
            .map_err(|e| MarketError::Config(format!("Invalid catalog: {}", e)))?;

        for (id, item) in &catalog.items {
            if item.price <= 0 {
                return Err(MarketError::Config(format!(
                    "Item {} has a non-positive price: {}",
                    id, item.price
                )));
            }
            if item.name.trim().is_empty() {
                return Err(MarketError::Config(format!("Item {} has an empty name", id)));
            }
        }

        Ok(catalog)
    }

    /// Load the catalog file
    pub async fn load(path: &Path) -> MarketResult<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            MarketError::Config(format!("Failed to read catalog {:?}: {}", path, e))
        })?;

        let catalog = Self::from_json(&json)?;
        tracing::info!("Loaded {} catalog items from {:?}", catalog.len(), path);

        Ok(catalog)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Price of an item, or `UnknownItem`
    pub fn price_of(&self, id: ItemId) -> MarketResult<i64> {
        self.get(id).map(|item| item.price).ok_or(MarketError::UnknownItem)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn items(&self) -> &BTreeMap<ItemId, Item> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<(ItemId, Item)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (ItemId, Item)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_json(
            r#"{"1": {"name": "X", "type": "T", "price": 100},
                "12": {"name": "Y", "type": "U", "price": 7}}"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.price_of(ItemId(1)).unwrap(), 100);
        assert_eq!(catalog.get(ItemId(12)).unwrap().item_type, "U");
        assert!(matches!(
            catalog.price_of(ItemId(2)),
            Err(MarketError::UnknownItem)
        ));
    }

    #[test]
    fn test_serializes_with_string_keys() {
        let catalog = Catalog::from_json(r#"{"1": {"name": "X", "type": "T", "price": 100}}"#)
            .unwrap();

        let value = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"1": {"name": "X", "type": "T", "price": 100}})
        );
    }

    #[test]
    fn test_rejects_bad_catalogs() {
        assert!(Catalog::from_json(r#"{"a": {"name": "X", "type": "T", "price": 1}}"#).is_err());
        assert!(Catalog::from_json(r#"{"1": {"name": "X", "type": "T", "price": 0}}"#).is_err());
        assert!(Catalog::from_json(r#"{"1": {"name": " ", "type": "T", "price": 5}}"#).is_err());
        assert!(Catalog::from_json("[]").is_err());
    }

    #[test]
    fn test_raw_item_id() {
        let number: RawItemId = serde_json::from_str("3").unwrap();
        assert_eq!(number.parse().unwrap(), ItemId(3));

        let text: RawItemId = serde_json::from_str(r#""17""#).unwrap();
        assert_eq!(text.parse().unwrap(), ItemId(17));

        let junk: RawItemId = serde_json::from_str(r#""sword""#).unwrap();
        assert!(matches!(junk.parse(), Err(MarketError::UnknownItem)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"{"4": {"name": "Potion", "type": "consumable", "price": 80}}"#)
            .unwrap();

        let catalog = Catalog::load(&path).await.unwrap();
        assert!(catalog.contains(ItemId(4)));

        let missing = Catalog::load(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(MarketError::Config(_))));
    }
}
