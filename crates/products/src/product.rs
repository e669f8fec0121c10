use serde::{Deserialize, Serialize};

use offerbook_core::{DomainError, OfferId, SellerId};

/// Longest product name (in chars, not bytes) a catalog accepts.
pub const MAX_NAME_LEN: usize = 100;

pub const MSG_TOO_LONG_NAME: &str = "too long name";

/// Column names of the fixed five-column layout, in sheet order.
pub mod field {
    pub const OFFER_ID: &str = "offer_id";
    pub const NAME: &str = "name";
    pub const PRICE: &str = "price";
    pub const QUANTITY: &str = "quantity";
    pub const AVAILABLE: &str = "available";
}

/// One product line as the seller describes it (seller scope is carried by the
/// surrounding request, not by the record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub offer_id: OfferId,
    pub name: String,
    pub price: u64, // smallest currency unit
    pub quantity: u64,
}

impl ProductRecord {
    /// Apply the catalog's domain rules.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(field::NAME, MSG_TOO_LONG_NAME));
        }
        Ok(())
    }

    pub fn into_entry(self, seller_id: SellerId) -> CatalogEntry {
        CatalogEntry {
            seller_id,
            offer_id: self.offer_id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
        }
    }
}

/// A parsed row that has not been classified yet.
///
/// `available == false` asks for deletion; `true` means "this record should
/// exist with these values".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUpdate {
    pub record: ProductRecord,
    pub available: bool,
    /// 1-based source line, used to attribute validation errors.
    pub row: u64,
}

impl CandidateUpdate {
    pub fn new(record: ProductRecord, available: bool, row: u64) -> Self {
        Self {
            record,
            available,
            row,
        }
    }

    pub fn offer_id(&self) -> OfferId {
        self.record.offer_id
    }
}

/// Persisted form of a record: one row of a seller's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub seller_id: SellerId,
    pub offer_id: OfferId,
    pub name: String,
    pub price: u64,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ProductRecord {
        ProductRecord {
            offer_id: OfferId::new(1),
            name: name.to_string(),
            price: 10,
            quantity: 1,
        }
    }

    #[test]
    fn name_of_exactly_max_chars_is_valid() {
        assert!(record(&"a".repeat(MAX_NAME_LEN)).validate().is_ok());
    }

    #[test]
    fn name_over_max_chars_is_rejected() {
        let err = record(&"a".repeat(MAX_NAME_LEN + 1)).validate().unwrap_err();
        assert_eq!(err, DomainError::validation("name", "too long name"));
    }

    #[test]
    fn name_length_counts_chars_not_bytes() {
        // 100 Cyrillic letters are 200 bytes but still a valid name.
        assert!(record(&"ж".repeat(MAX_NAME_LEN)).validate().is_ok());
        assert!(record(&"ж".repeat(MAX_NAME_LEN + 1)).validate().is_err());
    }

    #[test]
    fn entry_serializes_with_camel_case_keys() {
        let entry = record("head").into_entry(SellerId::new(2));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sellerId": 2,
                "offerId": 1,
                "name": "head",
                "price": 10,
                "quantity": 1,
            })
        );
    }
}
