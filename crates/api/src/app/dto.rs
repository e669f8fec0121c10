use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;

use offerbook_core::{OfferId, SellerId};
use offerbook_infra::ProductFilter;
use offerbook_products::{CandidateUpdate, ProductRecord};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ImportTableRequest {
    #[serde(rename = "tableURL")]
    pub table_url: String,
    #[serde(rename = "sellerId")]
    pub seller_id: SellerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub offer_id: OfferId,
    pub name: String,
    pub price: u64,
    pub quantity: u64,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub seller_id: SellerId,
    #[serde(default)]
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    /// Items become candidates numbered by their 1-based position.
    pub fn into_candidates(self) -> (SellerId, Vec<CandidateUpdate>) {
        let candidates = self
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                CandidateUpdate::new(
                    ProductRecord {
                        offer_id: item.offer_id,
                        name: item.name.trim().to_string(),
                        price: item.price,
                        quantity: item.quantity,
                    },
                    item.available,
                    i as u64 + 1,
                )
            })
            .collect();
        (self.seller_id, candidates)
    }
}

/// `GET /products` query string; id lists are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub seller_id: Option<String>,
    pub offer_id: Option<String>,
    pub substring: Option<String>,
}

impl ProductsQuery {
    pub fn into_filter(self) -> Result<ProductFilter, axum::response::Response> {
        Ok(ProductFilter {
            seller_ids: parse_id_list(self.seller_id.as_deref())?,
            offer_ids: parse_id_list(self.offer_id.as_deref())?,
            substring: self.substring.unwrap_or_default(),
        })
    }
}

/// Blank pieces are skipped, so `"1,,2"` and `"1,2,"` both mean `[1, 2]`.
fn parse_id_list<T>(raw: Option<&str>) -> Result<Vec<T>, axum::response::Response>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            piece
                .parse()
                .map_err(|e: T::Err| errors::json_error(StatusCode::BAD_REQUEST, "invalid_filter", e.to_string()))
        })
        .collect()
}
