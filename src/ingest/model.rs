use serde::Serialize;
use serde_json::Value;

use crate::model::Product;

/// Product body in the shape the ingestion service accepts.
#[derive(Serialize, Debug, PartialEq)]
pub struct ProductPayload<'a> {
    #[serde(rename = "CODIGO_PRODUCTO")]
    pub code: &'a str,
    #[serde(rename = "NOMBRE_PRODUCTO")]
    pub name: &'a str,
    #[serde(rename = "PREVTA1_PRODUCTO")]
    pub price: f64,
    #[serde(rename = "AUTOR")]
    pub owner: &'a str,
    #[serde(rename = "FOTO")]
    pub assets: &'a [String],
    #[serde(rename = "FOTO_LENGTH")]
    pub photo_length: i64,
}

impl<'a> From<&'a Product> for ProductPayload<'a> {
    fn from(p: &'a Product) -> Self {
        Self {
            code: &p.code,
            name: &p.name,
            price: p.price,
            owner: &p.owner,
            assets: &p.assets,
            photo_length: p.photo_length,
        }
    }
}

/// Extract the numeric `id` from an upload response body.
/// Integral floats within `i64` range are accepted; anything else yields `None`.
pub fn parse_asset_id(body: &Value) -> Option<i64> {
    let id = body.get("id")?;
    if let Some(n) = id.as_i64() {
        return Some(n);
    }
    id.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}
