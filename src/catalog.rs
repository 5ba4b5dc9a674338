//! Product catalog: Stripe price ids mapped to (plugin, plan), plus the
//! hardcoded static keys handed out by `/static-license`.
//!
//! The price table is configured through `STRIPE_PRICE_TABLE`:
//! `price_abc=quick-seo:life,price_def=quick-edit:year`

use std::collections::HashMap;

use thiserror::Error;

use crate::models::Plan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub plugin: String,
    pub plan: Plan,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("price table entry '{0}' must look like price_id=plugin:plan")]
    MalformedEntry(String),

    #[error("unknown plan '{plan}' for price '{price_id}'")]
    UnknownPlan { price_id: String, plan: String },

    #[error("price '{0}' is listed more than once")]
    DuplicatePrice(String),
}

#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated `price_id=plugin:plan` list. Blank input yields an empty table.
    pub fn parse(table: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        for raw in table.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (price_id, product) = raw
                .split_once('=')
                .ok_or_else(|| CatalogError::MalformedEntry(raw.to_string()))?;
            let (plugin, plan) = product
                .split_once(':')
                .ok_or_else(|| CatalogError::MalformedEntry(raw.to_string()))?;

            let (price_id, plugin, plan) = (price_id.trim(), plugin.trim(), plan.trim());
            if price_id.is_empty() || plugin.is_empty() {
                return Err(CatalogError::MalformedEntry(raw.to_string()));
            }

            let plan: Plan = plan.parse().map_err(|_| CatalogError::UnknownPlan {
                price_id: price_id.to_string(),
                plan: plan.to_string(),
            })?;

            if catalog.entries.contains_key(price_id) {
                return Err(CatalogError::DuplicatePrice(price_id.to_string()));
            }
            catalog.insert(price_id, plugin, plan);
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, price_id: &str, plugin: &str, plan: Plan) {
        self.entries.insert(
            price_id.to_string(),
            CatalogEntry {
                plugin: plugin.to_string(),
                plan,
            },
        );
    }

    pub fn resolve(&self, price_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(price_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const STATIC_ADD: &str = "QW-QUICKADD-STATIC-KEY";
const STATIC_EDIT: &str = "QW-QUICKEDIT-STATIC-KEY";
const STATIC_SEO: &str = "QW-QUICKSEO-STATIC-KEY";
const STATIC_BLOG: &str = "QW-QUICKBLOG-STATIC-KEY";

const BUNDLE_KEYS: &[&str] = &[STATIC_ADD, STATIC_EDIT, STATIC_SEO, STATIC_BLOG];

/// Hardcoded keys per product. The bundle unlocks every plugin.
pub fn static_license_keys(product: &str) -> Option<&'static [&'static str]> {
    let keys: &'static [&'static str] = match product {
        "quick-add" => &BUNDLE_KEYS[0..1],
        "quick-edit" => &BUNDLE_KEYS[1..2],
        "quick-seo" => &BUNDLE_KEYS[2..3],
        "quick-blog" => &BUNDLE_KEYS[3..4],
        "quickwoo-bundle" => BUNDLE_KEYS,
        _ => return None,
    };
    Some(keys)
}
