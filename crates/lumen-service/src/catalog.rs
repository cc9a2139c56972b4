//! # Catalog Service
//!
//! Validated product management over the storage contract: creation,
//! edits, restock, lookup by SKU (the barcode-scan path), and soft
//! deletion. Stock *decrements* stay the checkout processor's exclusive
//! job; this service only ever adds stock back.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use lumen_core::{validation, CoreError, Product};
use lumen_store::{Storage, StoreError};

use crate::error::ServiceResult;

/// Input for creating a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    /// Falls back to the store-wide default tax rate when absent.
    pub tax_rate_bps: Option<u32>,
    pub stock_qty: i64,
    pub track_inventory: bool,
}

/// Catalog management for inventory screens.
pub struct CatalogService {
    store: Arc<dyn Storage>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        CatalogService { store }
    }

    /// Creates a product after field validation and a descriptive
    /// duplicate-SKU check, both ahead of any mutation.
    pub async fn create_product(&self, input: NewProduct) -> ServiceResult<Product> {
        validation::validate_sku(&input.sku).map_err(CoreError::from)?;
        validation::validate_product_name(&input.name).map_err(CoreError::from)?;
        validation::validate_price(input.price_cents).map_err(CoreError::from)?;

        if self.store.get_product_by_sku(&input.sku).await?.is_some() {
            return Err(StoreError::duplicate("sku", &input.sku).into());
        }

        let tax_rate_bps = match input.tax_rate_bps {
            Some(bps) => bps,
            None => self.store.get_settings().await?.default_tax_rate_bps,
        };

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku,
            name: input.name,
            description: input.description,
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            tax_rate_bps,
            stock_qty: input.stock_qty,
            track_inventory: input.track_inventory,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let product = self.store.create_product(product).await?;
        info!(sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Applies a catalog edit. Historical sale items are unaffected;
    /// they carry their own snapshots.
    pub async fn update_product(&self, product: Product) -> ServiceResult<Product> {
        validation::validate_sku(&product.sku).map_err(CoreError::from)?;
        validation::validate_product_name(&product.name).map_err(CoreError::from)?;
        validation::validate_price(product.price_cents).map_err(CoreError::from)?;

        Ok(self.store.update_product(product).await?)
    }

    /// Adds received stock onto a product. Returns the new stock level.
    pub async fn restock(&self, product_id: &str, quantity: i64) -> ServiceResult<i64> {
        validation::validate_quantity(quantity).map_err(CoreError::from)?;

        let new_qty = self.store.adjust_stock(product_id, quantity, false).await?;
        info!(product_id = %product_id, quantity, new_qty, "Product restocked");
        Ok(new_qty)
    }

    /// Soft delete: the product disappears from sale but stays behind
    /// historical sale items.
    pub async fn deactivate_product(&self, product_id: &str) -> ServiceResult<()> {
        self.store.deactivate_product(product_id).await?;
        info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }

    /// Barcode-scan path: resolve a scanned SKU to a sellable product.
    pub async fn find_by_sku(&self, sku: &str) -> ServiceResult<Option<Product>> {
        Ok(self
            .store
            .get_product_by_sku(sku)
            .await?
            .filter(|p| p.is_active))
    }

    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }
}
