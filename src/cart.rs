//! Shopping cart store
//!
//! The single source of truth for pre-checkout state: an ordered collection
//! of line items keyed by product id, persisted through an injected adapter
//! so it survives a reload. Scoped to one profile; never shared across
//! clients.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::domain::Product;
use crate::money::Amount;
use crate::{MarketError, ProductId, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: u32,
    /// Stock at add time; refreshed against live snapshots before checkout.
    pub stock: u32,
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Amount {
        self.unit_price.times(self.quantity)
    }
}

/// Where the cart lives between sessions.
pub trait CartStorage {
    fn load(&self) -> Result<Vec<CartItem>>;
    fn save(&self, items: &[CartItem]) -> Result<()>;
}

/// Keeps the cart in process memory only. For tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<Vec<CartItem>>,
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<CartItem>> {
        Ok(self.items.lock().map_err(poisoned)?.clone())
    }

    fn save(&self, items: &[CartItem]) -> Result<()> {
        *self.items.lock().map_err(poisoned)? = items.to_vec();
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> MarketError {
    MarketError::Storage("cart storage lock poisoned".into())
}

/// One JSON document on disk, the browser-profile analog.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<CartItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| MarketError::Storage(e.to_string()))
    }

    fn save(&self, items: &[CartItem]) -> Result<()> {
        let raw = serde_json::to_string(items)
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| MarketError::Storage(e.to_string()))
    }
}

/// Ordered cart contents; insertion order defines display order. Every
/// mutation writes through to storage, and quantities are kept in
/// `[1, stock]` at all times.
pub struct CartStore<S: CartStorage> {
    items: Vec<CartItem>,
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    pub fn open(storage: S) -> Result<Self> {
        let items = storage.load()?;
        Ok(Self { items, storage })
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Adds an item, merging with an existing line for the same product.
    /// Quantity is capped at the product's known stock.
    pub fn add(&mut self, item: CartItem) -> Result<()> {
        if item.quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if item.stock == 0 {
            return Err(MarketError::OutOfStock { name: item.name });
        }
        match self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                // the incoming snapshot carries the fresher stock count
                existing.stock = item.stock;
                existing.unit_price = item.unit_price;
                existing.quantity = existing.quantity.saturating_add(item.quantity).min(item.stock);
            }
            None => {
                let mut item = item;
                item.quantity = item.quantity.min(item.stock);
                self.items.push(item);
            }
        }
        self.persist()
    }

    /// Zero removes the line; anything else is clamped into `[1, stock]`.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or(MarketError::ItemNotFound)?;
        item.quantity = quantity.clamp(1, item.stock.max(1));
        self.persist()
    }

    pub fn remove(&mut self, product_id: ProductId) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(MarketError::ItemNotFound);
        }
        self.persist()
    }

    /// Only invoked after an order has been durably created.
    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    /// Recomputed on every read, never cached.
    pub fn total(&self) -> Amount {
        self.items
            .iter()
            .fold(Amount::ZERO, |acc, i| acc.plus(i.line_total()))
    }

    /// Re-validates held quantities against fresh product snapshots before a
    /// purchase is submitted. Quantities are clamped down, never up; items
    /// whose product went out of stock stay and fail the checkout stock
    /// check.
    pub fn refresh_stock(&mut self, fresh: &[Product]) -> Result<()> {
        for item in &mut self.items {
            if let Some(product) = fresh.iter().find(|p| p.id == item.product_id) {
                item.stock = product.stock;
                if item.stock > 0 {
                    item.quantity = item.quantity.min(item.stock);
                }
            }
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.storage.save(&self.items)
    }
}
