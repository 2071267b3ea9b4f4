use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Product, ProductId, ValidationError, ValidationResult};

/// Smallest amount a cart entry may hold
pub const MIN_CART_AMOUNT: u32 = 1;

/// A product in the cart together with the desired amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub image: String,
    pub amount: u32,
}

/// Ordered list of cart entries, at most one per product
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

/// Request model for setting the amount of a cart entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub product_id: ProductId,
    pub amount: u32,
}

impl CartEntry {
    /// Create an entry for a freshly added product
    pub fn from_product(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            price: product.price,
            image: product.image,
            amount: MIN_CART_AMOUNT,
        }
    }

    /// Price times amount, clamped to `Decimal::MAX`
    pub fn line_total(&self) -> Decimal {
        self.price
            .checked_mul(Decimal::from(self.amount))
            .unwrap_or(Decimal::MAX)
    }
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from stored entries, rejecting duplicates and empty amounts
    pub fn try_from_entries(entries: Vec<CartEntry>) -> ValidationResult<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.id) {
                return Err(ValidationError::DuplicateEntry {
                    product_id: entry.id,
                });
            }
            if entry.amount < MIN_CART_AMOUNT {
                return Err(ValidationError::OutOfRange {
                    field: format!("amount[{}]", entry.id),
                    min: MIN_CART_AMOUNT.to_string(),
                    value: entry.amount.to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn find(&self, product_id: ProductId) -> Option<&CartEntry> {
        self.entries.iter().find(|entry| entry.id == product_id)
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries.iter().any(|entry| entry.id == product_id)
    }

    /// Append an entry at the end. Returns false, leaving the cart untouched,
    /// if the product is already present.
    pub fn insert_entry(&mut self, entry: CartEntry) -> bool {
        if self.contains(entry.id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry for a product, keeping the order of the rest
    pub fn remove_entry(&mut self, product_id: ProductId) -> bool {
        let original_len = self.entries.len();
        self.entries.retain(|entry| entry.id != product_id);
        self.entries.len() != original_len
    }

    /// Set the amount of an existing entry in place
    pub fn set_amount(&mut self, product_id: ProductId, amount: u32) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == product_id) {
            Some(entry) => {
                entry.amount = amount;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of amounts across all entries
    pub fn total_items(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |total, entry| total.saturating_add(u64::from(entry.amount)))
    }

    /// Sum of line totals, clamped to `Decimal::MAX`
    pub fn subtotal(&self) -> Decimal {
        self.entries.iter().fold(Decimal::ZERO, |total, entry| {
            total
                .checked_add(entry.line_total())
                .unwrap_or(Decimal::MAX)
        })
    }
}
