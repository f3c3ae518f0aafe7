//! Transactional storage for products and their child rows.

use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::models::Product;
use crate::transform::{NutrientFact, ProductFacts, TagKind};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Row access by natural key, valid inside one transaction.
pub trait ProductRepo {
    fn find_product(&mut self, barcode: &str) -> Result<Option<Product>, StoreError>;

    /// Returns the new product id.
    fn insert_product(&mut self, facts: &ProductFacts, now: NaiveDateTime) -> Result<i64, StoreError>;

    fn update_product(&mut self, id: i64, facts: &ProductFacts, now: NaiveDateTime) -> Result<(), StoreError>;

    fn find_nutrient_id(&mut self, product_id: i64, name: &str) -> Result<Option<i64>, StoreError>;

    fn insert_nutrient(
        &mut self,
        product_id: i64,
        nutrient: &NutrientFact,
        now: NaiveDateTime,
    ) -> Result<(), StoreError>;

    fn update_nutrient(&mut self, id: i64, nutrient: &NutrientFact, now: NaiveDateTime) -> Result<(), StoreError>;

    fn find_tag_id(&mut self, kind: TagKind, product_id: i64, name: &str) -> Result<Option<i64>, StoreError>;

    fn insert_tag(
        &mut self,
        kind: TagKind,
        product_id: i64,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// Refresh `updated_at` on an existing tag row.
    fn touch_tag(&mut self, kind: TagKind, id: i64, now: NaiveDateTime) -> Result<(), StoreError>;
}

pub trait ProductStore {
    /// Run `f` in a transaction: committed if it returns `Ok`, rolled back
    /// otherwise.
    fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn ProductRepo) -> Result<T, StoreError>;
}

impl<S: ProductStore> ProductStore for &mut S {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn ProductRepo) -> Result<T, StoreError>,
    {
        (**self).transaction(f)
    }
}
