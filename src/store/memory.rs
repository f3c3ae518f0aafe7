use chrono::NaiveDateTime;

use super::{ProductRepo, ProductStore};
use crate::error::StoreError;
use crate::models::{Nutrient, Product, Tag};
use crate::transform::{NutrientFact, ProductFacts, TagKind};

/// In-process store with the same uniqueness rules as the SQL schema.
///
/// Transactions run against a copy of the tables that replaces the live
/// tables only on success. Used for `--dry-run` and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Vec<Product>,
    nutrients: Vec<Nutrient>,
    tags: Vec<(TagKind, Tag)>,
    last_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> &[Product] {
        &self.tables.products
    }

    pub fn product(&self, barcode: &str) -> Option<&Product> {
        self.tables.products.iter().find(|p| p.barcode == barcode)
    }

    pub fn nutrients(&self, product_id: i64) -> Vec<&Nutrient> {
        self.tables
            .nutrients
            .iter()
            .filter(|n| n.product_id == product_id)
            .collect()
    }

    pub fn tags(&self, kind: TagKind, product_id: i64) -> Vec<&Tag> {
        self.tables
            .tags
            .iter()
            .filter(|(k, t)| *k == kind && t.product_id == product_id)
            .map(|(_, t)| t)
            .collect()
    }

    pub fn tag_names(&self, kind: TagKind, product_id: i64) -> Vec<&str> {
        self.tags(kind, product_id)
            .into_iter()
            .map(|t| t.name.as_str())
            .collect()
    }
}

impl ProductStore for MemoryStore {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn ProductRepo) -> Result<T, StoreError>,
    {
        let mut working = self.tables.clone();
        let result = f(&mut working)?;
        self.tables = working;
        Ok(result)
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn require_product(&self, product_id: i64) -> Result<(), StoreError> {
        if self.products.iter().any(|p| p.id == product_id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("no product with id {product_id}")))
        }
    }
}

fn missing_row(what: &str, id: i64) -> StoreError {
    StoreError::Constraint(format!("no {what} with id {id}"))
}

impl ProductRepo for Tables {
    fn find_product(&mut self, barcode: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.products.iter().find(|p| p.barcode == barcode).cloned())
    }

    fn insert_product(&mut self, facts: &ProductFacts, now: NaiveDateTime) -> Result<i64, StoreError> {
        if self.products.iter().any(|p| p.barcode == facts.barcode) {
            return Err(StoreError::Constraint(format!(
                "duplicate barcode {}",
                facts.barcode
            )));
        }
        let id = self.next_id();
        self.products.push(Product {
            id,
            barcode: facts.barcode.clone(),
            product_name: facts.product_name.clone(),
            brand: facts.brand.clone(),
            packaging: facts.packaging.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn update_product(&mut self, id: i64, facts: &ProductFacts, now: NaiveDateTime) -> Result<(), StoreError> {
        let product = self
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| missing_row("product", id))?;
        product.product_name = facts.product_name.clone();
        product.brand = facts.brand.clone();
        product.packaging = facts.packaging.clone();
        product.updated_at = now;
        Ok(())
    }

    fn find_nutrient_id(&mut self, product_id: i64, name: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .nutrients
            .iter()
            .find(|n| n.product_id == product_id && n.name == name)
            .map(|n| n.id))
    }

    fn insert_nutrient(
        &mut self,
        product_id: i64,
        nutrient: &NutrientFact,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        self.require_product(product_id)?;
        if self.find_nutrient_id(product_id, &nutrient.name)?.is_some() {
            return Err(StoreError::Constraint(format!(
                "duplicate nutrient {} for product {product_id}",
                nutrient.name
            )));
        }
        let id = self.next_id();
        self.nutrients.push(Nutrient {
            id,
            product_id,
            name: nutrient.name.clone(),
            value_per_100g: nutrient.value_per_100g,
            unit: nutrient.unit.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    fn update_nutrient(&mut self, id: i64, nutrient: &NutrientFact, now: NaiveDateTime) -> Result<(), StoreError> {
        let row = self
            .nutrients
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| missing_row("nutrient", id))?;
        row.value_per_100g = nutrient.value_per_100g;
        row.unit = nutrient.unit.clone();
        row.updated_at = now;
        Ok(())
    }

    fn find_tag_id(&mut self, kind: TagKind, product_id: i64, name: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .tags
            .iter()
            .find(|(k, t)| *k == kind && t.product_id == product_id && t.name == name)
            .map(|(_, t)| t.id))
    }

    fn insert_tag(
        &mut self,
        kind: TagKind,
        product_id: i64,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        self.require_product(product_id)?;
        if self.find_tag_id(kind, product_id, name)?.is_some() {
            return Err(StoreError::Constraint(format!(
                "duplicate {} {name} for product {product_id}",
                kind.as_str()
            )));
        }
        let id = self.next_id();
        self.tags.push((
            kind,
            Tag {
                id,
                product_id,
                name: name.to_string(),
                created_at: now,
                updated_at: now,
            },
        ));
        Ok(())
    }

    fn touch_tag(&mut self, kind: TagKind, id: i64, now: NaiveDateTime) -> Result<(), StoreError> {
        let (_, tag) = self
            .tags
            .iter_mut()
            .find(|(k, t)| *k == kind && t.id == id)
            .ok_or_else(|| missing_row(kind.as_str(), id))?;
        tag.updated_at = now;
        Ok(())
    }
}
