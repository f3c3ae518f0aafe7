//! Idempotent, per-record writes keyed by barcode.

use chrono::{NaiveDateTime, Utc};

use crate::error::{StoreError, WriteError};
use crate::store::{ProductRepo, ProductStore};
use crate::transform::{TagKind, TransformedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
}

pub struct UpsertWriter<S> {
    store: S,
}

impl<S: ProductStore> UpsertWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn upsert(&mut self, record: &TransformedRecord) -> Result<WriteOutcome, WriteError> {
        self.upsert_at(record, Utc::now().naive_utc())
    }

    /// Write `record` and all its child rows in one transaction, stamping
    /// every touched row with `now`.
    pub fn upsert_at(
        &mut self,
        record: &TransformedRecord,
        now: NaiveDateTime,
    ) -> Result<WriteOutcome, WriteError> {
        self.store
            .transaction(|repo| write_record(repo, record, now))
            .map_err(|source| WriteError {
                barcode: record.barcode().to_string(),
                source,
            })
    }
}

fn write_record(
    repo: &mut dyn ProductRepo,
    record: &TransformedRecord,
    now: NaiveDateTime,
) -> Result<WriteOutcome, StoreError> {
    let (product_id, outcome) = match repo.find_product(record.barcode())? {
        Some(existing) => {
            repo.update_product(existing.id, &record.product, now)?;
            (existing.id, WriteOutcome::Updated)
        }
        None => (repo.insert_product(&record.product, now)?, WriteOutcome::Created),
    };

    for nutrient in &record.nutrients {
        match repo.find_nutrient_id(product_id, &nutrient.name)? {
            Some(id) => repo.update_nutrient(id, nutrient, now)?,
            None => repo.insert_nutrient(product_id, nutrient, now)?,
        }
    }

    for kind in TagKind::ALL {
        for name in record.tags(kind) {
            match repo.find_tag_id(kind, product_id, name)? {
                Some(id) => repo.touch_tag(kind, id, now)?,
                None => repo.insert_tag(kind, product_id, name, now)?,
            }
        }
    }

    Ok(outcome)
}
