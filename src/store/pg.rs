use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

use super::{ProductRepo, ProductStore};
use crate::error::StoreError;
use crate::models::{NewNutrient, NewProduct, NutrientChanges, Product, ProductChanges};
use crate::schema::{nutrients, products};
use crate::transform::{NutrientFact, ProductFacts, TagKind};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Runs `$body` with `$table` bound to the schema module for `$kind`.
macro_rules! with_tag_table {
    ($kind:expr, $table:ident => $body:expr) => {
        match $kind {
            TagKind::Ingredient => {
                use crate::schema::ingredients as $table;
                $body
            }
            TagKind::Category => {
                use crate::schema::categories as $table;
                $body
            }
            TagKind::Country => {
                use crate::schema::countries as $table;
                $body
            }
        }
    };
}

/// PostgreSQL store; one pooled connection per transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        log::info!("Database pool ready (max size {})", pool_size);
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProductStore for PgStore {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn ProductRepo) -> Result<T, StoreError>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction(|conn| f(&mut PgRepo { conn }))
    }
}

fn expect_one_row(updated: usize, what: &str, id: i64) -> Result<(), StoreError> {
    if updated == 0 {
        return Err(StoreError::Constraint(format!("no {what} with id {id}")));
    }
    Ok(())
}

struct PgRepo<'c> {
    conn: &'c mut PgConnection,
}

impl ProductRepo for PgRepo<'_> {
    fn find_product(&mut self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let product = products::table
            .filter(products::barcode.eq(barcode))
            .select(Product::as_select())
            .first(self.conn)
            .optional()?;
        Ok(product)
    }

    fn insert_product(&mut self, facts: &ProductFacts, now: NaiveDateTime) -> Result<i64, StoreError> {
        let id = diesel::insert_into(products::table)
            .values(&NewProduct::new(facts, now))
            .returning(products::id)
            .get_result(self.conn)?;
        Ok(id)
    }

    fn update_product(&mut self, id: i64, facts: &ProductFacts, now: NaiveDateTime) -> Result<(), StoreError> {
        let updated = diesel::update(products::table.find(id))
            .set(&ProductChanges::new(facts, now))
            .execute(self.conn)?;
        expect_one_row(updated, "product", id)
    }

    fn find_nutrient_id(&mut self, product_id: i64, name: &str) -> Result<Option<i64>, StoreError> {
        let id = nutrients::table
            .filter(nutrients::product_id.eq(product_id))
            .filter(nutrients::name.eq(name))
            .select(nutrients::id)
            .first(self.conn)
            .optional()?;
        Ok(id)
    }

    fn insert_nutrient(
        &mut self,
        product_id: i64,
        nutrient: &NutrientFact,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        diesel::insert_into(nutrients::table)
            .values(&NewNutrient::new(product_id, nutrient, now))
            .execute(self.conn)?;
        Ok(())
    }

    fn update_nutrient(&mut self, id: i64, nutrient: &NutrientFact, now: NaiveDateTime) -> Result<(), StoreError> {
        let updated = diesel::update(nutrients::table.find(id))
            .set(&NutrientChanges {
                value_per_100g: nutrient.value_per_100g,
                unit: nutrient.unit.as_deref(),
                updated_at: now,
            })
            .execute(self.conn)?;
        expect_one_row(updated, "nutrient", id)
    }

    fn find_tag_id(&mut self, kind: TagKind, product_id: i64, name: &str) -> Result<Option<i64>, StoreError> {
        let conn = &mut *self.conn;
        let id = with_tag_table!(kind, tags => tags::table
            .filter(tags::product_id.eq(product_id))
            .filter(tags::name.eq(name))
            .select(tags::id)
            .first::<i64>(conn)
            .optional()?);
        Ok(id)
    }

    fn insert_tag(
        &mut self,
        kind: TagKind,
        product_id: i64,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let conn = &mut *self.conn;
        with_tag_table!(kind, tags => diesel::insert_into(tags::table)
            .values((
                tags::product_id.eq(product_id),
                tags::name.eq(name),
                tags::created_at.eq(now),
                tags::updated_at.eq(now),
            ))
            .execute(conn)?);
        Ok(())
    }

    fn touch_tag(&mut self, kind: TagKind, id: i64, now: NaiveDateTime) -> Result<(), StoreError> {
        let conn = &mut *self.conn;
        let updated = with_tag_table!(kind, tags => diesel::update(tags::table.find(id))
            .set(tags::updated_at.eq(now))
            .execute(conn)?);
        expect_one_row(updated, kind.as_str(), id)
    }
}
