use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::transform::{NutrientFact, ProductFacts};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Product {
    pub id: i64,
    pub barcode: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub packaging: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct<'a> {
    pub barcode: &'a str,
    pub product_name: Option<&'a str>,
    pub brand: Option<&'a str>,
    pub packaging: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewProduct<'a> {
    pub fn new(facts: &'a ProductFacts, now: NaiveDateTime) -> Self {
        Self {
            barcode: &facts.barcode,
            product_name: facts.product_name.as_deref(),
            brand: facts.brand.as_deref(),
            packaging: facts.packaging.as_deref(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Mutable product columns. Absent values overwrite with NULL.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_null = true)]
pub struct ProductChanges<'a> {
    pub product_name: Option<&'a str>,
    pub brand: Option<&'a str>,
    pub packaging: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

impl<'a> ProductChanges<'a> {
    pub fn new(facts: &'a ProductFacts, now: NaiveDateTime) -> Self {
        Self {
            product_name: facts.product_name.as_deref(),
            brand: facts.brand.as_deref(),
            packaging: facts.packaging.as_deref(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::nutrients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Nutrient {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub value_per_100g: f64,
    pub unit: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::nutrients)]
pub struct NewNutrient<'a> {
    pub product_id: i64,
    pub name: &'a str,
    pub value_per_100g: f64,
    pub unit: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewNutrient<'a> {
    pub fn new(product_id: i64, fact: &'a NutrientFact, now: NaiveDateTime) -> Self {
        Self {
            product_id,
            name: &fact.name,
            value_per_100g: fact.value_per_100g,
            unit: fact.unit.as_deref(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::nutrients)]
#[diesel(treat_none_as_null = true)]
pub struct NutrientChanges<'a> {
    pub value_per_100g: f64,
    pub unit: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

/// A row of `ingredients`, `categories` or `countries`; the three tables
/// share one shape.
#[derive(Debug, Clone, PartialEq, Queryable)]
pub struct Tag {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
