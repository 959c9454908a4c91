// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Catalog entities: the priced works and materials the picker draws from.
//! These live in the database; estimate lines copy their name/unit/price at
//! insertion time and never reference them again.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{MaterialCategoryId, MaterialId, WorkCategoryId, WorkId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCategory {
    pub id: WorkCategoryId,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCategory {
    pub id: MaterialCategoryId,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogWork {
    pub id: WorkId,
    pub name: String,
    pub unit: String,
    pub price_kopecks: i64,
    pub category_id: WorkCategoryId,
    pub keywords: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMaterial {
    pub id: MaterialId,
    pub name: String,
    pub unit: String,
    pub price_kopecks: i64,
    pub category_id: MaterialCategoryId,
    pub keywords: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Case-folded substring match over a catalog entry's name and keywords.
/// A blank query matches everything.
pub fn matches_query(name: &str, keywords: &str, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    name.to_lowercase().contains(&needle) || keywords.to_lowercase().contains(&needle)
}

impl CatalogWork {
    pub fn matches(&self, query: &str) -> bool {
        matches_query(&self.name, &self.keywords, query)
    }
}

impl CatalogMaterial {
    pub fn matches(&self, query: &str) -> bool {
        matches_query(&self.name, &self.keywords, query)
    }
}

#[cfg(test)]
mod tests {
    use super::matches_query;

    #[test]
    fn query_matching_folds_case_and_checks_keywords() {
        assert!(matches_query("Wall plastering", "", "PLASTER"));
        assert!(matches_query("Primer", "paint prep", "prep"));
        assert!(!matches_query("Primer", "paint prep", "tile"));
    }

    #[test]
    fn blank_query_matches_everything() {
        assert!(matches_query("anything", "", ""));
        assert!(matches_query("anything", "", "   "));
    }
}
