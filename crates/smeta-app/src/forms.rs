// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::ids::{MaterialCategoryId, WorkCategoryId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogWorkInput {
    pub name: String,
    pub unit: String,
    pub price_kopecks: i64,
    pub category_id: WorkCategoryId,
    pub keywords: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMaterialInput {
    pub name: String,
    pub unit: String,
    pub price_kopecks: i64,
    pub category_id: MaterialCategoryId,
    pub keywords: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
}

impl CatalogWorkInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("catalog work name is required -- enter a name and retry");
        }
        if self.unit.trim().is_empty() {
            bail!("catalog work unit is required -- enter a unit and retry");
        }
        if self.price_kopecks < 0 {
            bail!("catalog work price cannot be negative");
        }
        if self.category_id.get() <= 0 {
            bail!("catalog work category is required -- choose a category and retry");
        }
        Ok(())
    }
}

impl CatalogMaterialInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("catalog material name is required -- enter a name and retry");
        }
        if self.unit.trim().is_empty() {
            bail!("catalog material unit is required -- enter a unit and retry");
        }
        if self.price_kopecks < 0 {
            bail!("catalog material price cannot be negative");
        }
        if self.category_id.get() <= 0 {
            bail!("catalog material category is required -- choose a category and retry");
        }
        Ok(())
    }
}

impl CategoryInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("category name is required -- enter a name and retry");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogWorkInput, CategoryInput};
    use crate::ids::WorkCategoryId;

    #[test]
    fn work_validation_rejects_empty_name_and_missing_category() {
        let mut input = CatalogWorkInput {
            name: "Plastering".to_owned(),
            unit: "m2".to_owned(),
            price_kopecks: 45_000,
            category_id: WorkCategoryId::new(1),
            keywords: String::new(),
        };
        assert!(input.validate().is_ok());

        input.name = "  ".to_owned();
        assert!(input.validate().is_err());

        input.name = "Plastering".to_owned();
        input.category_id = WorkCategoryId::new(0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut input = CatalogWorkInput {
            name: "Plastering".to_owned(),
            unit: "m2".to_owned(),
            price_kopecks: -1,
            category_id: WorkCategoryId::new(1),
            keywords: String::new(),
        };
        assert!(input.validate().is_err());
        input.price_kopecks = 0;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn blank_category_name_fails_validation() {
        let input = CategoryInput {
            name: "  ".to_owned(),
        };
        assert!(input.validate().is_err());
    }
}
