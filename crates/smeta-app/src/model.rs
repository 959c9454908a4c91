// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

/// Delivery/handling surcharge applied on top of the materials total.
pub const DELIVERY_SURCHARGE_PERCENT: i64 = 15;

/// One material line owned by a work. `row` is the flat display row the
/// line currently occupies; it is maintained by the mutation engine and
/// re-derivable via `EstimateTree::recompute_rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Material {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub price_kopecks: i64,
    pub total_kopecks: i64,
    pub row: usize,
}

impl Material {
    pub fn line_total(quantity: f64, unit_kopecks: i64) -> i64 {
        (quantity * unit_kopecks as f64).round() as i64
    }

    pub fn recompute_total(&mut self) {
        self.total_kopecks = Self::line_total(self.quantity, self.price_kopecks);
    }
}

/// A work line plus its owned materials. A work spans `height` contiguous
/// flat rows: its own header row at `row`, then one row per material, so
/// `height == 1 + materials.len()`. `number` is the 1-based rank of the
/// work within its owning section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub labor_cost_kopecks: i64,
    pub total_work_kopecks: i64,
    pub materials: Vec<Material>,
    pub total_materials_kopecks: i64,
    pub row: usize,
    pub number: usize,
    pub height: usize,
}

impl Work {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            unit: String::new(),
            quantity: 0.0,
            labor_cost_kopecks: 0,
            total_work_kopecks: 0,
            materials: Vec::new(),
            total_materials_kopecks: 0,
            row: 0,
            number: 0,
            height: 1,
        }
    }

    pub fn recompute_labor_total(&mut self) {
        self.total_work_kopecks = Material::line_total(self.quantity, self.labor_cost_kopecks);
    }

    pub fn recompute_materials_total(&mut self) {
        self.total_materials_kopecks = self
            .materials
            .iter()
            .map(|material| material.total_kopecks)
            .sum();
    }

    /// Grand total for the work's row span: labor plus materials.
    pub fn total_kopecks(&self) -> i64 {
        self.total_work_kopecks + self.total_materials_kopecks
    }

    /// Flat row of the material at `index`, if it exists.
    pub fn material_row(&self, index: usize) -> Option<usize> {
        (index < self.materials.len()).then(|| self.row + 1 + index)
    }
}

impl Default for Work {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level container. The section header does not occupy a flat row of
/// its own: `row` is the flat row of the section's first work and
/// `height` is the sum of its works' heights (0 for an empty section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Section {
    pub name: String,
    pub works: Vec<Work>,
    pub row: usize,
    pub height: usize,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            works: Vec::new(),
            row: 0,
            height: 0,
        }
    }

    pub fn total_kopecks(&self) -> i64 {
        self.works.iter().map(Work::total_kopecks).sum()
    }
}

/// Estimate-wide aggregates, derived on demand from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GrandTotals {
    pub labor_kopecks: i64,
    pub materials_kopecks: i64,
    pub surcharge_kopecks: i64,
    pub overall_kopecks: i64,
}

impl GrandTotals {
    pub fn from_parts(labor_kopecks: i64, materials_kopecks: i64) -> Self {
        let surcharge_kopecks = materials_kopecks * DELIVERY_SURCHARGE_PERCENT / 100;
        Self {
            labor_kopecks,
            materials_kopecks,
            surcharge_kopecks,
            overall_kopecks: labor_kopecks + materials_kopecks + surcharge_kopecks,
        }
    }
}
