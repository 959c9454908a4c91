// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The estimate tree: sections of works of materials, flattened into one
//! contiguous run of display rows. Every node caches `row` (and works also
//! `height`/`number`) so lookups stay O(depth); `recompute_rows` re-derives
//! all of that from structure alone and is the authoritative fallback.

use serde::{Deserialize, Serialize};

use crate::model::{GrandTotals, Material, Section, Work};
use crate::rowmap::RowPath;

/// Name given to the section every fresh estimate starts with.
pub const DEFAULT_SECTION_NAME: &str = "General works";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateTree {
    sections: Vec<Section>,
}

/// One display row with its resolved context, in display order.
#[derive(Debug, Clone, Copy)]
pub struct FlatRow<'a> {
    pub row: usize,
    pub path: RowPath,
    pub section: &'a Section,
    pub work: &'a Work,
    pub material: Option<&'a Material>,
}

impl EstimateTree {
    /// A fresh estimate: exactly one empty section at row 0, height 0.
    pub fn new() -> Self {
        Self {
            sections: vec![Section::new(DEFAULT_SECTION_NAME)],
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub(crate) fn sections_mut(&mut self) -> &mut Vec<Section> {
        &mut self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn work(&self, section: usize, work: usize) -> Option<&Work> {
        self.sections.get(section)?.works.get(work)
    }

    pub fn material(&self, section: usize, work: usize, index: usize) -> Option<&Material> {
        self.work(section, work)?.materials.get(index)
    }

    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(|section| section.height).sum()
    }

    /// Index of the section whose row span contains `row`. Empty sections
    /// have no span and never match.
    pub fn find_section_by_row(&self, row: usize) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| row >= section.row && row < section.row + section.height)
    }

    /// Index within `section` of the work whose span contains `row`.
    pub fn find_work_by_row(&self, section: usize, row: usize) -> Option<usize> {
        self.sections
            .get(section)?
            .works
            .iter()
            .position(|work| row >= work.row && row < work.row + work.height)
    }

    /// Combined labor + materials total for one work.
    pub fn total_for_work(&self, section: usize, work: usize) -> Option<i64> {
        Some(self.work(section, work)?.total_kopecks())
    }

    /// Estimate-wide totals, derived on demand from the per-work caches.
    pub fn grand_totals(&self) -> GrandTotals {
        let mut labor = 0i64;
        let mut materials = 0i64;
        for section in &self.sections {
            for work in &section.works {
                labor += work.total_work_kopecks;
                materials += work.total_materials_kopecks;
            }
        }
        GrandTotals::from_parts(labor, materials)
    }

    /// Vertical merge height for the presentation layer: the owning work's
    /// height on its header row, 1 everywhere else (including unknown rows).
    pub fn row_span_for(&self, row: usize) -> usize {
        match self.resolve_row(row) {
            Some(path) if path.is_header() => self.sections[path.section].works[path.work].height,
            _ => 1,
        }
    }

    /// Every display row in order, with its resolved context.
    pub fn flat_rows(&self) -> Vec<FlatRow<'_>> {
        let mut rows = Vec::with_capacity(self.total_rows());
        for (s, section) in self.sections.iter().enumerate() {
            for (w, work) in section.works.iter().enumerate() {
                rows.push(FlatRow {
                    row: work.row,
                    path: RowPath::header(s, w),
                    section,
                    work,
                    material: None,
                });
                for (m, material) in work.materials.iter().enumerate() {
                    rows.push(FlatRow {
                        row: material.row,
                        path: RowPath::material(s, w, m),
                        section,
                        work,
                        material: Some(material),
                    });
                }
            }
        }
        rows
    }

    /// Re-derives every cached `row`, `height` and `number` from structure
    /// alone. The mutation engine maintains these incrementally; this is the
    /// from-scratch fallback and the oracle the tests compare against.
    pub fn recompute_rows(&mut self) {
        let mut row = 0usize;
        for section in &mut self.sections {
            section.row = row;
            let section_start = row;
            for (index, work) in section.works.iter_mut().enumerate() {
                work.number = index + 1;
                work.row = row;
                work.height = 1 + work.materials.len();
                for (m, material) in work.materials.iter_mut().enumerate() {
                    material.row = work.row + 1 + m;
                }
                row += work.height;
            }
            section.height = row - section_start;
        }
    }
}

impl Default for EstimateTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SECTION_NAME, EstimateTree};
    use crate::model::{Material, Work};

    fn populated_tree() -> EstimateTree {
        // section 0: work (2 materials), work (no materials)
        // section 1: work (1 material)
        let mut tree = EstimateTree::new();

        let mut first = Work::new();
        first.quantity = 2.0;
        first.labor_cost_kopecks = 10_000;
        first.recompute_labor_total();
        first.materials.push(Material {
            quantity: 1.0,
            price_kopecks: 5_000,
            total_kopecks: 5_000,
            ..Material::default()
        });
        first.materials.push(Material {
            quantity: 3.0,
            price_kopecks: 1_000,
            total_kopecks: 3_000,
            ..Material::default()
        });
        first.recompute_materials_total();

        let mut second = Work::new();
        second.quantity = 1.0;
        second.labor_cost_kopecks = 4_000;
        second.recompute_labor_total();

        let mut third = Work::new();
        third.quantity = 1.0;
        third.labor_cost_kopecks = 2_000;
        third.recompute_labor_total();
        third.materials.push(Material {
            quantity: 2.0,
            price_kopecks: 1_500,
            total_kopecks: 3_000,
            ..Material::default()
        });
        third.recompute_materials_total();

        tree.sections_mut()[0].works.push(first);
        tree.sections_mut()[0].works.push(second);
        tree.sections_mut()
            .push(crate::model::Section::new("Finishing"));
        tree.sections_mut()[1].works.push(third);
        tree.recompute_rows();
        tree
    }

    #[test]
    fn fresh_tree_has_one_empty_section() {
        let tree = EstimateTree::new();
        assert_eq!(tree.sections().len(), 1);
        assert_eq!(tree.sections()[0].name, DEFAULT_SECTION_NAME);
        assert_eq!(tree.sections()[0].row, 0);
        assert_eq!(tree.sections()[0].height, 0);
        assert_eq!(tree.total_rows(), 0);
    }

    #[test]
    fn recompute_rows_lays_out_contiguous_spans() {
        let tree = populated_tree();

        // section 0: rows 0..=3 (work of height 3, work of height 1)
        let first = &tree.sections()[0];
        assert_eq!((first.row, first.height), (0, 4));
        assert_eq!(first.works[0].row, 0);
        assert_eq!(first.works[0].height, 3);
        assert_eq!(first.works[0].number, 1);
        assert_eq!(first.works[0].materials[0].row, 1);
        assert_eq!(first.works[0].materials[1].row, 2);
        assert_eq!(first.works[1].row, 3);
        assert_eq!(first.works[1].number, 2);

        // section 1: rows 4..=5
        let second = &tree.sections()[1];
        assert_eq!((second.row, second.height), (4, 2));
        assert_eq!(second.works[0].row, 4);
        assert_eq!(second.works[0].number, 1);
        assert_eq!(tree.total_rows(), 6);
    }

    #[test]
    fn recompute_rows_repairs_scrambled_caches() {
        let mut tree = populated_tree();
        let expected = tree.clone();

        for section in tree.sections_mut() {
            section.row = 99;
            section.height = 99;
            for work in &mut section.works {
                work.row = 99;
                work.height = 99;
                work.number = 99;
                for material in &mut work.materials {
                    material.row = 99;
                }
            }
        }
        tree.recompute_rows();

        assert_eq!(tree, expected);
    }

    #[test]
    fn section_and_work_lookup_respect_span_boundaries() {
        let tree = populated_tree();

        assert_eq!(tree.find_section_by_row(0), Some(0));
        assert_eq!(tree.find_section_by_row(3), Some(0));
        assert_eq!(tree.find_section_by_row(4), Some(1));
        assert_eq!(tree.find_section_by_row(5), Some(1));
        assert_eq!(tree.find_section_by_row(6), None);

        assert_eq!(tree.find_work_by_row(0, 2), Some(0));
        assert_eq!(tree.find_work_by_row(0, 3), Some(1));
        assert_eq!(tree.find_work_by_row(0, 4), None);
        assert_eq!(tree.find_work_by_row(1, 4), Some(0));
    }

    #[test]
    fn empty_section_is_never_matched_by_row_lookup() {
        let mut tree = populated_tree();
        tree.sections_mut()
            .push(crate::model::Section::new("Reserve"));
        tree.recompute_rows();

        assert_eq!(tree.sections()[2].height, 0);
        assert_eq!(tree.find_section_by_row(6), None);
    }

    #[test]
    fn grand_totals_apply_surcharge_on_materials_only() {
        let tree = populated_tree();
        let totals = tree.grand_totals();

        // labor: 20000 + 4000 + 2000; materials: 8000 + 3000
        assert_eq!(totals.labor_kopecks, 26_000);
        assert_eq!(totals.materials_kopecks, 11_000);
        assert_eq!(totals.surcharge_kopecks, 1_650);
        assert_eq!(totals.overall_kopecks, 38_650);
    }

    #[test]
    fn row_span_is_work_height_on_header_rows_only() {
        let tree = populated_tree();

        assert_eq!(tree.row_span_for(0), 3);
        assert_eq!(tree.row_span_for(1), 1);
        assert_eq!(tree.row_span_for(2), 1);
        assert_eq!(tree.row_span_for(3), 1);
        assert_eq!(tree.row_span_for(4), 2);
        assert_eq!(tree.row_span_for(42), 1);
    }

    #[test]
    fn flat_rows_walk_every_row_in_display_order() {
        let tree = populated_tree();
        let rows = tree.flat_rows();

        assert_eq!(rows.len(), tree.total_rows());
        for (expected, flat) in rows.iter().enumerate() {
            assert_eq!(flat.row, expected);
            assert_eq!(flat.material.is_none(), flat.path.is_header());
        }
    }

    #[test]
    fn total_for_work_combines_labor_and_materials() {
        let tree = populated_tree();
        assert_eq!(tree.total_for_work(0, 0), Some(28_000));
        assert_eq!(tree.total_for_work(0, 1), Some(4_000));
        assert_eq!(tree.total_for_work(1, 0), Some(5_000));
        assert_eq!(tree.total_for_work(2, 0), None);
    }
}
