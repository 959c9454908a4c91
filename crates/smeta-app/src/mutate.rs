// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Mutation engine for the estimate tree. Every operation resolves its flat
//! row to a structural path exactly once, applies the edit, then repairs the
//! cached `row`/`height`/`number` bookkeeping incrementally so the flat
//! layout stays contiguous without a full rebuild.
//!
//! Row-addressed entry points return `Option`: `None` means the row resolved
//! to nothing (stale selection) and the tree was left untouched. Validation
//! failures are `anyhow` errors and also leave the tree untouched.

use anyhow::{Result, bail};

use crate::model::{Material, Section, Work};
use crate::rowmap::RowSlot;
use crate::tree::EstimateTree;

/// Editable scalar fields of a work's own line.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkField {
    Name(String),
    Unit(String),
    Quantity(f64),
    LaborCost(i64),
}

/// Editable scalar fields of a material line.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialField {
    Name(String),
    Unit(String),
    Quantity(f64),
    Price(i64),
}

impl EstimateTree {
    /// Appends a new empty section after all existing rows. Sections are
    /// only ever added at the tail.
    pub fn add_section(&mut self, name: impl Into<String>) -> usize {
        let row = self.total_rows();
        let sections = self.sections_mut();
        let mut section = Section::new(name);
        section.row = row;
        sections.push(section);
        sections.len() - 1
    }

    pub fn rename_section(&mut self, section: usize, name: impl Into<String>) -> Option<()> {
        self.sections_mut().get_mut(section)?.name = name.into();
        Some(())
    }

    /// Appends an empty work at the end of `section` and returns its header
    /// row. A new work has no materials and spans a single row.
    pub fn append_work(&mut self, section: usize) -> Option<usize> {
        let section_ref = self.section(section)?;
        let new_row = section_ref.row + section_ref.height;
        let number = section_ref.works.len() + 1;

        let mut work = Work::new();
        work.row = new_row;
        work.number = number;

        let insert_at = self.sections_mut()[section].works.len();
        self.sections_mut()[section].works.push(work);
        self.shift_following(section, insert_at + 1, 1);
        self.sections_mut()[section].height += 1;
        Some(new_row)
    }

    /// Inserts a new work directly after the full span of the work that owns
    /// `after_row`, returning the new header row. On an estimate with no
    /// rows yet the work is appended to the last section.
    pub fn insert_work_after(&mut self, after_row: usize) -> Option<usize> {
        if self.total_rows() == 0 {
            let last = self.sections().len() - 1;
            return self.append_work(last);
        }
        let path = self.resolve_row(after_row)?;
        let anchor = &self.sections()[path.section].works[path.work];
        let new_row = anchor.row + anchor.height;
        let insert_at = path.work + 1;

        let mut work = Work::new();
        work.row = new_row;
        work.number = insert_at + 1;
        self.sections_mut()[path.section].works.insert(insert_at, work);
        for (offset, later) in self.sections_mut()[path.section].works[insert_at + 1..]
            .iter_mut()
            .enumerate()
        {
            later.number = insert_at + 2 + offset;
        }
        self.shift_following(path.section, insert_at + 1, 1);
        self.sections_mut()[path.section].height += 1;
        Some(new_row)
    }

    /// Inserts an empty material on the row after `after_row` and returns
    /// its row. The header row inserts at material index 0, a material row
    /// inserts directly after that material.
    pub fn insert_material_after(&mut self, after_row: usize) -> Option<usize> {
        let path = self.resolve_row(after_row)?;
        let index = match path.slot {
            RowSlot::Header => 0,
            RowSlot::Material(i) => i + 1,
        };
        let new_row = after_row + 1;

        let work = &mut self.sections_mut()[path.section].works[path.work];
        let mut material = Material::default();
        material.row = new_row;
        work.materials.insert(index, material);
        for (offset, later) in work.materials[index + 1..].iter_mut().enumerate() {
            later.row = new_row + 1 + offset;
        }
        work.height += 1;

        self.shift_following(path.section, path.work + 1, 1);
        self.sections_mut()[path.section].height += 1;
        Some(new_row)
    }

    /// Removes the work owning `row` together with all of its materials and
    /// closes the gap. Returns the removed work.
    pub fn delete_work_at(&mut self, row: usize) -> Option<Work> {
        let path = self.resolve_row(row)?;
        let removed = self.sections_mut()[path.section].works.remove(path.work);
        for (offset, later) in self.sections_mut()[path.section].works[path.work..]
            .iter_mut()
            .enumerate()
        {
            later.number = path.work + 1 + offset;
        }
        self.shift_following(path.section, path.work, -(removed.height as isize));
        self.sections_mut()[path.section].height -= removed.height;
        Some(removed)
    }

    /// Removes the material on `row`. A work's last remaining material
    /// cannot be deleted; `Ok(None)` means `row` was not a material row.
    pub fn delete_material_at(&mut self, row: usize) -> Result<Option<Material>> {
        let Some(path) = self.resolve_row(row) else {
            return Ok(None);
        };
        let RowSlot::Material(index) = path.slot else {
            return Ok(None);
        };

        let work = &mut self.sections_mut()[path.section].works[path.work];
        if work.materials.len() == 1 {
            bail!(
                "a work must keep at least one material -- delete the whole work to remove it"
            );
        }
        let removed = work.materials.remove(index);
        let base = work.row + 1;
        for (offset, later) in work.materials[index..].iter_mut().enumerate() {
            later.row = base + index + offset;
        }
        work.height -= 1;
        work.recompute_materials_total();

        self.shift_following(path.section, path.work + 1, -1);
        self.sections_mut()[path.section].height -= 1;
        Ok(Some(removed))
    }

    /// Applies one scalar edit to a work line and refreshes its labor total.
    pub fn update_work(&mut self, section: usize, work: usize, field: WorkField) -> Option<()> {
        let work = self.sections_mut().get_mut(section)?.works.get_mut(work)?;
        match field {
            WorkField::Name(name) => work.name = name,
            WorkField::Unit(unit) => work.unit = unit,
            WorkField::Quantity(quantity) => work.quantity = quantity,
            WorkField::LaborCost(kopecks) => work.labor_cost_kopecks = kopecks,
        }
        work.recompute_labor_total();
        Some(())
    }

    /// Applies one scalar edit to a material line, refreshing its line total
    /// and the owning work's materials total.
    pub fn update_material(
        &mut self,
        section: usize,
        work: usize,
        index: usize,
        field: MaterialField,
    ) -> Option<()> {
        let work = self.sections_mut().get_mut(section)?.works.get_mut(work)?;
        let material = work.materials.get_mut(index)?;
        match field {
            MaterialField::Name(name) => material.name = name,
            MaterialField::Unit(unit) => material.unit = unit,
            MaterialField::Quantity(quantity) => material.quantity = quantity,
            MaterialField::Price(kopecks) => material.price_kopecks = kopecks,
        }
        material.recompute_total();
        work.recompute_materials_total();
        Some(())
    }

    /// Shifts the cached rows of every node laid out after the mutation
    /// point: works `work_from..` in `section`, then all later sections.
    fn shift_following(&mut self, section: usize, work_from: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        let sections = self.sections_mut();
        for work in sections[section].works[work_from..].iter_mut() {
            shift_work_rows(work, delta);
        }
        for later in sections[section + 1..].iter_mut() {
            later.row = shifted(later.row, delta);
            for work in &mut later.works {
                shift_work_rows(work, delta);
            }
        }
    }
}

fn shift_work_rows(work: &mut Work, delta: isize) {
    work.row = shifted(work.row, delta);
    for material in &mut work.materials {
        material.row = shifted(material.row, delta);
    }
}

fn shifted(row: usize, delta: isize) -> usize {
    (row as isize + delta) as usize
}
