// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Translation between flat display rows and structural positions in the
//! estimate tree. The display is one flat table, so user actions arrive as
//! row numbers; everything past this boundary works on `RowPath` so the
//! mutation engine never re-interprets row arithmetic mid-operation.

use crate::tree::EstimateTree;

/// What a flat row points at inside a work's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSlot {
    /// The work's own header row; no material index applies.
    Header,
    /// The row of the material at this index within the work.
    Material(usize),
}

/// Structural address of a flat row: section index, work index within the
/// section, and the slot within the work's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPath {
    pub section: usize,
    pub work: usize,
    pub slot: RowSlot,
}

impl RowPath {
    pub const fn header(section: usize, work: usize) -> Self {
        Self {
            section,
            work,
            slot: RowSlot::Header,
        }
    }

    pub const fn material(section: usize, work: usize, index: usize) -> Self {
        Self {
            section,
            work,
            slot: RowSlot::Material(index),
        }
    }

    pub const fn is_header(&self) -> bool {
        matches!(self.slot, RowSlot::Header)
    }
}

impl EstimateTree {
    /// Resolves a flat row to its structural path. Out-of-range rows give
    /// `None`; callers treat that as a stale selection, not an error.
    pub fn resolve_row(&self, row: usize) -> Option<RowPath> {
        let section = self.find_section_by_row(row)?;
        let work = self.find_work_by_row(section, row)?;
        let work_ref = &self.sections()[section].works[work];

        if row == work_ref.row {
            return Some(RowPath::header(section, work));
        }

        let index = row - work_ref.row - 1;
        (index < work_ref.materials.len()).then(|| RowPath::material(section, work, index))
    }

    /// Flat row currently occupied by a structural path, if it exists.
    pub fn row_of(&self, path: RowPath) -> Option<usize> {
        let work = self.work(path.section, path.work)?;
        match path.slot {
            RowSlot::Header => Some(work.row),
            RowSlot::Material(index) => work.material_row(index),
        }
    }
}
