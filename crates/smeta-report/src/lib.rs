// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Export of a finished estimate: a paginated plain-text document for
//! printing and a CSV dump for spreadsheets. Both work from an
//! [`EstimateSnapshot`] so the estimate cannot change mid-render.

use anyhow::{Context, Result};
use smeta_app::{
    EstimateColumn, EstimateTree, FlatRow, GrandTotals, format_kopecks, format_quantity,
};
use std::io::Write;

const COLUMN_WIDTHS: [usize; 11] = [4, 26, 5, 8, 12, 12, 26, 5, 8, 12, 12];

/// A frozen copy of the estimate with totals precomputed. Capturing
/// re-derives row bookkeeping, so a snapshot is always internally
/// consistent even if the source tree was mid-edit.
#[derive(Debug, Clone)]
pub struct EstimateSnapshot {
    tree: EstimateTree,
    totals: GrandTotals,
}

impl EstimateSnapshot {
    pub fn capture(source: &EstimateTree) -> Self {
        let mut tree = source.clone();
        tree.recompute_rows();
        let totals = tree.grand_totals();
        Self { tree, totals }
    }

    pub fn tree(&self) -> &EstimateTree {
        &self.tree
    }

    pub fn totals(&self) -> &GrandTotals {
        &self.totals
    }
}

#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub title: String,
    pub rows_per_page: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: "Estimate".to_owned(),
            rows_per_page: 40,
        }
    }
}

/// Renders the estimate as paginated plain text. Every page repeats the
/// column headers; a work's own cells appear only on its first row, the
/// way the table merges them on screen.
pub fn render_document(snapshot: &EstimateSnapshot, options: &DocumentOptions) -> String {
    let rows_per_page = options.rows_per_page.max(1);
    let rows = snapshot.tree.flat_rows();
    let page_count = rows.len().div_ceil(rows_per_page).max(1);

    let mut out = String::new();
    for (page, chunk) in rows.chunks(rows_per_page).enumerate() {
        push_page(&mut out, options, chunk, page + 1, page_count);
    }
    if rows.is_empty() {
        push_page(&mut out, options, &[], 1, 1);
    }
    push_summary(&mut out, &snapshot.totals);
    out
}

/// Writes one CSV record per display row, headers first. Work cells are
/// blank on material rows, matching the merged layout of the document.
pub fn write_csv<W: Write>(snapshot: &EstimateSnapshot, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut headers = vec!["Section".to_owned()];
    headers.extend(EstimateColumn::ALL.iter().map(|c| c.title().to_owned()));
    csv_writer
        .write_record(&headers)
        .context("write csv headers")?;

    for flat in snapshot.tree.flat_rows() {
        let mut record = vec![flat.section.name.clone()];
        record.extend(EstimateColumn::ALL.iter().map(|&c| cell_text(&flat, c)));
        csv_writer
            .write_record(&record)
            .context("write csv record")?;
    }

    csv_writer.flush().context("flush csv output")?;
    Ok(())
}

fn push_page(
    out: &mut String,
    options: &DocumentOptions,
    rows: &[FlatRow<'_>],
    page: usize,
    page_count: usize,
) {
    if page > 1 {
        out.push('\n');
    }
    out.push_str(&format!("{} -- page {page} of {page_count}\n", options.title));

    let header: Vec<String> = EstimateColumn::ALL
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(column, width)| pad(column.title(), width, false))
        .collect();
    let header = header.join(" | ");
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(header.len()));
    out.push('\n');

    let mut last_section: Option<usize> = None;
    for flat in rows {
        if last_section != Some(flat.path.section) {
            out.push_str(&format!("[ {} ]\n", flat.section.name));
            last_section = Some(flat.path.section);
        }
        let cells: Vec<String> = EstimateColumn::ALL
            .iter()
            .zip(COLUMN_WIDTHS)
            .map(|(&column, width)| pad(&cell_text(flat, column), width, is_numeric(column)))
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
}

fn push_summary(out: &mut String, totals: &GrandTotals) {
    out.push('\n');
    out.push_str(&format!(
        "Labor total:     {}\n",
        format_kopecks(totals.labor_kopecks)
    ));
    out.push_str(&format!(
        "Materials total: {}\n",
        format_kopecks(totals.materials_kopecks)
    ));
    out.push_str(&format!(
        "Delivery 15%:    {}\n",
        format_kopecks(totals.surcharge_kopecks)
    ));
    out.push_str(&format!(
        "Grand total:     {}\n",
        format_kopecks(totals.overall_kopecks)
    ));
}

fn cell_text(flat: &FlatRow<'_>, column: EstimateColumn) -> String {
    let on_header = flat.material.is_none();
    match column {
        EstimateColumn::Number if on_header => flat.work.number.to_string(),
        EstimateColumn::WorkName if on_header => flat.work.name.clone(),
        EstimateColumn::WorkUnit if on_header => flat.work.unit.clone(),
        EstimateColumn::WorkQuantity if on_header => format_quantity(flat.work.quantity),
        EstimateColumn::LaborPrice if on_header => format_kopecks(flat.work.labor_cost_kopecks),
        EstimateColumn::WorkTotal if on_header => format_kopecks(flat.work.total_work_kopecks),
        EstimateColumn::MaterialName => material_text(flat, |m| m.name.clone()),
        EstimateColumn::MaterialUnit => material_text(flat, |m| m.unit.clone()),
        EstimateColumn::MaterialQuantity => material_text(flat, |m| format_quantity(m.quantity)),
        EstimateColumn::MaterialPrice => material_text(flat, |m| format_kopecks(m.price_kopecks)),
        EstimateColumn::MaterialTotal => material_text(flat, |m| format_kopecks(m.total_kopecks)),
        _ => String::new(),
    }
}

fn material_text(
    flat: &FlatRow<'_>,
    extract: impl Fn(&smeta_app::Material) -> String,
) -> String {
    flat.material.map(extract).unwrap_or_default()
}

fn is_numeric(column: EstimateColumn) -> bool {
    !matches!(
        column,
        EstimateColumn::WorkName | EstimateColumn::MaterialName | EstimateColumn::Number
    )
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    if right_align {
        format!("{text:>width$}")
    } else {
        format!("{text:<width$}")
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentOptions, EstimateSnapshot, render_document, write_csv};
    use anyhow::Result;
    use smeta_app::{EstimateTree, MaterialField, WorkField, format_kopecks};
    use smeta_testkit::EstimateFaker;

    fn small_tree() -> EstimateTree {
        let mut tree = EstimateTree::new();
        tree.rename_section(0, "Rough works");
        let work_row = tree.append_work(0).unwrap();
        tree.update_work(0, 0, WorkField::Name("Wall plastering".to_owned()));
        tree.update_work(0, 0, WorkField::Unit("m2".to_owned()));
        tree.update_work(0, 0, WorkField::Quantity(10.0));
        tree.update_work(0, 0, WorkField::LaborCost(45_000));
        tree.insert_material_after(work_row).unwrap();
        tree.update_material(0, 0, 0, MaterialField::Name("Gypsum plaster".to_owned()));
        tree.update_material(0, 0, 0, MaterialField::Unit("bag".to_owned()));
        tree.update_material(0, 0, 0, MaterialField::Quantity(4.0));
        tree.update_material(0, 0, 0, MaterialField::Price(42_000));
        tree
    }

    #[test]
    fn document_prints_work_cells_once_and_summarizes_totals() {
        let tree = small_tree();
        let snapshot = EstimateSnapshot::capture(&tree);
        let doc = render_document(&snapshot, &DocumentOptions::default());

        assert_eq!(doc.matches("Wall plastering").count(), 1);
        assert_eq!(doc.matches("Gypsum plaster").count(), 1);
        assert!(doc.contains("[ Rough works ]"));

        // labor 10 * 450.00, materials 4 * 420.00, delivery 15% of materials
        assert!(doc.contains(&format!("Labor total:     {}", format_kopecks(450_000))));
        assert!(doc.contains(&format!("Materials total: {}", format_kopecks(168_000))));
        assert!(doc.contains(&format!("Delivery 15%:    {}", format_kopecks(25_200))));
        assert!(doc.contains(&format!("Grand total:     {}", format_kopecks(643_200))));
    }

    #[test]
    fn document_paginates_and_repeats_headers() -> Result<()> {
        let tree = EstimateFaker::new(11).estimate(2, 3, 2)?;
        let snapshot = EstimateSnapshot::capture(&tree);
        let options = DocumentOptions {
            title: "Kitchen remodel".to_owned(),
            rows_per_page: 5,
        };
        let doc = render_document(&snapshot, &options);

        // 18 display rows at 5 per page
        assert!(doc.contains("Kitchen remodel -- page 1 of 4"));
        assert!(doc.contains("Kitchen remodel -- page 4 of 4"));
        assert_eq!(doc.matches("Labor price").count(), 4);
        Ok(())
    }

    #[test]
    fn empty_estimate_still_renders_one_page() {
        let snapshot = EstimateSnapshot::capture(&EstimateTree::new());
        let doc = render_document(&snapshot, &DocumentOptions::default());
        assert!(doc.contains("page 1 of 1"));
        assert!(doc.contains(&format!("Grand total:     {}", format_kopecks(0))));
    }

    #[test]
    fn csv_emits_one_record_per_display_row() -> Result<()> {
        let tree = EstimateFaker::new(3).estimate(2, 2, 3)?;
        let snapshot = EstimateSnapshot::capture(&tree);

        let mut buffer = Vec::new();
        write_csv(&snapshot, &mut buffer)?;

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        assert_eq!(reader.headers()?.len(), 12);
        let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), snapshot.tree().total_rows());
        Ok(())
    }

    #[test]
    fn csv_blanks_work_cells_on_material_rows() -> Result<()> {
        let tree = small_tree();
        let snapshot = EstimateSnapshot::capture(&tree);

        let mut buffer = Vec::new();
        write_csv(&snapshot, &mut buffer)?;

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 2);

        // header row carries the work, material cells empty
        assert_eq!(&records[0][2], "Wall plastering");
        assert_eq!(&records[0][7], "");
        // material row is the mirror image
        assert_eq!(&records[1][2], "");
        assert_eq!(&records[1][7], "Gypsum plaster");
        Ok(())
    }
}
