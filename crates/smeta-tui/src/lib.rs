// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use smeta_app::{
    AppCommand, AppMode, AppState, CatalogMaterial, CatalogWork, ConfirmKind, EstimateColumn,
    EstimateTree, FlatRow, GrandTotals, MaterialField, PickerKind, RowPath, RowSlot, WorkField,
    format_kopecks, format_quantity, parse_kopecks, parse_quantity,
};
use smeta_report::{DocumentOptions, EstimateSnapshot, render_document, write_csv};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const EXPORT_DOCUMENT_FILE: &str = "estimate.txt";
const EXPORT_CSV_FILE: &str = "estimate.csv";

#[derive(Debug, Clone)]
pub struct UiOptions {
    pub document_title: String,
    pub rows_per_page: usize,
    pub export_dir: PathBuf,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            document_title: "Estimate".to_owned(),
            rows_per_page: 40,
            export_dir: PathBuf::from("."),
        }
    }
}

/// One selectable line in the catalog picker, the same shape for works
/// and materials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub name: String,
    pub unit: String,
    pub price_kopecks: i64,
}

/// Seam between the UI and the catalog store. The default search spawn
/// runs on the calling thread; a runtime backed by its own worker can
/// override it to answer asynchronously. Results are tagged with the
/// request id so answers to an outdated query are dropped.
pub trait CatalogRuntime {
    fn search_works(&mut self, query: &str) -> Result<Vec<CatalogWork>>;
    fn search_materials(&mut self, query: &str) -> Result<Vec<CatalogMaterial>>;

    fn run_catalog_search(&mut self, kind: PickerKind, query: &str) -> Result<Vec<PickerEntry>> {
        let entries = match kind {
            PickerKind::Work => self
                .search_works(query)?
                .into_iter()
                .map(|work| PickerEntry {
                    name: work.name,
                    unit: work.unit,
                    price_kopecks: work.price_kopecks,
                })
                .collect(),
            PickerKind::Material => self
                .search_materials(query)?
                .into_iter()
                .map(|material| PickerEntry {
                    name: material.name,
                    unit: material.unit,
                    price_kopecks: material.price_kopecks,
                })
                .collect(),
        };
        Ok(entries)
    }

    fn spawn_catalog_search(
        &mut self,
        request_id: u64,
        kind: PickerKind,
        query: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.run_catalog_search(kind, query) {
            Ok(entries) => InternalEvent::CatalogResults {
                request_id,
                entries,
            },
            Err(error) => InternalEvent::CatalogFailed {
                request_id,
                error: error.to_string(),
            },
        };
        tx.send(event)
            .map_err(|_| anyhow!("catalog event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    CatalogResults {
        request_id: u64,
        entries: Vec<PickerEntry>,
    },
    CatalogFailed {
        request_id: u64,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PickerUiState {
    kind: PickerKind,
    query: String,
    entries: Vec<PickerEntry>,
    cursor: usize,
    in_flight: Option<u64>,
    next_request_id: u64,
}

impl PickerUiState {
    fn new(kind: PickerKind) -> Self {
        Self {
            kind,
            query: String::new(),
            entries: Vec::new(),
            cursor: 0,
            in_flight: None,
            next_request_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    cursor_row: usize,
    edit_buffer: String,
    picker: Option<PickerUiState>,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: CatalogRuntime>(
    state: &mut AppState,
    tree: &mut EstimateTree,
    runtime: &mut R,
    options: &UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, tree, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(
                        state,
                        tree,
                        runtime,
                        &mut view_data,
                        &internal_tx,
                        options,
                        key,
                    ) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, view_data, event);
    }
}

fn handle_internal_event(state: &mut AppState, view_data: &mut ViewData, event: InternalEvent) {
    match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            state.dispatch(AppCommand::ClearStatus);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::CatalogResults {
            request_id,
            entries,
        } => {
            let Some(picker) = view_data.picker.as_mut() else {
                return;
            };
            if picker.in_flight != Some(request_id) {
                return;
            }
            picker.entries = entries;
            picker.cursor = picker.cursor.min(picker.entries.len().saturating_sub(1));
            picker.in_flight = None;
        }
        InternalEvent::CatalogFailed { request_id, error } => {
            let Some(picker) = view_data.picker.as_mut() else {
                return;
            };
            if picker.in_flight != Some(request_id) {
                return;
            }
            picker.in_flight = None;
            state.dispatch(AppCommand::SetStatus(format!(
                "catalog search failed: {error}"
            )));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: CatalogRuntime>(
    state: &mut AppState,
    tree: &mut EstimateTree,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    options: &UiOptions,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Nav => handle_nav_key(state, tree, runtime, view_data, internal_tx, options, key),
        AppMode::Edit => {
            handle_edit_key(state, tree, view_data, internal_tx, key);
            false
        }
        AppMode::Picker(kind) => {
            handle_picker_key(state, tree, runtime, view_data, internal_tx, kind, key);
            false
        }
        AppMode::Confirm(kind) => {
            handle_confirm_key(state, tree, view_data, internal_tx, kind, key);
            false
        }
    }
}

fn handle_nav_key<R: CatalogRuntime>(
    state: &mut AppState,
    tree: &mut EstimateTree,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    options: &UiOptions,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Up | KeyCode::Char('k'), _) => move_cursor(tree, view_data, -1),
        (KeyCode::Down | KeyCode::Char('j'), _) => move_cursor(tree, view_data, 1),
        (KeyCode::Left | KeyCode::Char('h'), _) => {
            state.dispatch(AppCommand::PrevColumn);
        }
        (KeyCode::Right | KeyCode::Char('l'), _) => {
            state.dispatch(AppCommand::NextColumn);
        }
        (KeyCode::Enter, _) => begin_edit(state, tree, view_data, internal_tx),
        (KeyCode::Char('w'), KeyModifiers::NONE) => {
            match tree.insert_work_after(view_data.cursor_row) {
                Some(row) => {
                    view_data.cursor_row = row;
                    emit_status(state, view_data, internal_tx, "work added");
                }
                None => emit_status(state, view_data, internal_tx, "no section to add to"),
            }
        }
        (KeyCode::Char('m'), KeyModifiers::NONE) => {
            match tree.insert_material_after(view_data.cursor_row) {
                Some(row) => {
                    view_data.cursor_row = row;
                    emit_status(state, view_data, internal_tx, "material added");
                }
                None => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "add a work first -- press w",
                ),
            }
        }
        (KeyCode::Char('S'), _) => {
            tree.add_section("New section");
            emit_status(state, view_data, internal_tx, "section added");
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            request_delete(state, tree, view_data, internal_tx);
        }
        (KeyCode::Char('p'), KeyModifiers::NONE) => {
            open_picker(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) => match export_estimate(tree, options) {
            Ok((document_path, _)) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("exported to {}", document_path.display()),
            ),
            Err(error) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("export failed: {error}"),
            ),
        },
        (KeyCode::Char('?'), _) => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn move_cursor(tree: &EstimateTree, view_data: &mut ViewData, delta: isize) {
    let rows = tree.total_rows();
    if rows == 0 {
        view_data.cursor_row = 0;
        return;
    }
    let next = view_data.cursor_row as isize + delta;
    view_data.cursor_row = next.clamp(0, rows as isize - 1) as usize;
}

fn clamp_cursor(tree: &EstimateTree, view_data: &mut ViewData) {
    let rows = tree.total_rows();
    if rows == 0 {
        view_data.cursor_row = 0;
    } else {
        view_data.cursor_row = view_data.cursor_row.min(rows - 1);
    }
}

fn begin_edit(
    state: &mut AppState,
    tree: &EstimateTree,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !state.column.is_editable() {
        emit_status(state, view_data, internal_tx, "column is read only");
        return;
    }
    match current_cell_value(tree, state.column, view_data.cursor_row) {
        Some(value) => {
            view_data.edit_buffer = value;
            state.dispatch(AppCommand::EnterEditMode);
        }
        None => emit_status(state, view_data, internal_tx, "nothing to edit on this row"),
    }
}

/// The raw editable value under the cursor. Work columns resolve through
/// any row of the work's span; material columns need a material row.
fn current_cell_value(tree: &EstimateTree, column: EstimateColumn, row: usize) -> Option<String> {
    let path = tree.resolve_row(row)?;
    let work = &tree.sections()[path.section].works[path.work];
    if column.is_work_column() {
        return match column {
            EstimateColumn::WorkName => Some(work.name.clone()),
            EstimateColumn::WorkUnit => Some(work.unit.clone()),
            EstimateColumn::WorkQuantity => Some(format_quantity(work.quantity)),
            EstimateColumn::LaborPrice => Some(format_kopecks(work.labor_cost_kopecks)),
            _ => None,
        };
    }
    let RowSlot::Material(index) = path.slot else {
        return None;
    };
    let material = &work.materials[index];
    match column {
        EstimateColumn::MaterialName => Some(material.name.clone()),
        EstimateColumn::MaterialUnit => Some(material.unit.clone()),
        EstimateColumn::MaterialQuantity => Some(format_quantity(material.quantity)),
        EstimateColumn::MaterialPrice => Some(format_kopecks(material.price_kopecks)),
        _ => None,
    }
}

fn handle_edit_key(
    state: &mut AppState,
    tree: &mut EstimateTree,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.edit_buffer.clear();
            state.dispatch(AppCommand::ExitToNav);
        }
        (KeyCode::Enter, _) => {
            let input = view_data.edit_buffer.trim().to_owned();
            match apply_edit(tree, state.column, view_data.cursor_row, &input) {
                Ok(()) => {
                    view_data.edit_buffer.clear();
                    state.dispatch(AppCommand::ExitToNav);
                    emit_status(state, view_data, internal_tx, "saved");
                }
                Err(error) => emit_status(state, view_data, internal_tx, error.to_string()),
            }
        }
        (KeyCode::Backspace, _) => {
            view_data.edit_buffer.pop();
        }
        (KeyCode::Char('u'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.edit_buffer.clear();
        }
        (KeyCode::Char(ch), modifiers)
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
        {
            view_data.edit_buffer.push(ch);
        }
        _ => {}
    }
}

fn apply_edit(
    tree: &mut EstimateTree,
    column: EstimateColumn,
    row: usize,
    input: &str,
) -> Result<()> {
    let path = tree
        .resolve_row(row)
        .ok_or_else(|| anyhow!("no estimate row selected"))?;

    if column.is_work_column() {
        let field = match column {
            EstimateColumn::WorkName => WorkField::Name(input.to_owned()),
            EstimateColumn::WorkUnit => WorkField::Unit(input.to_owned()),
            EstimateColumn::WorkQuantity => WorkField::Quantity(parse_quantity(input)?),
            EstimateColumn::LaborPrice => WorkField::LaborCost(parse_kopecks(input)?),
            _ => bail!("column is read only"),
        };
        tree.update_work(path.section, path.work, field)
            .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?;
        return Ok(());
    }

    let RowSlot::Material(index) = path.slot else {
        bail!("no material on this row -- press m to add one");
    };
    let field = match column {
        EstimateColumn::MaterialName => MaterialField::Name(input.to_owned()),
        EstimateColumn::MaterialUnit => MaterialField::Unit(input.to_owned()),
        EstimateColumn::MaterialQuantity => MaterialField::Quantity(parse_quantity(input)?),
        EstimateColumn::MaterialPrice => MaterialField::Price(parse_kopecks(input)?),
        _ => bail!("column is read only"),
    };
    tree.update_material(path.section, path.work, index, field)
        .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?;
    Ok(())
}

fn request_delete(
    state: &mut AppState,
    tree: &EstimateTree,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match tree.resolve_row(view_data.cursor_row) {
        Some(path) if path.is_header() => {
            state.dispatch(AppCommand::OpenConfirm(ConfirmKind::DeleteWork));
        }
        Some(_) => {
            state.dispatch(AppCommand::OpenConfirm(ConfirmKind::DeleteMaterial));
        }
        None => emit_status(state, view_data, internal_tx, "nothing to delete"),
    }
}

fn handle_confirm_key(
    state: &mut AppState,
    tree: &mut EstimateTree,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: ConfirmKind,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
            let message = match kind {
                ConfirmKind::DeleteWork => match tree.delete_work_at(view_data.cursor_row) {
                    Some(_) => "work deleted".to_owned(),
                    None => "no work on this row".to_owned(),
                },
                ConfirmKind::DeleteMaterial => {
                    match tree.delete_material_at(view_data.cursor_row) {
                        Ok(Some(_)) => "material deleted".to_owned(),
                        Ok(None) => "no material on this row".to_owned(),
                        Err(error) => error.to_string(),
                    }
                }
            };
            clamp_cursor(tree, view_data);
            emit_status(state, view_data, internal_tx, message);
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "delete canceled");
        }
        _ => {}
    }
}

fn open_picker<R: CatalogRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let kind = if state.column.is_work_column() {
        PickerKind::Work
    } else {
        PickerKind::Material
    };
    state.dispatch(AppCommand::OpenPicker(kind));

    let mut picker = PickerUiState::new(kind);
    let search_error = spawn_picker_search(runtime, &mut picker, internal_tx).err();
    view_data.picker = Some(picker);
    if let Some(error) = search_error {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("catalog search failed: {error}"),
        );
    }
}

fn spawn_picker_search<R: CatalogRuntime>(
    runtime: &mut R,
    picker: &mut PickerUiState,
    internal_tx: &Sender<InternalEvent>,
) -> Result<()> {
    picker.next_request_id = picker.next_request_id.saturating_add(1);
    if picker.next_request_id == 0 {
        picker.next_request_id = 1;
    }
    let request_id = picker.next_request_id;
    picker.in_flight = Some(request_id);
    runtime.spawn_catalog_search(request_id, picker.kind, &picker.query, internal_tx.clone())
}

fn handle_picker_key<R: CatalogRuntime>(
    state: &mut AppState,
    tree: &mut EstimateTree,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: PickerKind,
    key: KeyEvent,
) {
    let Some(mut picker) = view_data.picker.take() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };

    let mut close = false;
    let mut status = None::<String>;
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            close = true;
            status = Some("picker closed".to_owned());
        }
        (KeyCode::Up, _) => picker.cursor = picker.cursor.saturating_sub(1),
        (KeyCode::Char('p'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            picker.cursor = picker.cursor.saturating_sub(1);
        }
        (KeyCode::Down, _) => {
            picker.cursor = (picker.cursor + 1).min(picker.entries.len().saturating_sub(1));
        }
        (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            picker.cursor = (picker.cursor + 1).min(picker.entries.len().saturating_sub(1));
        }
        (KeyCode::Backspace, _) => {
            picker.query.pop();
            if let Err(error) = spawn_picker_search(runtime, &mut picker, internal_tx) {
                status = Some(format!("catalog search failed: {error}"));
            }
        }
        (KeyCode::Char('u'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            picker.query.clear();
            if let Err(error) = spawn_picker_search(runtime, &mut picker, internal_tx) {
                status = Some(format!("catalog search failed: {error}"));
            }
        }
        (KeyCode::Char(ch), modifiers)
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
        {
            picker.query.push(ch);
            if let Err(error) = spawn_picker_search(runtime, &mut picker, internal_tx) {
                status = Some(format!("catalog search failed: {error}"));
            }
        }
        (KeyCode::Enter, _) => {
            if let Some(entry) = picker.entries.get(picker.cursor).cloned() {
                match apply_picker_entry(tree, kind, view_data.cursor_row, &entry) {
                    Ok(row) => {
                        view_data.cursor_row = row;
                        close = true;
                        status = Some(format!("applied {}", entry.name));
                    }
                    Err(error) => status = Some(error.to_string()),
                }
            } else {
                status = Some("no matches".to_owned());
            }
        }
        _ => {}
    }

    if close {
        state.dispatch(AppCommand::ExitToNav);
        view_data.picker = None;
    } else {
        view_data.picker = Some(picker);
    }
    if let Some(message) = status {
        emit_status(state, view_data, internal_tx, message);
    }
}

/// Applies a catalog entry at the cursor. A work entry fills the owning
/// work's name, unit, and labor price; a material entry fills the material
/// under the cursor, inserting a fresh one when the cursor sits on a work
/// header. Returns the row the change landed on.
fn apply_picker_entry(
    tree: &mut EstimateTree,
    kind: PickerKind,
    cursor_row: usize,
    entry: &PickerEntry,
) -> Result<usize> {
    match kind {
        PickerKind::Work => {
            let path = match tree.resolve_row(cursor_row) {
                Some(path) => path,
                None => {
                    let row = tree
                        .insert_work_after(cursor_row)
                        .ok_or_else(|| anyhow!("no section to add to"))?;
                    tree.resolve_row(row)
                        .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?
                }
            };
            tree.update_work(path.section, path.work, WorkField::Name(entry.name.clone()))
                .and_then(|()| {
                    tree.update_work(path.section, path.work, WorkField::Unit(entry.unit.clone()))
                })
                .and_then(|()| {
                    tree.update_work(
                        path.section,
                        path.work,
                        WorkField::LaborCost(entry.price_kopecks),
                    )
                })
                .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?;
            tree.row_of(RowPath::header(path.section, path.work))
                .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))
        }
        PickerKind::Material => {
            let path = tree
                .resolve_row(cursor_row)
                .ok_or_else(|| anyhow!("add a work first -- press w"))?;
            let (index, row) = match path.slot {
                RowSlot::Material(index) => (index, cursor_row),
                RowSlot::Header => {
                    let row = tree
                        .insert_material_after(cursor_row)
                        .ok_or_else(|| anyhow!("add a work first -- press w"))?;
                    let new_path = tree
                        .resolve_row(row)
                        .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?;
                    let RowSlot::Material(index) = new_path.slot else {
                        bail!("estimate row changed -- reselect and retry");
                    };
                    (index, row)
                }
            };
            tree.update_material(
                path.section,
                path.work,
                index,
                MaterialField::Name(entry.name.clone()),
            )
            .and_then(|()| {
                tree.update_material(
                    path.section,
                    path.work,
                    index,
                    MaterialField::Unit(entry.unit.clone()),
                )
            })
            .and_then(|()| {
                tree.update_material(
                    path.section,
                    path.work,
                    index,
                    MaterialField::Price(entry.price_kopecks),
                )
            })
            .ok_or_else(|| anyhow!("estimate row changed -- reselect and retry"))?;
            Ok(row)
        }
    }
}

fn export_estimate(tree: &EstimateTree, options: &UiOptions) -> Result<(PathBuf, PathBuf)> {
    let snapshot = EstimateSnapshot::capture(tree);
    let document = render_document(
        &snapshot,
        &DocumentOptions {
            title: options.document_title.clone(),
            rows_per_page: options.rows_per_page,
        },
    );

    fs::create_dir_all(&options.export_dir)
        .with_context(|| format!("create export dir {}", options.export_dir.display()))?;

    let document_path = options.export_dir.join(EXPORT_DOCUMENT_FILE);
    fs::write(&document_path, document)
        .with_context(|| format!("write {}", document_path.display()))?;

    let csv_path = options.export_dir.join(EXPORT_CSV_FILE);
    let file =
        File::create(&csv_path).with_context(|| format!("create {}", csv_path.display()))?;
    write_csv(&snapshot, file)?;

    Ok((document_path, csv_path))
}

fn render(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    tree: &EstimateTree,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(totals_line(&tree.grand_totals()))
        .block(Block::default().title("smeta").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_estimate_table(frame, layout[1], state, tree, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(picker) = &view_data.picker {
        let area = centered_rect(64, 58, frame.area());
        frame.render_widget(Clear, area);
        let title = match picker.kind {
            PickerKind::Work => "catalog works",
            PickerKind::Material => "catalog materials",
        };
        let overlay = Paragraph::new(render_picker_overlay_text(picker))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(overlay, area);
    }

    if let AppMode::Confirm(kind) = state.mode {
        let area = centered_rect(48, 20, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(confirm_prompt(kind))
            .block(Block::default().title("confirm").borders(Borders::ALL));
        frame.render_widget(prompt, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_estimate_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    tree: &EstimateTree,
    view_data: &ViewData,
) {
    let selected_column = EstimateColumn::ALL
        .iter()
        .position(|column| *column == state.column)
        .unwrap_or(0);

    let header_cells = EstimateColumn::ALL.iter().map(|column| {
        Cell::from(column.title()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells);

    // The work's merged cells highlight across its whole span.
    let owning_span = tree.resolve_row(view_data.cursor_row).map(|path| {
        let top = tree.sections()[path.section].works[path.work].row;
        (top, tree.row_span_for(top))
    });

    let rows = tree
        .flat_rows()
        .into_iter()
        .map(|flat| {
            let cells = EstimateColumn::ALL
                .iter()
                .enumerate()
                .map(|(column_index, &column)| {
                    let text = cell_text(&flat, column);
                    let mut style = Style::default();
                    if flat.row == view_data.cursor_row {
                        style = style.bg(Color::DarkGray);
                    }
                    let in_selection = if column.is_work_column() {
                        matches!(
                            owning_span,
                            Some((top, height)) if flat.row >= top && flat.row < top + height
                        )
                    } else {
                        flat.row == view_data.cursor_row
                    };
                    if in_selection && column_index == selected_column {
                        style = Style::default()
                            .fg(Color::Black)
                            .bg(Color::Cyan)
                            .add_modifier(Modifier::BOLD);
                    }
                    Cell::from(text).style(style)
                })
                .collect::<Vec<_>>();
            Row::new(cells)
        })
        .collect::<Vec<_>>();

    let table = Table::new(rows, column_widths())
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(section_title(tree, view_data))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
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
        EstimateColumn::MaterialName => material_cell(flat, |m| m.name.clone()),
        EstimateColumn::MaterialUnit => material_cell(flat, |m| m.unit.clone()),
        EstimateColumn::MaterialQuantity => material_cell(flat, |m| format_quantity(m.quantity)),
        EstimateColumn::MaterialPrice => material_cell(flat, |m| format_kopecks(m.price_kopecks)),
        EstimateColumn::MaterialTotal => material_cell(flat, |m| format_kopecks(m.total_kopecks)),
        _ => String::new(),
    }
}

fn material_cell(
    flat: &FlatRow<'_>,
    extract: impl Fn(&smeta_app::Material) -> String,
) -> String {
    flat.material.map(extract).unwrap_or_default()
}

fn column_widths() -> Vec<Constraint> {
    EstimateColumn::ALL
        .iter()
        .map(|column| match column {
            EstimateColumn::Number => Constraint::Length(4),
            EstimateColumn::WorkName | EstimateColumn::MaterialName => Constraint::Min(16),
            EstimateColumn::WorkUnit | EstimateColumn::MaterialUnit => Constraint::Length(6),
            EstimateColumn::WorkQuantity | EstimateColumn::MaterialQuantity => {
                Constraint::Length(8)
            }
            _ => Constraint::Length(12),
        })
        .collect()
}

fn section_title(tree: &EstimateTree, view_data: &ViewData) -> String {
    match tree.resolve_row(view_data.cursor_row) {
        Some(path) => tree.sections()[path.section].name.clone(),
        None => tree
            .sections()
            .first()
            .map(|section| section.name.clone())
            .unwrap_or_default(),
    }
}

fn totals_line(totals: &GrandTotals) -> String {
    format!(
        "Labor {} | Materials {} | Delivery 15% {} | Total {}",
        format_kopecks(totals.labor_kopecks),
        format_kopecks(totals.materials_kopecks),
        format_kopecks(totals.surcharge_kopecks),
        format_kopecks(totals.overall_kopecks),
    )
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if state.mode == AppMode::Edit {
        return format!("edit [{}]: {}_", state.column.title(), view_data.edit_buffer);
    }
    state
        .status_line
        .clone()
        .unwrap_or_else(|| nav_hint().to_owned())
}

const fn nav_hint() -> &'static str {
    "w work  m material  S section  d delete  p catalog  x export  ? help  q quit"
}

fn confirm_prompt(kind: ConfirmKind) -> &'static str {
    match kind {
        ConfirmKind::DeleteWork => "Delete the selected work and its materials? y/n",
        ConfirmKind::DeleteMaterial => "Delete the selected material? y/n",
    }
}

fn render_picker_overlay_text(picker: &PickerUiState) -> String {
    let mut lines = vec![format!("search: {}_", picker.query), String::new()];
    if picker.entries.is_empty() {
        lines.push(
            if picker.in_flight.is_some() {
                "searching..."
            } else {
                "no matches"
            }
            .to_owned(),
        );
    }
    for (index, entry) in picker.entries.iter().enumerate() {
        let marker = if index == picker.cursor { "► " } else { "  " };
        lines.push(format!(
            "{marker}{}  [{}]  {}",
            entry.name,
            entry.unit,
            format_kopecks(entry.price_kopecks)
        ));
    }
    lines.join("\n")
}

fn help_overlay_text() -> String {
    [
        "arrows / hjkl   move between rows and columns",
        "enter           edit the selected cell",
        "w               add a work after the cursor",
        "m               add a material after the cursor",
        "S               add a section at the end",
        "d               delete the work or material under the cursor",
        "p               pick a work or material from the catalog",
        "x               export the estimate (text + csv)",
        "?               toggle this help",
        "q / ctrl+q      quit",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
