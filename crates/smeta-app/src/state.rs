// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerKind {
    Work,
    Material,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmKind {
    DeleteWork,
    DeleteMaterial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Edit,
    Picker(PickerKind),
    Confirm(ConfirmKind),
}

/// Columns of the flat estimate table, in display order. The first six
/// describe the work and are rendered only on the work's header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateColumn {
    Number,
    WorkName,
    WorkUnit,
    WorkQuantity,
    LaborPrice,
    WorkTotal,
    MaterialName,
    MaterialUnit,
    MaterialQuantity,
    MaterialPrice,
    MaterialTotal,
}

impl EstimateColumn {
    pub const ALL: [Self; 11] = [
        Self::Number,
        Self::WorkName,
        Self::WorkUnit,
        Self::WorkQuantity,
        Self::LaborPrice,
        Self::WorkTotal,
        Self::MaterialName,
        Self::MaterialUnit,
        Self::MaterialQuantity,
        Self::MaterialPrice,
        Self::MaterialTotal,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Self::Number => "#",
            Self::WorkName => "Work",
            Self::WorkUnit => "Unit",
            Self::WorkQuantity => "Qty",
            Self::LaborPrice => "Labor price",
            Self::WorkTotal => "Labor total",
            Self::MaterialName => "Material",
            Self::MaterialUnit => "Unit",
            Self::MaterialQuantity => "Qty",
            Self::MaterialPrice => "Price",
            Self::MaterialTotal => "Total",
        }
    }

    pub const fn is_work_column(self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::WorkName
                | Self::WorkUnit
                | Self::WorkQuantity
                | Self::LaborPrice
                | Self::WorkTotal
        )
    }

    /// Derived totals and the work number are never edited directly.
    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Number | Self::WorkTotal | Self::MaterialTotal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub column: EstimateColumn,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            column: EstimateColumn::WorkName,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextColumn,
    PrevColumn,
    EnterEditMode,
    ExitToNav,
    OpenPicker(PickerKind),
    OpenConfirm(ConfirmKind),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ColumnChanged(EstimateColumn),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextColumn => self.rotate_column(1),
            AppCommand::PrevColumn => self.rotate_column(-1),
            AppCommand::EnterEditMode => {
                self.mode = AppMode::Edit;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode), self.set_status("nav")]
            }
            AppCommand::OpenPicker(kind) => {
                self.mode = AppMode::Picker(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenConfirm(kind) => {
                self.mode = AppMode::Confirm(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetStatus(message) => {
                vec![self.set_status(&message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_column(&mut self, delta: isize) -> Vec<AppEvent> {
        let columns = EstimateColumn::ALL;
        let current = columns
            .iter()
            .position(|column| *column == self.column)
            .unwrap_or(0) as isize;
        let len = columns.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.column = columns[next];
        vec![AppEvent::ColumnChanged(self.column)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState, ConfirmKind, EstimateColumn, PickerKind};

    #[test]
    fn column_rotation_wraps() {
        let mut state = AppState {
            column: EstimateColumn::MaterialTotal,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextColumn);
        assert_eq!(state.column, EstimateColumn::Number);
        assert_eq!(events, vec![AppEvent::ColumnChanged(EstimateColumn::Number)]);

        state.dispatch(AppCommand::PrevColumn);
        assert_eq!(state.column, EstimateColumn::MaterialTotal);
    }

    #[test]
    fn mode_transitions() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::EnterEditMode);
        assert_eq!(state.mode, AppMode::Edit);

        state.dispatch(AppCommand::OpenPicker(PickerKind::Material));
        assert_eq!(state.mode, AppMode::Picker(PickerKind::Material));

        state.dispatch(AppCommand::OpenConfirm(ConfirmKind::DeleteWork));
        assert_eq!(state.mode, AppMode::Confirm(ConfirmKind::DeleteWork));

        state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn clear_status_drops_the_message() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::ExitToNav);
        assert!(state.status_line.is_some());

        let events = state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
        assert_eq!(events, vec![AppEvent::StatusCleared]);
    }

    #[test]
    fn totals_and_number_columns_are_read_only() {
        assert!(!EstimateColumn::Number.is_editable());
        assert!(!EstimateColumn::WorkTotal.is_editable());
        assert!(!EstimateColumn::MaterialTotal.is_editable());
        assert!(EstimateColumn::WorkName.is_editable());
        assert!(EstimateColumn::MaterialPrice.is_editable());
    }
}
