//! Per-table view state driven by the presentation shell.
//!
//! `Idle -> Loaded`, `Loaded <-> Filtered` through search and clear,
//! `Loaded | Filtered -> Editing -> Loaded` through the add and edit dialogs.
//! A failed operation is recorded as the last error and leaves the state
//! where it was.

use tracing::debug;

use crate::libs::engine::{CrudEngine, EditForm, SearchOutcome};
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::record::{Record, RowSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loaded,
    Filtered,
    Editing,
}

/// What the open dialog is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Add(Vec<String>),
    Edit(EditForm),
}

pub struct TableView {
    table: String,
    state: ViewState,
    rows: RowSet,
    dialog: Option<Dialog>,
    return_to: ViewState,
    last_error: Option<String>,
}

impl TableView {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: ViewState::Idle,
            rows: RowSet::default(),
            dialog: None,
            return_to: ViewState::Idle,
            last_error: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut Dialog> {
        self.dialog.as_mut()
    }

    /// Error from the last failed operation, cleared on read.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    fn settle<T>(&mut self, result: ConsoleResult<T>) -> ConsoleResult<T> {
        if let Err(e) = &result {
            debug!(table = %self.table, state = ?self.state, error = %e, "view operation failed");
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn show(&mut self, rows: RowSet, state: ViewState) {
        self.rows = rows;
        self.state = state;
    }

    pub async fn load(&mut self, engine: &CrudEngine) -> ConsoleResult<()> {
        let result = engine.list(&self.table).await;
        let rows = self.settle(result)?;
        self.show(rows, ViewState::Loaded);
        Ok(())
    }

    /// Filters the grid. A search with no matches empties it.
    pub async fn search(&mut self, engine: &CrudEngine, term: &str) -> ConsoleResult<usize> {
        let result = engine.search(&self.table, term).await;
        match self.settle(result)? {
            SearchOutcome::Matches(rows) => {
                let found = rows.len();
                self.show(rows, ViewState::Filtered);
                Ok(found)
            }
            SearchOutcome::NoResults => {
                let columns = self.rows.columns.clone();
                self.show(RowSet { columns, rows: Vec::new() }, ViewState::Filtered);
                Ok(0)
            }
        }
    }

    pub async fn clear_search(&mut self, engine: &CrudEngine) -> ConsoleResult<()> {
        self.load(engine).await
    }

    fn open(&mut self, dialog: Dialog) {
        self.return_to = self.state;
        self.dialog = Some(dialog);
        self.state = ViewState::Editing;
    }

    fn require_grid(&mut self) -> ConsoleResult<()> {
        match self.state {
            ViewState::Loaded | ViewState::Filtered => Ok(()),
            _ => self.settle(Err(ConsoleError::InvalidState("Open the table first"))),
        }
    }

    pub async fn begin_add(&mut self, engine: &CrudEngine) -> ConsoleResult<()> {
        self.require_grid()?;
        let result = engine.create_form(&self.table).await;
        let columns = self.settle(result)?;
        self.open(Dialog::Add(columns));
        Ok(())
    }

    pub async fn begin_edit(&mut self, engine: &CrudEngine, record: &Record) -> ConsoleResult<()> {
        self.require_grid()?;
        let result = engine.edit_form(&self.table, record).await;
        let form = self.settle(result)?;
        self.open(Dialog::Edit(form));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.dialog.take().is_some() {
            self.state = self.return_to;
        }
    }

    /// Saves an add dialog with the given values.
    pub async fn save_add(
        &mut self,
        engine: &CrudEngine,
        values: &[(String, String)],
    ) -> ConsoleResult<()> {
        if !matches!(self.dialog, Some(Dialog::Add(_))) {
            return self.settle(Err(ConsoleError::InvalidState("No add dialog is open")));
        }
        let result = engine.create(&self.table, values).await;
        let rows = self.settle(result)?;
        self.dialog = None;
        self.show(rows, ViewState::Loaded);
        Ok(())
    }

    /// Saves the open edit dialog.
    pub async fn save_edit(&mut self, engine: &CrudEngine) -> ConsoleResult<()> {
        let Some(Dialog::Edit(form)) = &self.dialog else {
            return self.settle(Err(ConsoleError::InvalidState("No edit dialog is open")));
        };
        let (key, values) = (form.key_value.clone(), form.values());
        let result = engine.update(&self.table, &key, &values).await;
        let rows = self.settle(result)?;
        self.dialog = None;
        self.show(rows, ViewState::Loaded);
        Ok(())
    }

    pub async fn delete(
        &mut self,
        engine: &CrudEngine,
        record: &Record,
        confirmed: bool,
    ) -> ConsoleResult<()> {
        self.require_grid()?;
        let result = match engine.key_of(&self.table, record).await {
            Ok(key) => engine.delete(&self.table, &key, confirmed).await,
            Err(e) => Err(e),
        };
        let rows = self.settle(result)?;
        self.show(rows, ViewState::Loaded);
        Ok(())
    }
}
