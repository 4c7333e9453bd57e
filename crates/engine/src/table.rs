//! Table primitive the engine renders into.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub title: String,
    pub width: u16,
}

/// Minimal surface a screen needs from its table widget.
pub trait TableView {
    fn set_columns(&mut self, columns: Vec<ColumnHeader>);
    fn set_rows(&mut self, rows: Vec<Vec<String>>);
    fn set_height(&mut self, height: u16);
    fn set_width(&mut self, width: u16);
    fn cursor(&self) -> usize;
    fn set_cursor(&mut self, cursor: usize);
}

/// In-memory table: the terminal front end draws from it, tests inspect it.
#[derive(Debug, Clone, Default)]
pub struct TableModel {
    columns: Vec<ColumnHeader>,
    rows: Vec<Vec<String>>,
    height: u16,
    width: u16,
    cursor: usize,
    offset: usize,
}

impl TableModel {
    pub fn new() -> Self { Self::default() }

    pub fn columns(&self) -> &[ColumnHeader] { &self.columns }
    pub fn rows(&self) -> &[Vec<String>] { &self.rows }
    pub fn height(&self) -> u16 { self.height }
    pub fn width(&self) -> u16 { self.width }

    /// First row shown in the viewport.
    pub fn offset(&self) -> usize { self.offset }

    /// Rows currently inside the viewport.
    pub fn visible_rows(&self) -> &[Vec<String>] {
        let end = (self.offset + self.viewport()).min(self.rows.len());
        &self.rows[self.offset.min(end)..end]
    }

    fn viewport(&self) -> usize {
        if self.height == 0 { self.rows.len() } else { self.height as usize }
    }

    fn clamp(&mut self) {
        self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
        let view = self.viewport().max(1);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + view {
            self.offset = self.cursor + 1 - view;
        }
        let max_offset = self.rows.len().saturating_sub(view);
        self.offset = self.offset.min(max_offset);
    }
}

impl TableView for TableModel {
    fn set_columns(&mut self, columns: Vec<ColumnHeader>) { self.columns = columns; }

    fn set_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
        self.clamp();
    }

    fn set_height(&mut self, height: u16) {
        self.height = height;
        self.clamp();
    }

    fn set_width(&mut self, width: u16) { self.width = width; }

    fn cursor(&self) -> usize { self.cursor }

    fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
        self.clamp();
    }
}
