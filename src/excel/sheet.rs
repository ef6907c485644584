use std::collections::BTreeSet;

use crate::excel::{Cell, CellValue};
use crate::utils::CellCoord;

static EMPTY_CELL: Cell = Cell::Literal(CellValue::Empty);

/// One worksheet held in memory. `data` is indexed `[row][col]`, both 1-based;
/// row 0 and column 0 are padding.
///
/// Cells changed through [`Sheet::set`] or [`Sheet::clear`] are remembered so a
/// save can patch just those cells into the original package.
#[derive(Clone, Debug)]
pub struct Sheet {
    pub name: String,
    pub data: Vec<Vec<Cell>>,
    pub max_rows: u32,
    pub max_cols: usize,
    touched: BTreeSet<CellCoord>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: vec![vec![Cell::empty(); 1]; 1],
            max_rows: 0,
            max_cols: 0,
            touched: BTreeSet::new(),
        }
    }

    pub fn get(&self, coord: CellCoord) -> &Cell {
        self.data
            .get(coord.row as usize)
            .and_then(|row| row.get(coord.col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn set(&mut self, coord: CellCoord, cell: Cell) {
        self.ensure_cell_exists(coord.row, coord.col);
        self.data[coord.row as usize][coord.col] = cell;
        self.touched.insert(coord);
    }

    pub fn set_value(&mut self, coord: CellCoord, value: CellValue) {
        self.set(coord, Cell::Literal(value));
    }

    /// Blanks a cell. Returns `false` when there was nothing to blank.
    pub fn clear(&mut self, coord: CellCoord) -> bool {
        let Some(cell) = self
            .data
            .get_mut(coord.row as usize)
            .and_then(|row| row.get_mut(coord.col))
        else {
            return false;
        };
        if cell.is_empty() {
            return false;
        }

        *cell = Cell::empty();
        self.touched.insert(coord);
        true
    }

    /// Cells changed since load, row by row, with their current content.
    pub fn touched_cells(&self) -> impl Iterator<Item = (CellCoord, &Cell)> {
        self.touched.iter().map(|coord| (*coord, self.get(*coord)))
    }

    pub(crate) fn mark_clean(&mut self) {
        self.touched.clear();
    }

    pub fn ensure_cell_exists(&mut self, row: u32, col: usize) {
        let row_idx = row as usize;

        // Expand rows if needed
        if row_idx >= self.data.len() {
            let row_len = self.data[0].len().max(col + 1);
            self.data.resize_with(row_idx + 1, || vec![Cell::empty(); row_len]);
        }

        // Expand columns if needed
        if col >= self.data[0].len() {
            for row_data in &mut self.data {
                row_data.resize_with(col + 1, Cell::empty);
            }
        }

        self.max_rows = self.max_rows.max(row);
        self.max_cols = self.max_cols.max(col);
    }

    /// Every non-empty cell, row by row.
    pub fn used_cells(&self) -> impl Iterator<Item = (CellCoord, &Cell)> {
        self.data.iter().enumerate().skip(1).flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, cell)| !cell.is_empty())
                .map(move |(col, cell)| (CellCoord::new(col, row as u32), cell))
        })
    }
}
