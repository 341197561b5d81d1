//! Directional navigation between menu buttons
//!
//! Neighbors are plain indices into the cell array. Moving off an edge of the
//! grid (or onto a missing cell in a short last row) stays on the current
//! button, so every reference is always a valid cell.

use super::layout::{ButtonCell, Neighbors};

/// Cells of one menu page with their neighbor relations filled in
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationGraph {
    columns: usize,
    cells: Vec<ButtonCell>,
}

impl NavigationGraph {
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> &[ButtonCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn neighbors(&self, index: usize) -> Option<Neighbors> {
        self.cells.get(index).map(|c| c.neighbors)
    }

    pub fn into_cells(self) -> Vec<ButtonCell> {
        self.cells
    }
}

/// Builds a [`NavigationGraph`] for a row-major grid
#[derive(Debug, Clone, Copy)]
pub struct NavigationGraphBuilder {
    columns: usize,
}

impl NavigationGraphBuilder {
    pub fn new(columns: usize) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    /// Compute up/down/left/right for every cell
    pub fn build(&self, cells: &[ButtonCell]) -> NavigationGraph {
        let n = cells.len();
        let cols = self.columns;

        let cells = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let row = i / cols;
                let col = i % cols;
                let mut cell = cell.clone();
                cell.neighbors = Neighbors {
                    up: if row > 0 { i - cols } else { i },
                    down: if i + cols < n { i + cols } else { i },
                    left: if col > 0 { i - 1 } else { i },
                    right: if col + 1 < cols && i + 1 < n { i + 1 } else { i },
                };
                cell
            })
            .collect();

        NavigationGraph {
            columns: cols,
            cells,
        }
    }
}
