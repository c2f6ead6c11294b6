//! Column layout for the square grid.
//!
//! Squares are packed into columns so that column heights never differ by
//! more than one. When every column is exactly as tall as there are columns,
//! the next square opens a new column; otherwise it lands in the right-most
//! shortest column. Replaying squares in id order always rebuilds the same
//! layout, which is what lets a freshly loaded grid match one that was built
//! incrementally.

use shared::domain::{Square, SquareId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    columns: Vec<Vec<Square>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    NewColumn,
    Append(usize),
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a grid by placing `squares` one at a time in ascending id order.
    pub fn layout_all(squares: impl IntoIterator<Item = Square>) -> Self {
        let mut ordered: Vec<Square> = squares.into_iter().collect();
        ordered.sort_by_key(|square| square.id);

        let mut grid = Self::new();
        for square in ordered {
            grid.push(square);
        }
        grid
    }

    /// Returns a copy of this grid with `square` placed into it.
    pub fn place_one(&self, square: Square) -> Self {
        let mut next = self.clone();
        next.push(square);
        next
    }

    pub fn push(&mut self, square: Square) {
        match placement_for(&self.heights()) {
            Placement::NewColumn => self.columns.push(vec![square]),
            Placement::Append(index) => self.columns[index].push(square),
        }
    }

    pub fn columns(&self) -> &[Vec<Square>] {
        &self.columns
    }

    pub fn heights(&self) -> Vec<usize> {
        self.columns.iter().map(Vec::len).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn squares(&self) -> impl Iterator<Item = &Square> + '_ {
        self.columns.iter().flatten()
    }

    pub fn ids(&self) -> impl Iterator<Item = SquareId> + '_ {
        self.squares().map(|square| square.id)
    }

    pub fn get(&self, id: SquareId) -> Option<&Square> {
        self.squares().find(|square| square.id == id)
    }

    /// The square with the highest id, i.e. the most recently created one.
    pub fn last_added(&self) -> Option<&Square> {
        self.squares().max_by_key(|square| square.id)
    }

    /// Rewrites the id of the square currently identified by `from`, keeping
    /// its position. Only provisional ids are ever renumbered.
    pub(crate) fn renumber(&mut self, from: SquareId, to: SquareId) -> bool {
        let Some(square) = self.columns.iter_mut().flatten().find(|s| s.id == from) else {
            return false;
        };
        square.id = to;
        true
    }
}

fn placement_for(heights: &[usize]) -> Placement {
    let column_count = heights.len();
    if column_count == 0 || heights.iter().all(|&height| height == column_count) {
        return Placement::NewColumn;
    }

    let min_height = heights.iter().copied().min().unwrap_or_default();
    heights
        .iter()
        .rposition(|&height| height == min_height)
        .map_or(Placement::NewColumn, Placement::Append)
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;
