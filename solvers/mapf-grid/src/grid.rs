//! Rectangular obstacle grid.

use crate::action::Coord;

/// A single cell in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    /// Agents can occupy this cell.
    Traversable,
    /// Obstacle; agents cannot enter.
    Obstacle,
}

/// A rectangular grid of tiles, row-major. Immutable once the owning
/// environment finishes construction.
#[derive(Debug, Clone)]
pub struct Grid {
    height: u32,
    width: u32,
    /// Row-major; index = row * width + col.
    tiles: Vec<Tile>,
}

impl Grid {
    /// Create a grid with every cell traversable.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            tiles: vec![Tile::Traversable; (height * width) as usize],
        }
    }

    /// Build a grid from row-major tiles. Returns `None` if the tile count
    /// does not match the dimensions.
    pub fn from_tiles(height: u32, width: u32, tiles: Vec<Tile>) -> Option<Self> {
        if tiles.len() != (height * width) as usize {
            return None;
        }
        Some(Self { height, width, tiles })
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mark cell (row, col) as an obstacle. Out-of-bounds cells are ignored.
    pub fn set_obstacle(&mut self, row: u32, col: u32) {
        if row < self.height && col < self.width {
            self.tiles[(row * self.width + col) as usize] = Tile::Obstacle;
        }
    }

    /// Tile at (row, col). Returns `None` if out of bounds.
    pub fn get(&self, row: u32, col: u32) -> Option<Tile> {
        if row < self.height && col < self.width {
            Some(self.tiles[(row * self.width + col) as usize])
        } else {
            None
        }
    }

    /// Whether `cell` is on the grid and traversable. Negative and
    /// out-of-bounds coordinates are not traversable.
    pub fn is_traversable(&self, cell: Coord) -> bool {
        if cell.row < 0 || cell.col < 0 {
            return false;
        }
        self.get(cell.row as u32, cell.col as u32) == Some(Tile::Traversable)
    }

    /// Whether `cell` lies on the grid.
    pub fn in_bounds(&self, cell: Coord) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as u32) < self.height
            && (cell.col as u32) < self.width
    }
}
