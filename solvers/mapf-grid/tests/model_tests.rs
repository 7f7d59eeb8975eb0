//! Tests for the action model and the obstacle grid.

use mapf_grid::{Coord, Grid, Move, Tile};
use pretty_assertions::assert_eq;

// ─────────────────────────────────────────────────────────────────────────────
// Move tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn move_indices_are_stable() {
    for (index, mv) in Move::ALL.iter().enumerate() {
        assert_eq!(mv.index(), index);
        assert_eq!(Move::from_index(index), Some(*mv));
    }
    assert_eq!(Move::from_index(Move::COUNT), None);
}

#[test]
fn move_deltas_match_alphabet() {
    assert_eq!(Move::Stay.delta(), (0, 0));
    assert_eq!(Move::Up.delta(), (-1, 0));
    assert_eq!(Move::Down.delta(), (1, 0));
    assert_eq!(Move::Left.delta(), (0, -1));
    assert_eq!(Move::Right.delta(), (0, 1));
}

#[test]
fn apply_then_undo_is_identity() {
    let from = Coord::new(3, 5);
    for mv in Move::ALL {
        assert_eq!(mv.undo(mv.apply(from)), from, "{:?}", mv);
    }
}

#[test]
fn move_glyphs() {
    let glyphs: String = Move::ALL.iter().map(|m| m.glyph()).collect();
    assert_eq!(glyphs, "SUDLR");
}

// ─────────────────────────────────────────────────────────────────────────────
// Grid tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn new_grid_is_all_traversable() {
    let grid = Grid::new(3, 4);
    assert_eq!(grid.height(), 3);
    assert_eq!(grid.width(), 4);
    for row in 0..3 {
        for col in 0..4 {
            assert_eq!(grid.get(row, col), Some(Tile::Traversable), "({row},{col})");
        }
    }
}

#[test]
fn set_obstacle_marks_cell() {
    let mut grid = Grid::new(2, 2);
    grid.set_obstacle(0, 1);
    assert_eq!(grid.get(0, 1), Some(Tile::Obstacle));
    assert_eq!(grid.get(1, 1), Some(Tile::Traversable));
}

#[test]
fn set_obstacle_out_of_bounds_is_ignored() {
    let mut grid = Grid::new(2, 2);
    grid.set_obstacle(5, 5);
    for row in 0..2 {
        for col in 0..2 {
            assert_eq!(grid.get(row, col), Some(Tile::Traversable));
        }
    }
}

#[test]
fn get_out_of_bounds() {
    let grid = Grid::new(2, 2);
    assert_eq!(grid.get(2, 0), None);
    assert_eq!(grid.get(0, 2), None);
}

#[test]
fn traversable_rejects_negative_and_out_of_bounds() {
    let mut grid = Grid::new(2, 2);
    grid.set_obstacle(1, 1);
    assert!(grid.is_traversable(Coord::new(0, 0)));
    assert!(!grid.is_traversable(Coord::new(1, 1)));
    assert!(!grid.is_traversable(Coord::new(-1, 0)));
    assert!(!grid.is_traversable(Coord::new(0, -1)));
    assert!(!grid.is_traversable(Coord::new(2, 0)));
    assert!(!grid.is_traversable(Coord::new(0, 2)));
}

#[test]
fn from_tiles_checks_count() {
    assert!(Grid::from_tiles(2, 2, vec![Tile::Traversable; 4]).is_some());
    assert!(Grid::from_tiles(2, 2, vec![Tile::Traversable; 3]).is_none());
}
