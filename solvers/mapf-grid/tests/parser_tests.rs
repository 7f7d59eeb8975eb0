//! Tests for instance parsing.

use mapf_grid::{Coord, Instance, InstanceError, Tile};
use pretty_assertions::assert_eq;

const TWO_BY_TWO: &str = r#"height 2
width 2
map
0 1
0 0
agents
0 0 1 0
"#;

const CORRIDOR: &str = r#"height 3
width 5
map
00000
01110
00000
agents
1 0 1 4
0 0 2 4
"#;

#[test]
fn parse_two_by_two() {
    let instance = Instance::parse(TWO_BY_TWO).expect("parse failed");
    let grid = instance.grid();
    assert_eq!(grid.height(), 2);
    assert_eq!(grid.width(), 2);
    assert_eq!(grid.get(0, 1), Some(Tile::Obstacle));
    assert_eq!(grid.get(0, 0), Some(Tile::Traversable));

    assert_eq!(instance.num_agents(), 1);
    let task = instance.agents()[0];
    assert_eq!(task.start, Coord::new(0, 0));
    assert_eq!(task.goal, Coord::new(1, 0));
}

#[test]
fn parse_compact_rows_without_spaces() {
    let instance = Instance::parse(CORRIDOR).expect("parse failed");
    assert_eq!(instance.grid().get(1, 2), Some(Tile::Obstacle));
    assert_eq!(instance.num_agents(), 2);
    assert_eq!(instance.agents()[1].goal, Coord::new(2, 4));
}

#[test]
fn parse_missing_height() {
    let bad = "width 2\nmap\n00\n00\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::MissingHeader("height")));
}

#[test]
fn parse_invalid_header_value() {
    let bad = "height x\nwidth 2\nmap\n00\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::InvalidHeader { field: "height", .. }));
}

#[test]
fn parse_row_width_mismatch() {
    let bad = "height 2\nwidth 3\nmap\n000\n00\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::RowWidthMismatch { row: 1, expected: 3, got: 2 }));
}

#[test]
fn parse_dimension_mismatch() {
    let bad = "height 3\nwidth 2\nmap\n00\n00\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::DimensionMismatch { expected: 3, got: 2 }));
}

#[test]
fn parse_invalid_token() {
    let bad = "height 1\nwidth 3\nmap\n0x0\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::InvalidToken { row: 0, token: 'x' }));
}

#[test]
fn parse_malformed_agent_field_count() {
    let bad = "height 1\nwidth 2\nmap\n00\nagents\n0 0 0\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::MalformedAgent { .. }));
}

#[test]
fn parse_agent_on_obstacle() {
    let bad = "height 1\nwidth 2\nmap\n01\nagents\n0 0 0 1\n";
    let err = Instance::parse(bad).unwrap_err();
    assert!(matches!(err, InstanceError::MalformedAgent { .. }));
}

#[test]
fn parse_no_agents_section() {
    let instance = Instance::parse("height 1\nwidth 1\nmap\n0\n").expect("parse failed");
    assert_eq!(instance.num_agents(), 0);
}
