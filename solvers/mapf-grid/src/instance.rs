//! Plain-text planning-instance parser.
//!
//! An instance describes one planning problem: a map section with
//! `height`/`width` headers and rows of `0`/`1` tokens (1 = obstacle),
//! followed by an `agents` section with one `start_r start_c goal_r goal_c`
//! line per agent.

use thiserror::Error;

use crate::action::Coord;
use crate::grid::{Grid, Tile};

/// Errors from parsing an instance description.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("missing header field: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header value for {field}: {value}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("dimension mismatch: expected {expected} rows, got {got}")]
    DimensionMismatch { expected: u32, got: u32 },

    #[error("row {row} width mismatch: expected {expected}, got {got}")]
    RowWidthMismatch { row: u32, expected: u32, got: u32 },

    #[error("invalid token '{token}' in map row {row}")]
    InvalidToken { row: u32, token: char },

    #[error("malformed agent on line {line}: {reason}")]
    MalformedAgent { line: usize, reason: String },
}

/// Start and goal cells of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTask {
    pub start: Coord,
    pub goal: Coord,
}

/// A parsed planning instance: obstacle grid plus agent tasks.
#[derive(Debug, Clone)]
pub struct Instance {
    grid: Grid,
    agents: Vec<AgentTask>,
}

impl Instance {
    /// Parse an instance description.
    ///
    /// Expected format:
    /// ```text
    /// height 2
    /// width 2
    /// map
    /// 0 1
    /// 0 0
    /// agents
    /// 0 0 1 0
    /// ```
    /// Whitespace between map tokens is optional. Agent lines hold
    /// `start_r start_c goal_r goal_c`; both cells must be traversable.
    pub fn parse(input: &str) -> Result<Self, InstanceError> {
        let mut lines = input.lines().enumerate();

        let mut height: Option<u32> = None;
        let mut width: Option<u32> = None;

        for (_, line) in lines.by_ref() {
            let line = line.trim();
            if line.eq_ignore_ascii_case("map") {
                break;
            }
            if let Some(rest) = line.strip_prefix("height ") {
                height = Some(rest.trim().parse().map_err(|_| InstanceError::InvalidHeader {
                    field: "height",
                    value: rest.to_string(),
                })?);
            } else if let Some(rest) = line.strip_prefix("width ") {
                width = Some(rest.trim().parse().map_err(|_| InstanceError::InvalidHeader {
                    field: "width",
                    value: rest.to_string(),
                })?);
            }
        }

        let height = height.ok_or(InstanceError::MissingHeader("height"))?;
        let width = width.ok_or(InstanceError::MissingHeader("width"))?;

        let mut tiles = Vec::with_capacity((height * width) as usize);
        let mut row_count: u32 = 0;

        for (_, line) in lines.by_ref() {
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case("agents") {
                break;
            }
            if trimmed.is_empty() {
                continue;
            }
            let mut row_width: u32 = 0;
            for ch in trimmed.chars() {
                if ch.is_whitespace() {
                    continue;
                }
                match ch {
                    '0' => tiles.push(Tile::Traversable),
                    '1' => tiles.push(Tile::Obstacle),
                    token => {
                        return Err(InstanceError::InvalidToken { row: row_count, token })
                    }
                }
                row_width += 1;
            }
            if row_width != width {
                return Err(InstanceError::RowWidthMismatch {
                    row: row_count,
                    expected: width,
                    got: row_width,
                });
            }
            row_count += 1;
        }

        if row_count != height {
            return Err(InstanceError::DimensionMismatch { expected: height, got: row_count });
        }

        let grid = Grid::from_tiles(height, width, tiles)
            .ok_or(InstanceError::DimensionMismatch { expected: height, got: row_count })?;

        let mut agents = Vec::new();
        for (line_no, line) in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 4 {
                return Err(InstanceError::MalformedAgent {
                    line: line_no + 1,
                    reason: format!("expected 4 fields, got {}", fields.len()),
                });
            }
            let parse_coord = |idx: usize, name: &str| -> Result<i32, InstanceError> {
                fields[idx].parse().map_err(|_| InstanceError::MalformedAgent {
                    line: line_no + 1,
                    reason: format!("invalid {}: {}", name, fields[idx]),
                })
            };
            let task = AgentTask {
                start: Coord::new(parse_coord(0, "start_r")?, parse_coord(1, "start_c")?),
                goal: Coord::new(parse_coord(2, "goal_r")?, parse_coord(3, "goal_c")?),
            };
            for (cell, name) in [(task.start, "start"), (task.goal, "goal")] {
                if !grid.is_traversable(cell) {
                    return Err(InstanceError::MalformedAgent {
                        line: line_no + 1,
                        reason: format!("{} ({}, {}) is not traversable", name, cell.row, cell.col),
                    });
                }
            }
            agents.push(task);
        }

        Ok(Self { grid, agents })
    }

    /// The obstacle grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// All agent tasks.
    pub fn agents(&self) -> &[AgentTask] {
        &self.agents
    }

    /// Number of agents.
    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }
}
