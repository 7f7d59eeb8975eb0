//! Goal-sourced BFS distance fields.

use std::collections::VecDeque;

use mapf_grid::{Coord, Move};

use crate::environment::Environment;

/// Sentinel distance for cells no path reaches.
pub const UNREACHABLE: u32 = u32::MAX;

/// One BFS distance field per agent, rooted at that agent's goal and
/// expanded over traversable cells with the four cardinal moves.
#[derive(Debug, Clone)]
pub struct DistanceOracle {
    /// Per-agent row-major distance fields.
    fields: Vec<Vec<u32>>,
    height: u32,
    width: u32,
}

impl DistanceOracle {
    /// Run one BFS per agent over the environment's grid.
    pub fn compute(env: &Environment) -> Self {
        let grid = env.grid();
        let (height, width) = (grid.height(), grid.width());
        let fields = env
            .goals()
            .iter()
            .map(|&goal| {
                let mut dist = vec![UNREACHABLE; (height * width) as usize];
                let mut frontier = VecDeque::new();
                if grid.is_traversable(goal) {
                    dist[(goal.row as u32 * width + goal.col as u32) as usize] = 0;
                    frontier.push_back(goal);
                }
                while let Some(cell) = frontier.pop_front() {
                    let here = dist[(cell.row as u32 * width + cell.col as u32) as usize];
                    for mv in &Move::ALL[1..] {
                        let next = mv.apply(cell);
                        if !grid.is_traversable(next) {
                            continue;
                        }
                        let idx = (next.row as u32 * width + next.col as u32) as usize;
                        if dist[idx] == UNREACHABLE {
                            dist[idx] = here + 1;
                            frontier.push_back(next);
                        }
                    }
                }
                dist
            })
            .collect();
        Self { fields, height, width }
    }

    /// BFS distance from `cell` to agent `agent`'s goal. Off-grid cells
    /// and out-of-range agents report [`UNREACHABLE`].
    pub fn distance(&self, agent: usize, cell: Coord) -> u32 {
        let Some(field) = self.fields.get(agent) else {
            return UNREACHABLE;
        };
        if cell.row < 0
            || cell.col < 0
            || cell.row as u32 >= self.height
            || cell.col as u32 >= self.width
        {
            return UNREACHABLE;
        }
        field[(cell.row as u32 * self.width + cell.col as u32) as usize]
    }
}
