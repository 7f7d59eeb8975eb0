//! Mutable multi-agent state over a shared grid.
//!
//! The environment executes joint actions with vertex/swap conflict
//! resolution, keeps a reversible history of executed actions, and samples
//! random legal joint actions for rollouts.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mapf_grid::{Coord, Grid, Instance, Move};

/// Multi-agent grid state: positions, goals, reached-flags, reversible
/// action history and a per-environment RNG.
///
/// Invariants after every `step`: each agent occupies a traversable cell,
/// no two live agents share a cell, and a reached agent sits on its goal
/// until a `step_back` moves it off.
#[derive(Debug)]
pub struct Environment {
    grid: Arc<Grid>,
    positions: Vec<Coord>,
    goals: Vec<Coord>,
    reached: Vec<bool>,
    history: Vec<Vec<Move>>,
    rng: SmallRng,
    /// `None` in wall-clock mode: reseeding draws fresh OS entropy.
    /// `Some` suppresses reseeding so runs reproduce.
    seed: Option<u64>,
}

impl Environment {
    /// An empty environment; populate with `create_grid`/`add_agent`.
    pub fn new() -> Self {
        Self {
            grid: Arc::new(Grid::new(0, 0)),
            positions: Vec::new(),
            goals: Vec::new(),
            reached: Vec::new(),
            history: Vec::new(),
            rng: SmallRng::from_os_rng(),
            seed: None,
        }
    }

    /// Build an environment from a parsed instance.
    pub fn from_instance(instance: &Instance) -> Self {
        let mut env = Self::new();
        env.grid = Arc::new(instance.grid().clone());
        for task in instance.agents() {
            env.positions.push(task.start);
            env.goals.push(task.goal);
            env.reached.push(false);
        }
        env
    }

    /// Replace the grid with an all-traversable one of the given size.
    pub fn create_grid(&mut self, height: u32, width: u32) {
        self.grid = Arc::new(Grid::new(height, width));
    }

    /// Mark (row, col) as an obstacle. Out-of-bounds cells are ignored.
    pub fn add_obstacle(&mut self, row: u32, col: u32) {
        Arc::make_mut(&mut self.grid).set_obstacle(row, col);
    }

    /// Append an agent with the given start and goal cells.
    pub fn add_agent(&mut self, start_r: i32, start_c: i32, goal_r: i32, goal_c: i32) {
        self.positions.push(Coord::new(start_r, start_c));
        self.goals.push(Coord::new(goal_r, goal_c));
        self.reached.push(false);
    }

    /// Seed the RNG. A negative seed selects wall-clock mode: the stream
    /// starts from OS entropy and every reseed draws fresh entropy.
    pub fn set_seed(&mut self, seed: i64) {
        if seed < 0 {
            self.seed = None;
            self.rng = SmallRng::from_os_rng();
        } else {
            self.seed = Some(seed as u64);
            self.rng = SmallRng::seed_from_u64(seed as u64);
        }
    }

    /// Reseed from OS entropy. Suppressed under a deterministic seed.
    pub fn reset_seed(&mut self) {
        if self.seed.is_none() {
            self.rng = SmallRng::from_os_rng();
        }
    }

    /// Replica for a worker slot. Under a deterministic seed each slot gets
    /// its own derived stream so parallel runs stay reproducible.
    pub fn replica(&self, slot: u64) -> Self {
        let mut env = self.clone();
        if let Some(seed) = self.seed {
            let derived = seed.wrapping_add(slot);
            env.seed = Some(derived);
            env.rng = SmallRng::seed_from_u64(derived);
        }
        env
    }

    pub fn num_agents(&self) -> usize {
        self.positions.len()
    }

    /// Number of agents whose reached-flag is set.
    pub fn num_done(&self) -> usize {
        self.reached.iter().filter(|&&r| r).count()
    }

    /// Whether every agent has reached its goal.
    pub fn all_done(&self) -> bool {
        self.reached.iter().all(|&r| r)
    }

    /// Reached-flag of agent `i`; `false` for out-of-range indices.
    pub fn reached_goal(&self, i: usize) -> bool {
        self.reached.get(i).copied().unwrap_or(false)
    }

    /// Current agent positions, indexed by agent.
    pub fn positions(&self) -> &[Coord] {
        &self.positions
    }

    /// Goal cells, indexed by agent.
    pub fn goals(&self) -> &[Coord] {
        &self.goals
    }

    /// The shared grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Number of executed joint actions that can be undone.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Most recently executed joint action, after conflict rewrites.
    pub fn last_actions(&self) -> Option<&[Move]> {
        self.history.last().map(Vec::as_slice)
    }

    /// Execute a joint action and return the summed reward (number of
    /// agents newly arrived at their goals).
    ///
    /// Resolution: reached agents are forced to stay; vertex conflicts
    /// (same target cell) and swap conflicts (exchanged cells) revert both
    /// involved agents; moves off-grid or into obstacles revert the
    /// offender. The possibly rewritten action vector is pushed on the
    /// history stack.
    pub fn step(&mut self, actions: &[Move]) -> f64 {
        let n = self.num_agents();
        debug_assert_eq!(actions.len(), n, "joint action length mismatch");
        let mut executed: Vec<Move> = actions.to_vec();
        let mut next: Vec<Coord> = Vec::with_capacity(n);
        for i in 0..n {
            if self.reached[i] {
                executed[i] = Move::Stay;
                next.push(self.positions[i]);
            } else {
                next.push(executed[i].apply(self.positions[i]));
            }
        }
        // A single pass in index order suffices: reverting only introduces
        // stay outcomes, which cannot create new conflicts.
        for i in 0..n {
            for j in (i + 1)..n {
                if self.reached[i] || self.reached[j] {
                    continue;
                }
                let vertex = next[i] == next[j];
                let swap = next[i] == self.positions[j] && next[j] == self.positions[i];
                if vertex || swap {
                    next[i] = self.positions[i];
                    next[j] = self.positions[j];
                    executed[i] = Move::Stay;
                    executed[j] = Move::Stay;
                }
            }
        }
        for i in 0..n {
            if !self.grid.is_traversable(next[i]) {
                next[i] = self.positions[i];
                executed[i] = Move::Stay;
            }
        }
        let mut reward = 0.0;
        for i in 0..n {
            if self.reached[i] {
                continue;
            }
            if next[i] == self.goals[i] {
                reward += 1.0;
                self.reached[i] = true;
            }
        }
        self.history.push(executed);
        self.positions = next;
        reward
    }

    /// Undo the most recent `step`. Panics if the history is empty.
    pub fn step_back(&mut self) {
        let last = self.history.pop().expect("step_back called with empty history");
        for (i, action) in last.iter().enumerate() {
            self.positions[i] = action.undo(self.positions[i]);
            if self.positions[i] != self.goals[i] {
                self.reached[i] = false;
            }
        }
    }

    /// Draw a uniformly random action per agent from `[0, num_actions)`.
    /// With `use_move_limits`, illegal draws are rejected and resampled;
    /// stay is always legal, so the loop terminates.
    pub fn sample_actions(
        &mut self,
        num_actions: usize,
        use_move_limits: bool,
        agents_as_obstacles: bool,
    ) -> Vec<Move> {
        debug_assert!(num_actions >= 1 && num_actions <= Move::COUNT);
        let n = self.num_agents();
        let mut actions = Vec::with_capacity(n);
        for i in 0..n {
            let mut mv = Move::ALL[self.rng.random_range(0..num_actions)];
            if use_move_limits {
                while !self.check_action(i, mv, agents_as_obstacles) {
                    mv = Move::ALL[self.rng.random_range(0..num_actions)];
                }
            }
            actions.push(mv);
        }
        actions
    }

    /// Whether `agent` may take `mv` from its current cell. Pure; returns
    /// `false` for out-of-range agent indices.
    pub fn check_action(&self, agent: usize, mv: Move, agents_as_obstacles: bool) -> bool {
        let Some(&from) = self.positions.get(agent) else {
            return false;
        };
        let future = mv.apply(from);
        if !self.grid.is_traversable(future) {
            return false;
        }
        if agents_as_obstacles {
            for (j, pos) in self.positions.iter().enumerate() {
                if j != agent && *pos == future {
                    return false;
                }
            }
        }
        true
    }

    /// Human-readable picture of the grid: `.` free, `#` obstacle, ` i `
    /// agent i, `|i|` goal of agent i. Agents already sitting on their
    /// goals are not marked.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in 0..self.grid.height() as i32 {
            for col in 0..self.grid.width() as i32 {
                let cell = Coord::new(row, col);
                let agent = self
                    .positions
                    .iter()
                    .zip(&self.goals)
                    .position(|(p, g)| *p == cell && p != g);
                let goal = self
                    .positions
                    .iter()
                    .zip(&self.goals)
                    .position(|(p, g)| *g == cell && p != g);
                if let Some(i) = agent {
                    out.push_str(&format!(" {} ", i));
                } else if let Some(i) = goal {
                    out.push_str(&format!("|{}|", i));
                } else if self.grid.is_traversable(cell) {
                    out.push_str(" . ");
                } else {
                    out.push_str(" # ");
                }
            }
            out.push('\n');
        }
        out
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the grid allocation but own independent positions,
/// reached-flags, history and RNG. In wall-clock mode the clone's RNG is
/// reseeded from entropy to decorrelate it from the original; under a
/// deterministic seed the stream state is copied verbatim.
impl Clone for Environment {
    fn clone(&self) -> Self {
        let rng = match self.seed {
            Some(_) => self.rng.clone(),
            None => SmallRng::from_os_rng(),
        };
        Self {
            grid: Arc::clone(&self.grid),
            positions: self.positions.clone(),
            goals: self.goals.clone(),
            reached: self.reached.clone(),
            history: self.history.clone(),
            rng,
            seed: self.seed,
        }
    }
}
