//! Planner configuration.

use mapf_grid::Move;

/// Tunable options of the planner. `Default` matches the settings the
/// planner ships with; any field can be overridden before `set_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Discount applied once per selection step and once per timestep in
    /// rollouts. Must lie in (0, 1].
    pub gamma: f64,
    /// Action alphabet size; at most [`Move::COUNT`].
    pub num_actions: usize,
    /// Selection-backup iterations per agent decision.
    pub num_expansions: usize,
    /// Exploration weight in UCT.
    pub uct_c: f64,
    /// Rollout horizon in joint steps.
    pub steps_limit: usize,
    /// Leaf rollouts averaged per expansion.
    pub multi_simulations: usize,
    /// Reject moves off-grid or into obstacles at selection/rollout time.
    pub use_move_limits: bool,
    /// Additionally reject moves onto other agents' current cells.
    pub agents_as_obstacles: bool,
    /// If > 1, batched virtual-loss selection.
    pub batch_size: usize,
    /// If > 1, root parallelization over this many trees.
    pub num_parallel_trees: usize,
    /// Weight of the goal-distance bias in UCT; 0 disables the BFS oracle.
    pub heuristic_coef: f64,
    /// Emit per-agent search statistics through `tracing`.
    pub render: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            num_actions: Move::COUNT,
            num_expansions: 1000,
            uct_c: 1.0,
            steps_limit: 64,
            multi_simulations: 1,
            use_move_limits: true,
            agents_as_obstacles: false,
            batch_size: 1,
            num_parallel_trees: 1,
            heuristic_coef: 0.0,
            render: false,
        }
    }
}

impl Config {
    /// Worker slots needed to serve the configured parallelism.
    pub(crate) fn num_slots(&self) -> usize {
        self.num_parallel_trees
            .max(self.batch_size)
            .max(self.multi_simulations)
            .max(1)
    }
}
