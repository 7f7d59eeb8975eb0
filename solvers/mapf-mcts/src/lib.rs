//! Multi-agent Monte Carlo Tree Search planner for cooperative grid
//! navigation.
//!
//! A set of agents on a shared obstacle grid must each reach a goal cell
//! within a horizon. Invoked once per timestep, the planner searches the
//! joint action space and returns one move per agent, resolving vertex and
//! swap conflicts inside its environment model.
//!
//! ## Search modes
//! - sequential selection/expansion/rollout/backup
//! - batched selection with virtual loss, rollouts evaluated on a worker pool
//! - root parallelization: independent trees merged after each round
//!
//! ## Usage
//! ```no_run
//! use mapf_mcts::{Config, Environment, MonteCarloTreeSearch};
//!
//! let mut env = Environment::new();
//! env.create_grid(2, 2);
//! env.add_agent(0, 0, 1, 0);
//! env.set_seed(42);
//!
//! let mut mcts = MonteCarloTreeSearch::default();
//! mcts.set_config(Config::default());
//! mcts.set_env(env).unwrap();
//! while !mcts.env().all_done() {
//!     let joint_action = mcts.act();
//!     println!("{joint_action:?}");
//! }
//! ```

mod config;
mod environment;
mod oracle;
mod search;
mod tree;

pub use config::Config;
pub use environment::Environment;
pub use oracle::{DistanceOracle, UNREACHABLE};
pub use search::{MonteCarloTreeSearch, SearchError};
pub use tree::{Node, NodeId, Tree};
