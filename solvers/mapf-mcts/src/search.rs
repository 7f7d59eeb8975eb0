//! Monte Carlo Tree Search over joint agent decisions.
//!
//! Three decision modes share the same selection, expansion, rollout and
//! backup primitives: a sequential loop, batched selection with virtual
//! loss, and root parallelization over independent trees merged after each
//! round. The engine owns one environment replica and one tree per worker
//! slot; parallel sections run on a fixed-size rayon pool.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{info, warn};

use mapf_grid::Move;

use crate::config::Config;
use crate::environment::Environment;
use crate::oracle::DistanceOracle;
use crate::tree::{NodeId, Tree};

/// Errors surfaced while wiring the engine up. Once `set_env` succeeds,
/// `act` is total.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("environment has no agents")]
    NoAgents,

    #[error("worker pool construction failed: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Multi-agent MCTS planner. Configure with [`set_config`], attach an
/// environment with [`set_env`], then call [`act`] once per timestep until
/// the environment reports `all_done`.
///
/// [`set_config`]: MonteCarloTreeSearch::set_config
/// [`set_env`]: MonteCarloTreeSearch::set_env
/// [`act`]: MonteCarloTreeSearch::act
pub struct MonteCarloTreeSearch {
    cfg: Config,
    /// Environment replicas; slot 0 is the primary.
    envs: Vec<Environment>,
    /// Search trees; index 0 is the primary, the rest exist only in
    /// tree-parallel mode.
    trees: Vec<Tree>,
    /// Current root of each tree; advances one level per committed action.
    roots: Vec<NodeId>,
    oracle: Option<DistanceOracle>,
    pool: Option<ThreadPool>,
}

impl Default for MonteCarloTreeSearch {
    fn default() -> Self {
        Self {
            cfg: Config::default(),
            envs: Vec::new(),
            trees: Vec::new(),
            roots: Vec::new(),
            oracle: None,
            pool: None,
        }
    }
}

impl MonteCarloTreeSearch {
    /// Install a configuration. Call before [`set_env`]; the replica and
    /// worker pools are sized from it.
    ///
    /// [`set_env`]: MonteCarloTreeSearch::set_env
    pub fn set_config(&mut self, cfg: Config) {
        assert!(
            cfg.num_actions >= 1 && cfg.num_actions <= Move::COUNT,
            "num_actions must lie within the five-move alphabet"
        );
        assert!(cfg.gamma > 0.0 && cfg.gamma <= 1.0, "gamma must lie in (0, 1]");
        self.cfg = cfg;
    }

    /// Snapshot `env` into the replica pool, materialize the search trees
    /// and, when the heuristic is enabled, precompute the BFS oracle.
    pub fn set_env(&mut self, env: Environment) -> Result<(), SearchError> {
        if env.num_agents() == 0 {
            return Err(SearchError::NoAgents);
        }
        let slots = self.cfg.num_slots();
        let replicas: Vec<Environment> =
            (1..slots).map(|slot| env.replica(slot as u64)).collect();
        self.envs = std::iter::once(env).chain(replicas).collect();

        let num_trees = self.cfg.num_parallel_trees.max(1);
        self.trees = (0..num_trees).map(|_| Tree::new(self.cfg.num_actions)).collect();
        self.roots = vec![Tree::ROOT; num_trees];

        self.oracle = (self.cfg.heuristic_coef > 0.0)
            .then(|| DistanceOracle::compute(&self.envs[0]));

        self.pool = if slots > 1 {
            Some(ThreadPoolBuilder::new().num_threads(slots).build()?)
        } else {
            None
        };
        Ok(())
    }

    /// The primary environment replica. Panics before `set_env`.
    pub fn env(&self) -> &Environment {
        self.envs.first().expect("set_env has not been called")
    }

    /// The installed configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Plan and commit one joint action. For each agent in index order the
    /// configured decision mode runs `num_expansions` simulations, the
    /// most-visited child is committed and every tree root advances; the
    /// full joint action is then applied to every replica and returned.
    ///
    /// Agents already at their goals are committed to stay.
    pub fn act(&mut self) -> Vec<Move> {
        if self.envs.is_empty() {
            return Vec::new();
        }
        let n = self.envs[0].num_agents();
        if self.envs[0].all_done() {
            return vec![Move::Stay; n];
        }
        let mut pending: Vec<Move> = Vec::with_capacity(n);
        for agent in 0..n {
            if !self.envs[0].reached_goal(agent) {
                if self.cfg.batch_size > 1 {
                    self.batch_loop(&pending);
                } else if self.cfg.num_parallel_trees > 1 {
                    self.tree_parallel_loop(&pending);
                } else {
                    self.sequential_loop(&pending);
                }
            }
            if self.cfg.render {
                self.render_stats(agent);
            }
            let action = self.trees[0]
                .pick_most_visited(self.roots[0])
                .unwrap_or(Move::Stay.index());
            let next_agent = (agent + 1) % n;
            for t in 0..self.trees.len() {
                self.roots[t] = match self.trees[t].child(self.roots[t], action) {
                    Some(child) => child,
                    None => self.trees[t].alloc(
                        self.roots[t],
                        action,
                        0.0,
                        self.cfg.num_actions,
                        next_agent,
                    ),
                };
            }
            pending.push(Move::ALL[action]);
        }
        for env in &mut self.envs {
            env.step(&pending);
        }
        if self.cfg.render {
            let glyphs: String = pending.iter().map(|m| m.glyph()).collect();
            info!(actions = %glyphs, "committed joint action");
            info!("grid after step:\n{}", self.envs[0].render());
        }
        pending
    }

    fn sequential_loop(&mut self, pending: &[Move]) {
        let Self { cfg, envs, trees, roots, oracle, pool } = self;
        let cfg: &Config = cfg;
        let tree = &mut trees[0];
        let env = &mut envs[0];
        let root = roots[0];
        let oracle = oracle.as_ref();
        let run = |tree: &mut Tree, env: &mut Environment| {
            for _ in 0..cfg.num_expansions {
                let score = selection(tree, root, pending.to_vec(), env, oracle, cfg);
                tree.update_value(root, score);
            }
        };
        match pool.as_ref() {
            // Parallel leaf rollouts need the worker pool in scope.
            Some(pool) if cfg.multi_simulations > 1 => pool.install(|| run(tree, env)),
            _ => run(tree, env),
        }
    }

    /// Root parallelization: every tree runs the sequential loop against
    /// its own environment slot, then auxiliary statistics merge into the
    /// primary tree and means are refreshed.
    fn tree_parallel_loop(&mut self, pending: &[Move]) {
        let Self { cfg, envs, trees, roots, oracle, pool } = self;
        let cfg: &Config = cfg;
        let oracle = oracle.as_ref();
        let roots_now: Vec<NodeId> = roots.clone();
        let run = |(i, (tree, env)): (usize, (&mut Tree, &mut Environment))| -> bool {
            let root = roots_now[i];
            let baseline = env.history_len();
            let ok = catch_unwind(AssertUnwindSafe(|| {
                for _ in 0..cfg.num_expansions {
                    let score = selection(tree, root, pending.to_vec(), env, oracle, cfg);
                    tree.update_value(root, score);
                }
            }))
            .is_ok();
            if !ok {
                // Rewind whatever the faulted descent left behind so the
                // slot stays usable.
                while env.history_len() > baseline {
                    env.step_back();
                }
            }
            ok
        };
        let results: Vec<bool> = match pool.as_ref() {
            Some(pool) => pool.install(|| {
                trees
                    .par_iter_mut()
                    .zip(envs.par_iter_mut())
                    .enumerate()
                    .map(run)
                    .collect()
            }),
            None => trees.iter_mut().zip(envs.iter_mut()).enumerate().map(run).collect(),
        };
        if !results[0] {
            warn!("primary tree worker panicked; its statistics may be partial");
        }
        for i in 1..trees.len() {
            if !results[i] {
                warn!(tree = i, "tree worker panicked; skipping merge");
                continue;
            }
            let (primary, rest) = trees.split_at_mut(1);
            primary[0].absorb(roots_now[0], &rest[i - 1], roots_now[i]);
        }
        trees[0].recompute_mean(roots_now[0]);
    }

    /// Batched selection with virtual loss: descend `batch_size` disjoint
    /// paths without touching real statistics, evaluate them concurrently
    /// on dedicated environment slots, then back up in submission order.
    fn batch_loop(&mut self, pending: &[Move]) {
        let Self { cfg, envs, trees, roots, pool, .. } = self;
        let cfg: &Config = cfg;
        let envs: &Vec<Environment> = envs;
        let n = envs[0].num_agents();
        let tree = &mut trees[0];
        let root = roots[0];
        let prefix: Vec<usize> = pending.iter().map(|m| m.index()).collect();
        for _ in 0..cfg.num_expansions {
            tree.zero_virtual(root);
            let mut paths: Vec<Vec<usize>> = Vec::new();
            for _ in 0..cfg.batch_size {
                if let Some(path) = batch_selection(tree, root, prefix.clone(), &envs[0], cfg)
                {
                    paths.push(path[prefix.len()..].to_vec());
                }
            }
            let evaluate = |(slot, suffix): (usize, &Vec<usize>)| -> Option<f64> {
                let mut env = envs[slot].clone();
                catch_unwind(AssertUnwindSafe(|| {
                    batch_evaluation(&mut env, pending, suffix, cfg)
                }))
                .ok()
            };
            let scores: Vec<Option<f64>> = match pool.as_ref() {
                Some(pool) => {
                    pool.install(|| paths.par_iter().enumerate().map(evaluate).collect())
                }
                None => paths.iter().enumerate().map(evaluate).collect(),
            };
            for (suffix, score) in paths.iter().zip(scores) {
                let Some(score) = score else {
                    warn!("batch worker panicked; dropping its path");
                    continue;
                };
                let mut node = root;
                for &action in &suffix[..suffix.len() - 1] {
                    node = tree.child(node, action).expect("batch path lost its child");
                }
                let last = suffix[suffix.len() - 1];
                match tree.child(node, last) {
                    None => {
                        let agent = tree.node(node).agent_id;
                        tree.alloc(node, last, score, cfg.num_actions, (agent + 1) % n);
                        tree.update_value_batch(node, score, cfg.gamma);
                    }
                    Some(child) => tree.update_value_batch(child, score, cfg.gamma),
                }
            }
        }
    }

    /// Per-agent diagnostics: root mean, per-action visit counts and UCT
    /// scores.
    fn render_stats(&self, agent: usize) {
        let tree = &self.trees[0];
        let root = self.roots[0];
        let mut visits = String::new();
        let mut scores = String::new();
        for (action, mv) in Move::ALL[..self.cfg.num_actions].iter().enumerate() {
            match tree.child(root, action) {
                Some(child) => {
                    visits.push_str(&format!("{}:{} ", mv.glyph(), tree.node(child).visit_count));
                    scores.push_str(&format!(
                        "{}:{:.3} ",
                        mv.glyph(),
                        uct(tree, root, child, agent, &self.envs[0], self.oracle.as_ref(), &self.cfg)
                    ));
                }
                None => {
                    visits.push_str(&format!("{}:0 ", mv.glyph()));
                    scores.push_str(&format!("{}:0.000 ", mv.glyph()));
                }
            }
        }
        info!(
            agent,
            mean_value = tree.node(root).mean_value,
            visits = %visits.trim_end(),
            uct = %scores.trim_end(),
            "agent decision statistics"
        );
    }
}

/// One selection-expansion-rollout-backup descent. Returns the node's
/// score discounted once for the caller's level.
///
/// `pending` holds the actions already chosen for earlier agents of the
/// current joint step; once it fills, the joint action is committed to the
/// environment, the subtree below continues with the next joint step, and
/// the step is reverted on the way back up.
fn selection(
    tree: &mut Tree,
    node: NodeId,
    mut pending: Vec<Move>,
    env: &mut Environment,
    oracle: Option<&DistanceOracle>,
    cfg: &Config,
) -> f64 {
    let n = env.num_agents();
    let agent = pending.len() % n;
    let next_agent = (agent + 1) % n;
    let mut action = Move::Stay.index();
    if !env.reached_goal(agent) {
        action = expand_action(tree, node, agent, env, oracle, cfg);
    }
    let score;
    if pending.len() == n {
        let reward = env.step(&pending);
        if env.all_done() {
            score = reward;
        } else {
            match tree.child(node, action) {
                None => {
                    score = reward + cfg.gamma * rollout(env, cfg);
                    tree.alloc(node, action, score, cfg.num_actions, next_agent);
                }
                Some(child) => {
                    score = reward
                        + cfg.gamma
                            * selection(tree, child, vec![Move::ALL[action]], env, oracle, cfg);
                }
            }
        }
        tree.update_value(node, score);
        env.step_back();
    } else {
        let child = match tree.child(node, action) {
            Some(child) => child,
            None => tree.alloc(node, action, 0.0, cfg.num_actions, next_agent),
        };
        pending.push(Move::ALL[action]);
        score = selection(tree, child, pending, env, oracle, cfg);
        tree.update_value(node, score);
    }
    score * cfg.gamma
}

/// UCT expansion scan: the first legal empty child wins outright,
/// otherwise the legal child with the highest UCT score. Falls back to
/// stay when nothing qualifies.
fn expand_action(
    tree: &Tree,
    node: NodeId,
    agent: usize,
    env: &Environment,
    oracle: Option<&DistanceOracle>,
    cfg: &Config,
) -> usize {
    let mut best_action = Move::Stay.index();
    let mut best_score = -1.0;
    for (action, mv) in Move::ALL[..cfg.num_actions].iter().enumerate() {
        if cfg.use_move_limits && !env.check_action(agent, *mv, cfg.agents_as_obstacles) {
            continue;
        }
        match tree.child(node, action) {
            None => return action,
            Some(child) => {
                let score = uct(tree, node, child, agent, env, oracle, cfg);
                if score > best_score {
                    best_action = action;
                    best_score = score;
                }
            }
        }
    }
    best_action
}

/// UCT score of `child` under `parent`, with the optional goal-distance
/// bias fading as the child accumulates visits.
fn uct(
    tree: &Tree,
    parent: NodeId,
    child: NodeId,
    agent: usize,
    env: &Environment,
    oracle: Option<&DistanceOracle>,
    cfg: &Config,
) -> f64 {
    let node = tree.node(child);
    let visits = node.visit_count as f64;
    let mut score = node.mean_value;
    if let (Some(oracle), Some(action)) = (oracle, node.action_id) {
        let dest = Move::ALL[action].apply(env.positions()[agent]);
        score -= cfg.heuristic_coef * oracle.distance(agent, dest) as f64 / visits;
    }
    score
        + cfg.uct_c * (2.0 * (tree.node(parent).visit_count as f64).ln() / visits).sqrt()
}

/// Virtual-loss variant of the UCT score used while collecting a batch.
fn batch_uct(tree: &Tree, parent: NodeId, child: NodeId, cfg: &Config) -> f64 {
    let node = tree.node(child);
    let adjusted = node.adjusted_count() as f64;
    node.total_value / adjusted
        + cfg.uct_c
            * (2.0 * (tree.node(parent).adjusted_count() as f64).ln() / adjusted).sqrt()
}

/// Batch counterpart of [`expand_action`]: empty children already claimed
/// by this batch are skipped, and `None` signals that no expandable action
/// remains so the descent must be discarded.
fn batch_action(
    tree: &Tree,
    node: NodeId,
    agent: usize,
    env: &Environment,
    cfg: &Config,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_score = -1.0;
    for (action, mv) in Move::ALL[..cfg.num_actions].iter().enumerate() {
        if cfg.use_move_limits && !env.check_action(agent, *mv, cfg.agents_as_obstacles) {
            continue;
        }
        match tree.child(node, action) {
            None => {
                if !tree.node(node).picked(action) {
                    return Some(action);
                }
            }
            Some(child) => {
                let score = batch_uct(tree, node, child, cfg);
                if score > best_score {
                    best = Some(action);
                    best_score = score;
                }
            }
        }
    }
    best
}

/// Descend once for the current batch without touching real statistics,
/// claiming the expansion site and raising virtual counts along the path.
/// Returns the action path from the root, or `None` for a dead end.
fn batch_selection(
    tree: &mut Tree,
    node: NodeId,
    mut path: Vec<usize>,
    env: &Environment,
    cfg: &Config,
) -> Option<Vec<usize>> {
    let n = env.num_agents();
    let agent = path.len() % n;
    let action = if env.reached_goal(agent) {
        Some(Move::Stay.index())
    } else {
        batch_action(tree, node, agent, env, cfg)
    };
    let action = action?;
    path.push(action);
    match tree.child(node, action) {
        None => {
            tree.mark_picked(node, action);
            tree.bump_virtual(node);
            Some(path)
        }
        Some(child) => {
            let result = batch_selection(tree, child, path, env, cfg);
            tree.bump_virtual(node);
            result
        }
    }
}

/// Worker side of a batch: replay the pending prefix plus the selected
/// path suffix on a dedicated environment, then roll out from the reached
/// state. Rewards and the rollout are discounted per completed joint step.
fn batch_evaluation(
    env: &mut Environment,
    pending: &[Move],
    suffix: &[usize],
    cfg: &Config,
) -> f64 {
    let n = env.num_agents();
    let mut score = 0.0;
    let mut discount = 1.0;
    let mut queue: Vec<Move> = pending.to_vec();
    if queue.len() == n {
        score += discount * env.step(&queue);
        discount *= cfg.gamma;
        queue.clear();
    }
    for &action in suffix {
        queue.push(Move::ALL[action]);
        if queue.len() == n {
            score += discount * env.step(&queue);
            discount *= cfg.gamma;
            queue.clear();
        }
    }
    score + discount * rollout(env, cfg)
}

/// Leaf evaluation. A single rollout runs in place and rewinds itself;
/// with `multi_simulations > 1` independent rollouts run on clones across
/// the worker pool and the surviving scores are averaged.
fn rollout(env: &mut Environment, cfg: &Config) -> f64 {
    if cfg.multi_simulations > 1 {
        let snapshot: &Environment = env;
        let scores: Vec<f64> = (0..cfg.multi_simulations)
            .into_par_iter()
            .filter_map(|_| {
                let mut replica = snapshot.clone();
                catch_unwind(AssertUnwindSafe(move || single_rollout(&mut replica, cfg)))
                    .map_err(|_| warn!("rollout worker panicked; dropping its score"))
                    .ok()
            })
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    } else {
        single_rollout(env, cfg)
    }
}

/// Random playout of legal joint actions until every agent is done or the
/// horizon runs out, accumulating per-timestep discounted reward. The
/// history is rewound so the environment leaves exactly as it entered.
fn single_rollout(env: &mut Environment, cfg: &Config) -> f64 {
    env.reset_seed();
    let mut score = 0.0;
    let mut discount = 1.0;
    let mut steps = 0;
    while !env.all_done() && steps < cfg.steps_limit {
        let actions =
            env.sample_actions(cfg.num_actions, cfg.use_move_limits, cfg.agents_as_obstacles);
        let reward = env.step(&actions);
        steps += 1;
        score += reward * discount;
        discount *= cfg.gamma;
    }
    for _ in 0..steps {
        env.step_back();
    }
    score
}
