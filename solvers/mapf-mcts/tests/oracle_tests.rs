//! Tests for the goal-sourced BFS distance fields.

use mapf_grid::{Coord, Move};
use mapf_mcts::{DistanceOracle, Environment, UNREACHABLE};
use pretty_assertions::assert_eq;

fn manhattan(a: Coord, b: Coord) -> u32 {
    ((a.row - b.row).unsigned_abs()) + ((a.col - b.col).unsigned_abs())
}

#[test]
fn empty_grid_distances_equal_manhattan() {
    let mut env = Environment::new();
    env.create_grid(5, 5);
    env.add_agent(0, 0, 2, 3);
    env.add_agent(4, 4, 0, 0);
    let oracle = DistanceOracle::compute(&env);
    for (agent, goal) in env.goals().iter().enumerate() {
        for row in 0..5 {
            for col in 0..5 {
                let cell = Coord::new(row, col);
                assert_eq!(
                    oracle.distance(agent, cell),
                    manhattan(cell, *goal),
                    "agent {agent} cell ({row},{col})"
                );
            }
        }
    }
}

#[test]
fn goal_distance_is_zero_and_neighbors_differ_by_at_most_one() {
    let mut env = Environment::new();
    env.create_grid(4, 6);
    env.add_obstacle(1, 1);
    env.add_obstacle(1, 2);
    env.add_obstacle(2, 2);
    env.add_agent(0, 0, 3, 5);
    let oracle = DistanceOracle::compute(&env);
    assert_eq!(oracle.distance(0, Coord::new(3, 5)), 0);
    for row in 0..4 {
        for col in 0..6 {
            let cell = Coord::new(row, col);
            if !env.grid().is_traversable(cell) || oracle.distance(0, cell) == UNREACHABLE {
                continue;
            }
            for mv in &Move::ALL[1..] {
                let neighbor = mv.apply(cell);
                if !env.grid().is_traversable(neighbor)
                    || oracle.distance(0, neighbor) == UNREACHABLE
                {
                    continue;
                }
                assert!(
                    oracle.distance(0, cell) <= oracle.distance(0, neighbor) + 1,
                    "triangle inequality at ({row},{col})"
                );
            }
        }
    }
}

#[test]
fn walled_off_cells_are_unreachable() {
    // 3x3 grid with the middle row fully blocked.
    let mut env = Environment::new();
    env.create_grid(3, 3);
    for col in 0..3 {
        env.add_obstacle(1, col);
    }
    env.add_agent(0, 0, 2, 2);
    let oracle = DistanceOracle::compute(&env);
    assert_eq!(oracle.distance(0, Coord::new(2, 2)), 0);
    assert_eq!(oracle.distance(0, Coord::new(2, 0)), 2);
    for col in 0..3 {
        assert_eq!(oracle.distance(0, Coord::new(0, col)), UNREACHABLE);
        assert_eq!(oracle.distance(0, Coord::new(1, col)), UNREACHABLE);
    }
}

#[test]
fn detour_around_obstacle_is_longer_than_manhattan() {
    // 3x3 grid with a wall below the goal row:
    //  G . .
    //  # # .
    //  . . .
    let mut env = Environment::new();
    env.create_grid(3, 3);
    env.add_obstacle(1, 0);
    env.add_obstacle(1, 1);
    env.add_agent(2, 0, 0, 0);
    let oracle = DistanceOracle::compute(&env);
    assert_eq!(oracle.distance(0, Coord::new(2, 0)), 6);
    assert_eq!(oracle.distance(0, Coord::new(1, 2)), 3);
}

#[test]
fn off_grid_and_unknown_agents_report_unreachable() {
    let mut env = Environment::new();
    env.create_grid(2, 2);
    env.add_agent(0, 0, 1, 1);
    let oracle = DistanceOracle::compute(&env);
    assert_eq!(oracle.distance(0, Coord::new(-1, 0)), UNREACHABLE);
    assert_eq!(oracle.distance(0, Coord::new(0, 2)), UNREACHABLE);
    assert_eq!(oracle.distance(7, Coord::new(0, 0)), UNREACHABLE);
}
