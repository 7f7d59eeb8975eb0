//! Grid, action model and instance descriptions for multi-agent planning.
//!
//! Provides the rectangular obstacle grid, the five-move action alphabet
//! with its kinematics, and a parser for plain-text planning instances.

mod action;
mod grid;
mod instance;

pub use action::{Coord, Move};
pub use grid::{Grid, Tile};
pub use instance::{AgentTask, Instance, InstanceError};
