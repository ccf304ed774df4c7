//! Model structure, parameters and trajectories.

pub mod network;
pub mod node;
pub mod parameters;
pub mod trajectory;

pub use network::CtbnModel;
pub use node::{Node, NodeKind};
pub use parameters::{IntensityMatrix, NodeParameters, TABLE_TOLERANCE};
pub use trajectory::{Event, Trajectory};
