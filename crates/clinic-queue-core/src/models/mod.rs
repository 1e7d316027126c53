//! Domain models for the clinic queue.

mod actor;
mod clinic;
mod history;
mod patient;
mod turn;

pub use actor::*;
pub use clinic::*;
pub use history::*;
pub use patient::*;
pub use turn::*;
