mod command;
mod tick;

pub use command::{CommandBuffer, INPUT_SEQUENCE_WINDOW, InputRejection, validate_command};
pub use tick::{FixedTimestep, SimulationLoop, SimulationState, TickOutcome};
