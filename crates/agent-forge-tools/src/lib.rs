//! Tools exposed to the model during agent runs.
//!
//! [`declarations`] turns an agent's configured tools into the function-calling
//! schema the completion API expects. Execution is simulated: each
//! [`SimulatedTool`] fabricates a plausible result so the two-phase run can be
//! exercised without any real search backend.

pub mod declarations;
pub mod file_search;
pub mod simulator;
pub mod web_search;

pub use declarations::build_declarations;
pub use simulator::{SimulatedTool, ToolSimulator, parse_arguments_lenient};
