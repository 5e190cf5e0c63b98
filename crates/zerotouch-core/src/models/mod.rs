pub mod agent;
pub mod definition;
pub mod task;
pub mod workflow;

pub use agent::*;
pub use definition::*;
pub use task::*;
pub use workflow::*;
