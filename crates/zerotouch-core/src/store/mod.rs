pub mod agent_state_store;
pub mod workflow_store;

pub use agent_state_store::AgentStateStore;
pub use workflow_store::WorkflowStore;
