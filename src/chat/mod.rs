// Chat module
// Widget protocol, conversation store, agents and the agent runtime

pub mod agents;
pub mod openai_types;
pub mod protocol;
pub mod runtime;
pub mod server;
pub mod store;

pub use agents::{AgentCatalog, AgentDefinition, AgentTool};
pub use runtime::{AgentRuntime, OpenAiRuntime, RuntimeError};
pub use server::{ChatServer, ProcessResult, RequestContext};
pub use store::{MemoryStore, StoreError};
