//! 外部服务层：协作方 trait 与实现（HTTP / Mock）

pub mod http;
pub mod mock;
pub mod traits;

pub use http::{HttpBackend, HttpDocumentStore};
pub use mock::{MockBackend, MOCK_CONVERSATION_ID};
pub use traits::{is_global_entry, AgentBackend, DocumentStore, ScriptService};
