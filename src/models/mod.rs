//! 数据模型：请求、回复、审批消息、元素、剧本文档、环境

pub mod approval;
pub mod element;
pub mod environment;
pub mod request;
pub mod response;
pub mod script;

pub use approval::PaymentApprovalMessage;
pub use element::{ElementKind, ElementRef, TaggedElement};
pub use environment::Environment;
pub use request::{ConversationContext, ConversationRequest, SavedRequestTemplate};
pub use response::{ConversationResponse, MessageType, ResponseContent, Role};
pub use script::ScriptDocument;
