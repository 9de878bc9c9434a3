//! 外部协作方抽象
//!
//! 核心只通过这三个 trait 调用外部服务：Agent 对话后端、剧本服务、只读文档存储。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::BackendError;
use crate::models::{ConversationRequest, ConversationResponse, PaymentApprovalMessage, ScriptDocument};

/// Agent 对话后端：POST /agent/converse 与 POST /agent/approvePayment
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn converse(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, BackendError>;

    async fn approve_payment(
        &self,
        message: &PaymentApprovalMessage,
    ) -> Result<ConversationResponse, BackendError>;
}

/// 剧本服务：POST /movies/getScript
#[async_trait]
pub trait ScriptService: Send + Sync {
    async fn get_script(&self, movie_id: &str) -> Result<ScriptDocument, BackendError>;
}

/// 只读文档存储：按 id 点查；按集合查询 is_global == true 的条目
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 文档不存在时返回 Ok(None)
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError>;

    async fn query_global(&self, collection: &str) -> Result<Vec<Value>, BackendError>;
}

/// 目录条目是否标记为全局
pub fn is_global_entry(entry: &Value) -> bool {
    entry.get("is_global").and_then(Value::as_bool).unwrap_or(false)
}
