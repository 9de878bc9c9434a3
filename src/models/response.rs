//! Agent 回复
//!
//! 在网络边界把线上 JSON 解码为带显式 message_type 的结构；
//! payment_request_id 只在 message_type 为 PaymentRequest 时保留，下游无需按字段是否存在来猜类型。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 回复的消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Message,
    PaymentRequest,
    Error,
}

impl From<String> for MessageType {
    /// 兼容 payment_request / PAYMENT_REQUEST 两种写法；未知类型按普通消息处理
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "payment_request" => MessageType::PaymentRequest,
            "error" => MessageType::Error,
            _ => MessageType::Message,
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Message => "message",
            MessageType::PaymentRequest => "payment_request",
            MessageType::Error => "error",
        }
        .to_string()
    }
}

/// 回复方角色（assistant 视为 agent）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Agent,
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Agent
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        match r {
            Role::User => "user",
            Role::Agent => "agent",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub message: String,
    #[serde(default)]
    pub price_in_credits: f64,
}

/// 一条 Agent 回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireResponse")]
pub struct ConversationResponse {
    pub content: ResponseContent,
    /// 增强版文本，仅在 X-Ray 模式下展示
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_message: Option<String>,
    pub conversation_id: String,
    pub role: Role,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_changes: Option<Value>,
}

impl ConversationResponse {
    /// 普通 Agent 消息
    pub fn message(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            content: ResponseContent {
                message: text.into(),
                price_in_credits: 0.0,
            },
            enhanced_message: None,
            conversation_id: conversation_id.into(),
            role: Role::Agent,
            message_type: MessageType::Message,
            payment_request_id: None,
            is_approved: None,
            is_enabled: None,
            task_data: None,
            script_changes: None,
        }
    }

    /// 付款请求：带报价与 payment_request_id
    pub fn payment_request(
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        price_in_credits: f64,
        payment_request_id: impl Into<String>,
    ) -> Self {
        let mut resp = Self::message(conversation_id, text);
        resp.message_type = MessageType::PaymentRequest;
        resp.content.price_in_credits = price_in_credits;
        resp.payment_request_id = Some(payment_request_id.into());
        resp
    }

    /// 网络失败时合成的错误回复：role=agent、type=error、花费 0
    pub fn synthetic_error(reason: &str) -> Self {
        let mut resp = Self::message("error", format!("Error: {}", reason));
        resp.message_type = MessageType::Error;
        resp
    }

    pub fn with_enhanced_message(mut self, enhanced: impl Into<String>) -> Self {
        self.enhanced_message = Some(enhanced.into());
        self
    }

    /// 仅付款请求携带
    pub fn payment_request_id(&self) -> Option<&str> {
        self.payment_request_id.as_deref()
    }

    pub fn is_payment_request(&self) -> bool {
        self.message_type == MessageType::PaymentRequest
    }

    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Error
    }
}

/// 线上格式：字段宽松，转换时统一约束
#[derive(Deserialize)]
struct WireResponse {
    content: ResponseContent,
    #[serde(default)]
    enhanced_message: Option<String>,
    #[serde(default)]
    conversation_id: String,
    #[serde(default = "default_role")]
    role: Role,
    #[serde(default = "default_message_type")]
    message_type: MessageType,
    #[serde(default)]
    payment_request_id: Option<String>,
    #[serde(default)]
    is_approved: Option<bool>,
    #[serde(default)]
    is_enabled: Option<bool>,
    #[serde(default)]
    task_data: Option<Value>,
    #[serde(default)]
    script_changes: Option<Value>,
}

fn default_role() -> Role {
    Role::Agent
}

fn default_message_type() -> MessageType {
    MessageType::Message
}

impl From<WireResponse> for ConversationResponse {
    fn from(w: WireResponse) -> Self {
        let payment_request_id = if w.message_type == MessageType::PaymentRequest {
            w.payment_request_id.filter(|id| !id.is_empty())
        } else {
            if w.payment_request_id.is_some() {
                tracing::debug!(
                    message_type = ?w.message_type,
                    "dropping payment_request_id on non payment-request response"
                );
            }
            None
        };
        Self {
            content: w.content,
            enhanced_message: w.enhanced_message,
            conversation_id: w.conversation_id,
            role: w.role,
            message_type: w.message_type,
            payment_request_id,
            is_approved: w.is_approved,
            is_enabled: w.is_enabled,
            task_data: w.task_data,
            script_changes: w.script_changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_payment_request() {
        let resp: ConversationResponse = serde_json::from_value(json!({
            "content": {"message": "This costs 40 credits", "price_in_credits": 40},
            "conversation_id": "conv-1",
            "message_type": "PAYMENT_REQUEST",
            "role": "assistant",
            "payment_request_id": "po-9"
        }))
        .unwrap();
        assert!(resp.is_payment_request());
        assert_eq!(resp.role, Role::Agent);
        assert_eq!(resp.payment_request_id(), Some("po-9"));
        assert_eq!(resp.content.price_in_credits, 40.0);
    }

    #[test]
    fn test_payment_id_dropped_on_plain_message() {
        let resp: ConversationResponse = serde_json::from_value(json!({
            "content": {"message": "hi"},
            "conversation_id": "conv-1",
            "message_type": "agent_message",
            "role": "agent",
            "payment_request_id": "po-9"
        }))
        .unwrap();
        assert_eq!(resp.message_type, MessageType::Message);
        assert_eq!(resp.payment_request_id(), None);
    }

    #[test]
    fn test_synthetic_error_shape() {
        let resp = ConversationResponse::synthetic_error("connection refused");
        assert!(resp.is_error());
        assert_eq!(resp.role, Role::Agent);
        assert_eq!(resp.content.price_in_credits, 0.0);
        assert_eq!(resp.content.message, "Error: connection refused");
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["message_type"], json!("error"));
        assert!(v.get("payment_request_id").is_none());
    }
}
