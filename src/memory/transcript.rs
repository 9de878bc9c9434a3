//! 对话记录（transcript）
//!
//! 只追加、不修改：每次发送 / 接收都生成一条不可变的 ConversationMessage。
//! 负载类型由来源决定：用户条目携带请求或审批消息，Agent 条目携带回复。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConversationRequest, ConversationResponse, PaymentApprovalMessage};

/// 条目来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Agent,
}

/// 条目负载（显式标签联合）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Request(ConversationRequest),
    Response(ConversationResponse),
    Approval(PaymentApprovalMessage),
}

/// 对话中的一轮
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    id: Uuid,
    origin: Origin,
    timestamp: DateTime<Utc>,
    payload: Payload,
}

impl ConversationMessage {
    fn new(origin: Origin, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn user_request(request: ConversationRequest) -> Self {
        Self::new(Origin::User, Payload::Request(request))
    }

    pub fn user_approval(message: PaymentApprovalMessage) -> Self {
        Self::new(Origin::User, Payload::Approval(message))
    }

    pub fn agent_response(response: ConversationResponse) -> Self {
        Self::new(Origin::Agent, Payload::Response(response))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn response(&self) -> Option<&ConversationResponse> {
        match &self.payload {
            Payload::Response(r) => Some(r),
            _ => None,
        }
    }

    /// 展示文本：普通模式给出叙述文本，X-Ray 模式给出消息本身的完整 JSON（不含 kind/data 外壳）
    pub fn display_text(&self, x_ray: bool) -> String {
        if x_ray {
            let raw = match &self.payload {
                Payload::Request(r) => serde_json::to_string_pretty(r),
                Payload::Response(r) => serde_json::to_string_pretty(r),
                Payload::Approval(a) => serde_json::to_string_pretty(a),
            };
            return raw.unwrap_or_else(|e| format!("<unserializable payload: {}>", e));
        }
        match &self.payload {
            Payload::Request(r) => r.message.clone(),
            Payload::Response(r) => r.content.message.clone(),
            Payload::Approval(a) => format!("Approved payment request {}", a.payment_request_id),
        }
    }
}

/// 只追加的对话记录
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<ConversationMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ConversationMessage) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationMessage] {
        &self.entries
    }

    /// 最近一条仍可审批的付款请求
    pub fn last_payment_request(&self) -> Option<&ConversationResponse> {
        self.entries
            .iter()
            .rev()
            .filter_map(ConversationMessage::response)
            .find(|r| r.is_payment_request())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_matches_payload() {
        let user = ConversationMessage::user_request(ConversationRequest::new("hi", "m", "m", "u"));
        assert_eq!(user.origin(), Origin::User);
        let agent = ConversationMessage::agent_response(ConversationResponse::message("c", "hello"));
        assert_eq!(agent.origin(), Origin::Agent);
        assert_ne!(user.id(), agent.id());
    }

    #[test]
    fn test_display_text_xray() {
        let entry = ConversationMessage::agent_response(
            ConversationResponse::message("c", "plain").with_enhanced_message("fancy"),
        );
        assert_eq!(entry.display_text(false), "plain");
        let raw = entry.display_text(true);
        assert!(raw.contains("\"enhanced_message\": \"fancy\""));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["content"]["message"], "plain");
        assert!(value.get("kind").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_last_payment_request() {
        let mut t = Transcript::new();
        assert!(t.last_payment_request().is_none());
        t.push(ConversationMessage::agent_response(ConversationResponse::payment_request(
            "c", "pay?", 10.0, "po-1",
        )));
        t.push(ConversationMessage::agent_response(ConversationResponse::message("c", "ok")));
        assert_eq!(
            t.last_payment_request().and_then(|r| r.payment_request_id()),
            Some("po-1")
        );
        assert_eq!(t.len(), 2);
    }
}
