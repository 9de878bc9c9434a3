//! 付款审批消息

use serde::{Deserialize, Serialize};

/// 用户批准一次付款请求时发送的消息；只发一次，不自动重试
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApprovalMessage {
    pub conversation_id: String,
    #[serde(rename = "root_movie_id", alias = "root_element_id")]
    pub root_element_id: String,
    pub payment_request_id: String,
    pub is_approved: bool,
    pub user_id: String,
}

impl PaymentApprovalMessage {
    pub fn approve(
        conversation_id: impl Into<String>,
        root_element_id: impl Into<String>,
        payment_request_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            root_element_id: root_element_id.into(),
            payment_request_id: payment_request_id.into(),
            is_approved: true,
            user_id: user_id.into(),
        }
    }
}
