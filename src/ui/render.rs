//! 文本渲染
//!
//! 对话条目按「时间 来源> 文本」输出；X-Ray 模式输出负载原始 JSON。
//! 付款请求额外提示可用的 /approve 与 /changes。

use crate::core::PendingChanges;
use crate::elements::TaggableElement;
use crate::memory::{ConversationMessage, Origin};

/// 非 X-Ray 模式下单条消息显示的最大字符数
const MAX_DISPLAY_CHARS: usize = 2000;

/// 对过长内容做折叠：保留前 N 字 + 省略提示
fn truncate_for_display(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= MAX_DISPLAY_CHARS {
        return content.to_string();
    }
    let head: String = chars.iter().take(MAX_DISPLAY_CHARS).collect();
    format!("{}\n... [{} chars total]", head, chars.len())
}

pub fn render_entry(entry: &ConversationMessage, x_ray: bool) -> String {
    let who = match entry.origin() {
        Origin::User => "you",
        Origin::Agent => "agent",
    };
    let text = entry.display_text(x_ray);
    let text = if x_ray { text } else { truncate_for_display(&text) };
    let mut out = format!(
        "[{}] {}> {}",
        entry.timestamp().with_timezone(&chrono::Local).format("%H:%M:%S"),
        who,
        text
    );
    if let Some(resp) = entry.response() {
        if let Some(id) = resp.payment_request_id() {
            out.push_str(&format!(
                "\n    payment request {} ({} credits): /approve or /changes",
                id, resp.content.price_in_credits
            ));
        }
    }
    out
}

pub fn render_candidates(candidates: &[TaggableElement]) -> String {
    if candidates.is_empty() {
        return "no taggable elements".to_string();
    }
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:>3}. {} ({})", i + 1, c.display_label, c.id))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_pending_changes(changes: &PendingChanges) -> String {
    match changes {
        PendingChanges::Unavailable => "We couldn't load the script changes".to_string(),
        PendingChanges::Pending => {
            "Agent will rewrite the script just after payment approval".to_string()
        }
        PendingChanges::Ready(value) => serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("<unprintable changes: {}>", e)),
    }
}
