//! 会话内状态：对话记录、剧本缓存、持久化设置

pub mod script_cache;
pub mod settings;
pub mod transcript;

pub use script_cache::ScriptCache;
pub use settings::{SettingsState, SettingsStore, SETTINGS_SCHEMA_VERSION};
pub use transcript::{ConversationMessage, Origin, Payload, Transcript};
