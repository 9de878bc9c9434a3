//! 命令行层：主循环（app）、指令解析（event）、文本渲染（render）

pub mod app;
pub mod event;
pub mod render;

pub use app::{run_app, App, Flow};
pub use event::{parse_command, Command, Field};
pub use render::{render_candidates, render_entry, render_pending_changes};
