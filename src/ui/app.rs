//! 主循环：逐行读取标准输入，解析为指令并驱动测试台
//!
//! 当前请求表单保存在 App 中；每次发送或批准后打印新增的对话条目（按设置决定是否 X-Ray）。

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::core::{ApprovalContext, Harness, HarnessError};
use crate::elements::TaggableElement;
use crate::memory::SettingsStore;
use crate::models::{ConversationRequest, ElementKind};
use crate::ui::event::{parse_command, Command, Field, HELP};
use crate::ui::render::{render_candidates, render_entry, render_pending_changes};

/// 处理一条指令后是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    harness: Harness,
    form: ConversationRequest,
    candidates: Vec<TaggableElement>,
    /// 已打印的对话条目数
    printed: usize,
}

impl App {
    pub fn new(harness: Harness) -> Self {
        let defaults = &harness.config.request;
        let form = ConversationRequest::new(
            "",
            defaults.root_element_id.clone(),
            defaults.element_id.clone(),
            defaults.user_id.clone(),
        );
        Self {
            harness,
            form,
            candidates: Vec::new(),
            printed: 0,
        }
    }

    pub fn form(&self) -> &ConversationRequest {
        &self.form
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    fn settings(&self) -> &SettingsStore {
        &self.harness.settings
    }

    /// 处理一行输入，返回要输出的文本
    pub async fn handle_line(&mut self, line: &str) -> (Flow, Vec<String>) {
        if line.trim().is_empty() {
            return (Flow::Continue, Vec::new());
        }
        match parse_command(line) {
            Ok(command) => self.handle(command).await,
            Err(e) => (Flow::Continue, vec![e]),
        }
    }

    pub async fn handle(&mut self, command: Command) -> (Flow, Vec<String>) {
        let mut out = Vec::new();
        match command {
            Command::Send(text) => {
                self.form.message = text;
                match self.harness.orchestrator.send(self.form.clone()).await {
                    Ok(resp) => {
                        if !resp.is_error() && !resp.conversation_id.is_empty() {
                            self.form.conversation_id = Some(resp.conversation_id.clone());
                        }
                        self.form.tagged_elements.clear();
                    }
                    Err(e) => out.push(describe(&e)),
                }
                out.extend(self.drain_transcript().await);
            }
            Command::Set(field, value) => {
                match field {
                    Field::Root => self.form.root_element_id = value,
                    Field::Element => self.form.element_id = value,
                    Field::User => self.form.user_id = value,
                    Field::Conversation => self.form.conversation_id = Some(value),
                    Field::Type => match value.parse::<ElementKind>() {
                        Ok(kind) => self.form.element_type = kind,
                        Err(e) => out.push(describe(&e)),
                    },
                }
                if field == Field::Root {
                    self.candidates.clear();
                }
            }
            Command::Context(context) => self.form.context = context,
            Command::Env(None) => out.push(format!("environment: {}", self.settings().environment())),
            Command::Env(Some(env)) => {
                self.settings().set_environment(env);
                out.push(format!("environment: {}", env));
            }
            Command::XRay => {
                let enabled = self.settings().toggle_x_ray_mode();
                out.push(format!("x-ray {}", if enabled { "on" } else { "off" }));
            }
            Command::Save(name) => {
                self.settings().add_saved_request(self.form.clone(), name.clone());
                out.push(format!("saved request '{}'", name));
            }
            Command::Saved => {
                let saved = self.settings().saved_requests();
                if saved.is_empty() {
                    out.push("no saved requests".to_string());
                }
                for t in saved {
                    out.push(format!("{}: {}", t.name, t.request.message));
                }
            }
            Command::Load(name) => match self.settings().saved_request(&name) {
                Some(t) => {
                    self.form = t.request;
                    out.push(format!("loaded request '{}'", name));
                }
                None => out.push(describe(&HarnessError::UnknownSavedRequest(name))),
            },
            Command::Tag(kind) => {
                self.candidates = self
                    .harness
                    .resolver
                    .resolve(&self.form.root_element_id, kind)
                    .await;
                out.push(render_candidates(&self.candidates));
            }
            Command::Pick(n) => match n.checked_sub(1).and_then(|i| self.candidates.get(i)) {
                Some(c) => {
                    self.form.tag(c.to_tagged());
                    out.push(format!("tagged {}", c.display_label));
                }
                None => out.push(format!("no candidate #{}", n)),
            },
            Command::Untag => {
                self.form.tagged_elements.clear();
                out.push("tags cleared".to_string());
            }
            Command::Approve => match self.harness.orchestrator.last_payment_request().await {
                Some(resp) => {
                    let ctx = ApprovalContext::from_request(&self.form);
                    if let Err(e) = self.harness.orchestrator.approve(&resp, &ctx).await {
                        out.push(describe(&e));
                    }
                    out.extend(self.drain_transcript().await);
                }
                None => out.push("no payment request to approve".to_string()),
            },
            Command::Changes => {
                let pending = self.harness.orchestrator.last_payment_request().await;
                match pending.as_ref().and_then(|r| r.payment_request_id()) {
                    Some(id) => {
                        let changes = self.harness.orchestrator.fetch_pending_changes(id).await;
                        out.push(render_pending_changes(&changes));
                    }
                    None => out.push("no payment request".to_string()),
                }
            }
            Command::Script => {
                match self.harness.orchestrator.view_script(&self.form.element_id).await {
                    Ok(script) => out.push(
                        serde_json::to_string_pretty(script.as_value())
                            .unwrap_or_else(|e| format!("<unprintable script: {}>", e)),
                    ),
                    Err(e) => out.push(describe(&e)),
                }
            }
            Command::Show => out.push(
                serde_json::to_string_pretty(&self.form)
                    .unwrap_or_else(|e| format!("<unprintable request: {}>", e)),
            ),
            Command::Help => out.push(HELP.to_string()),
            Command::Quit => return (Flow::Quit, out),
        }
        (Flow::Continue, out)
    }

    /// 取出自上次打印以来新增的对话条目
    async fn drain_transcript(&mut self) -> Vec<String> {
        let x_ray = self.settings().x_ray_mode();
        let entries = self.harness.orchestrator.transcript().await;
        let lines = entries
            .iter()
            .skip(self.printed)
            .map(|e| render_entry(e, x_ray))
            .collect();
        self.printed = entries.len();
        lines
    }
}

fn describe(e: &HarnessError) -> String {
    format!("error: {}", e)
}

/// 运行命令行测试台，直到 /quit 或输入结束
pub async fn run_app(harness: Harness) -> Result<(), HarnessError> {
    let mut app = App::new(harness);
    let stdin = BufReader::new(tokio::io::stdin());
    run_loop(&mut app, stdin, tokio::io::stdout())
        .await
        .map_err(HarnessError::Terminal)?;

    app.settings().flush().await?;
    tracing::info!("harness exited");
    Ok(())
}

/// 逐行读入、处理并写出，读到结束或 /quit 时返回
async fn run_loop<R, W>(app: &mut App, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all(format!("environment: {} (type /help)\n", app.settings().environment()).as_bytes())
        .await?;
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let (flow, out) = app.handle_line(&line).await;
        for text in out {
            output.write_all(text.as_bytes()).await?;
            output.write_all(b"\n").await?;
        }
        if flow == Flow::Quit {
            break;
        }
    }
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::AppConfig;
    use crate::core::HarnessBuilder;
    use crate::models::{ConversationContext, ConversationResponse, ScriptDocument};
    use serde_json::json;
    use std::sync::Arc;

    fn app_with(mock: Arc<MockBackend>) -> App {
        let mut config = AppConfig::default();
        config.request.root_element_id = "movie-1".into();
        config.request.element_id = "movie-1".into();
        config.request.user_id = "user-1".into();
        let harness = HarnessBuilder::new(config)
            .with_settings(Arc::new(SettingsStore::in_memory()))
            .with_mock(mock)
            .build();
        App::new(harness)
    }

    #[tokio::test]
    async fn test_send_prints_both_entries() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let (flow, out) = app.handle_line("hello").await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("you> hello"));
        assert!(out[1].contains("agent> Echo from Mock: hello"));
        assert_eq!(app.form().conversation_id.as_deref(), Some("mock-conversation"));

        // 第二次只打印新增条目
        let (_, out) = app.handle_line("again").await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_user_reports_error() {
        let mock = Arc::new(MockBackend::new());
        let mut app = app_with(mock.clone());
        let (_, out) = app.handle_line("/set user").await;
        assert_eq!(out, vec!["usage: /set root|element|user|conv|type <value>".to_string()]);

        app.form.user_id.clear();
        let (_, out) = app.handle_line("hello").await;
        assert!(out[0].starts_with("error:"));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_tag_and_pick() {
        let mock = Arc::new(MockBackend::new().with_script(
            "movie-1",
            ScriptDocument::new(json!({"characters": [{"id": "c1", "name": "Ada"}]})),
        ));
        let mut app = app_with(mock);
        let (_, out) = app.handle_line("/tag character").await;
        assert_eq!(out, vec!["  1. local - Ada (c1)".to_string()]);

        let (_, out) = app.handle_line("/pick 1").await;
        assert_eq!(out, vec!["tagged local - Ada".to_string()]);
        assert_eq!(app.form().tagged_elements.len(), 1);
        assert_eq!(app.form().tagged_elements[0].id, "c1");

        let (_, out) = app.handle_line("/pick 3").await;
        assert_eq!(out, vec!["no candidate #3".to_string()]);
    }

    #[tokio::test]
    async fn test_approve_latest_payment_request() {
        let mock = Arc::new(MockBackend::new().with_response(ConversationResponse::payment_request(
            "c", "Costs 5", 5.0, "po-1",
        )));
        let mut app = app_with(mock.clone());

        let (_, out) = app.handle_line("/approve").await;
        assert_eq!(out, vec!["no payment request to approve".to_string()]);

        let (_, out) = app.handle_line("rewrite act two").await;
        assert!(out[1].contains("payment request po-1"));

        let (_, out) = app.handle_line("/approve").await;
        assert_eq!(out.len(), 2);
        assert_eq!(mock.approve_calls(), 1);
    }

    #[tokio::test]
    async fn test_save_and_load_request() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        app.handle_line("/context scene s-9").await;
        app.handle_line("/save scene-test").await;
        app.handle_line("/context movie").await;

        let (_, out) = app.handle_line("/load scene-test").await;
        assert_eq!(out, vec!["loaded request 'scene-test'".to_string()]);
        assert_eq!(
            app.form().context,
            ConversationContext::Scene { scene_id: "s-9".into() }
        );

        let (_, out) = app.handle_line("/load nope").await;
        assert!(out[0].starts_with("error:"));
    }

    #[tokio::test]
    async fn test_set_element_type() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let (_, out) = app.handle_line("/set type character").await;
        assert!(out.is_empty());
        assert_eq!(app.form().element_type, ElementKind::Character);
        let (_, out) = app.handle_line("/set type dragon").await;
        assert_eq!(out, vec!["error: Unknown element kind: dragon".to_string()]);
    }

    #[tokio::test]
    async fn test_script_uses_element_id() {
        let mock = Arc::new(
            MockBackend::new()
                .with_script("root-movie", ScriptDocument::new(json!({"which": "root"})))
                .with_script("leaf-movie", ScriptDocument::new(json!({"which": "element"}))),
        );
        let mut app = app_with(mock);
        app.handle_line("/set root root-movie").await;
        app.handle_line("/set element leaf-movie").await;

        let (_, out) = app.handle_line("/script").await;
        let shown: serde_json::Value = serde_json::from_str(&out[0]).unwrap();
        assert_eq!(shown, json!({"which": "element"}));

        app.form.element_id.clear();
        let (_, out) = app.handle_line("/script").await;
        assert_eq!(out, vec!["error: Missing required field: element_id".to_string()]);
    }

    #[tokio::test]
    async fn test_pick_zero_does_not_panic() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let (flow, out) = app.handle(Command::Pick(0)).await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(out, vec!["no candidate #0".to_string()]);
    }

    #[tokio::test]
    async fn test_run_loop_until_quit() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let mut output = Vec::new();
        run_loop(&mut app, &b"hello\n/quit\nignored\n"[..], &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("environment: local (type /help)"));
        assert!(text.contains("agent> Echo from Mock: hello"));
        assert!(!text.contains("ignored"));
        assert_eq!(app.harness().orchestrator.transcript_len().await, 2);
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let (flow, _) = app.handle_line("/quit").await;
        assert_eq!(flow, Flow::Quit);
    }
}
