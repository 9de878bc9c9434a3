//! 输入解析
//!
//! 每行输入转为一个 Command：以 / 开头的是指令，其余文本作为消息发送。

use crate::models::{ConversationContext, ElementKind, Environment};

/// 请求表单中可直接设置的寻址字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Root,
    Element,
    User,
    Conversation,
    /// 元素类型（movie / character / prop / set）
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 以当前表单发送消息
    Send(String),
    Set(Field, String),
    Context(ConversationContext),
    /// 无参数时显示当前环境
    Env(Option<Environment>),
    XRay,
    Save(String),
    Saved,
    Load(String),
    /// 列出某类可标记元素
    Tag(ElementKind),
    /// 从上次列出的候选中选第 n 个（从 1 开始）
    Pick(usize),
    Untag,
    Approve,
    Changes,
    Script,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  <text>                         send message with the current request form
  /set root|element|user|conv|type <value>
  /context movie | scene <id> | shot <id>
  /env [local|development|production]
  /xray                          toggle raw message display
  /save <name>  /saved  /load <name>
  /tag character|prop|set        list taggable elements
  /pick <n>  /untag              attach the n-th listed element / clear tags
  /approve                       approve the latest payment request
  /changes                       show pending script changes of the latest payment request
  /script                        view the script of the current element
  /show  /help  /quit";

fn required<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str, String> {
    arg.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("usage: {}", usage))
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Err("empty input".to_string());
    }
    if !line.starts_with('/') {
        return Ok(Command::Send(line.to_string()));
    }

    let mut parts = line[1..].splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().map(str::trim);

    match name.as_str() {
        "set" => {
            let rest = required(rest, "/set root|element|user|conv|type <value>")?;
            let (field, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: /set root|element|user|conv|type <value>".to_string())?;
            let field = match field.to_lowercase().as_str() {
                "root" => Field::Root,
                "element" => Field::Element,
                "user" => Field::User,
                "conv" | "conversation" => Field::Conversation,
                "type" => Field::Type,
                other => return Err(format!("unknown field: {}", other)),
            };
            Ok(Command::Set(field, value.trim().to_string()))
        }
        "context" => {
            let rest = required(rest, "/context movie | scene <id> | shot <id>")?;
            let mut it = rest.split_whitespace();
            let kind = it.next().unwrap_or("").to_lowercase();
            let id = it.next().unwrap_or("").to_string();
            match kind.as_str() {
                "movie" => Ok(Command::Context(ConversationContext::Movie)),
                "scene" if !id.is_empty() => Ok(Command::Context(ConversationContext::Scene { scene_id: id })),
                "shot" if !id.is_empty() => Ok(Command::Context(ConversationContext::Shot { shot_id: id })),
                "scene" | "shot" => Err(format!("usage: /context {} <id>", kind)),
                other => Err(format!("unknown context type: {}", other)),
            }
        }
        "env" => match rest.filter(|s| !s.is_empty()) {
            None => Ok(Command::Env(None)),
            Some(env) => env
                .parse::<Environment>()
                .map(|e| Command::Env(Some(e)))
                .map_err(|e| e.to_string()),
        },
        "xray" => Ok(Command::XRay),
        "save" => Ok(Command::Save(required(rest, "/save <name>")?.to_string())),
        "saved" => Ok(Command::Saved),
        "load" => Ok(Command::Load(required(rest, "/load <name>")?.to_string())),
        "tag" => required(rest, "/tag character|prop|set")?
            .parse::<ElementKind>()
            .map(Command::Tag)
            .map_err(|e| e.to_string()),
        "pick" => required(rest, "/pick <n>")?
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Pick)
            .ok_or_else(|| "usage: /pick <n> (n starts at 1)".to_string()),
        "untag" => Ok(Command::Untag),
        "approve" => Ok(Command::Approve),
        "changes" => Ok(Command::Changes),
        "script" => Ok(Command::Script),
        "show" => Ok(Command::Show),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: /{}", other)),
    }
}
