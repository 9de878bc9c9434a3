//! 编排器阶段：Idle -> Sending -> Idle（成功或失败都回到 Idle）
//!
//! 通过 watch 通道投影给界面，用于锁定发送按钮、显示加载气泡。

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum OrchestratorPhase {
    #[default]
    Idle,
    /// 至少有一个 send / approve 在途
    Sending,
}
