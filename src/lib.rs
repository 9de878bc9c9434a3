//! Wonder Harness - 剧本编辑 Agent 对话测试台
//!
//! 模块划分：
//! - **backend**: 协作方抽象（Agent 后端 / 剧本服务 / 文档存储）与 HTTP、Mock 实现
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 对话编排、运行状态、错误类型、组件装配
//! - **elements**: 元素数据源适配器与可标记元素解析器
//! - **memory**: 对话记录、剧本缓存、持久化设置
//! - **models**: 请求 / 回复 / 审批 / 剧本等数据结构
//! - **ui**: 命令行测试台

pub mod backend;
pub mod config;
pub mod core;
pub mod elements;
pub mod memory;
pub mod models;
pub mod ui;

pub use crate::core::{create_harness, Harness, HarnessBuilder, HarnessError};
