//! Wonder Harness 入口：初始化日志、装配测试台并运行命令行主循环。

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wonder_harness::{create_harness, ui::run_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖；写到 stderr，不与对话输出混在一起
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let harness = create_harness(config_path).context("Failed to create harness")?;

    run_app(harness).await.context("App run failed")?;

    Ok(())
}
