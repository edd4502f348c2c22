/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;
use crate::orchestrator::BridgeStatus;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目渲染桥接");
    info!("🌐 后端地址: {}", config.api_base_url);
    info!(
        "📄 题目: {} (作业本: {:?}, 只读: {})",
        config.problem_id, config.workbook_id, config.readonly
    );
    info!(
        "⏱️ 提交节流 {}ms | 预览节流 {}ms | 按钮刷新 {}ms | 自动保存静默 {}ms",
        config.submit_throttle_ms,
        config.preview_throttle_ms,
        config.button_refresh_ms,
        config.autosave_quiet_ms
    );
    info!("{}", "=".repeat(60));
}

/// 打印会话结束时的状态
pub fn print_final_status(problem_id: u64, status: &BridgeStatus) {
    info!("\n{}", "=".repeat(60));
    info!("📊 会话结束 - 题目 {}", problem_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    match &status.last_submitted_at {
        Some(at) => info!("✅ 最后提交: {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => info!("✅ 最后提交: 无"),
    }
    match &status.last_saved_at {
        Some(at) => info!("💾 最后保存: {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => info!("💾 最后保存: 无"),
    }
    if let Some(error) = &status.error {
        info!("❌ 未处理的错误: {}", error);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
