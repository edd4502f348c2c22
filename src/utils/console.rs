//! 控制台转发
//!
//! 把渲染表面里的 console 输出转发到 tracing

use serde::Deserialize;
use tracing::{debug, error, info, trace, warn, Level};

/// 一条控制台输出
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ConsoleEntry {
    pub fn new(level: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            level: level.into(),
            args,
        }
    }

    /// 拼接后的消息文本
    pub fn message(&self) -> String {
        self.args.join(" ")
    }
}

/// console 方法名对应的日志级别，未知方法按 info 处理
pub fn level_for(method: &str) -> Level {
    match method {
        "error" | "assert" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// 转发一条控制台输出
pub fn forward(problem_id: u64, entry: &ConsoleEntry) {
    let message = entry.message();
    let level = level_for(&entry.level);
    if level == Level::ERROR {
        error!("[题目 ID#{}] 🖥️ {}", problem_id, message);
    } else if level == Level::WARN {
        warn!("[题目 ID#{}] 🖥️ {}", problem_id, message);
    } else if level == Level::DEBUG {
        debug!("[题目 ID#{}] 🖥️ {}", problem_id, message);
    } else if level == Level::TRACE {
        trace!("[题目 ID#{}] 🖥️ {}", problem_id, message);
    } else {
        info!("[题目 ID#{}] 🖥️ {}", problem_id, message);
    }
}
