use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端 API 根地址
    pub api_base_url: String,
    /// 会话 Cookie（可选）
    pub session_cookie: Option<String>,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否启动无头浏览器（否则连接已打开的浏览器）
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 承载渲染表面的页面
    pub target_url: String,
    // --- 题目 ---
    pub problem_id: u64,
    pub workbook_id: Option<u64>,
    pub readonly: bool,
    /// 已有成绩记录ID，用于自动保存
    pub grade_id: Option<u64>,
    // --- 表单 ---
    /// 触发评分的提交按钮名称
    pub final_answer_action: String,
    /// 已提交状态下按钮显示的占位文字
    pub submitted_label: String,
    // --- 时间策略（毫秒） ---
    pub submit_throttle_ms: u64,
    pub preview_throttle_ms: u64,
    pub button_refresh_ms: u64,
    pub autosave_quiet_ms: u64,
    pub applet_update_debounce_ms: u64,
    pub event_poll_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/backend-api".to_string(),
            session_cookie: None,
            browser_debug_port: 9222,
            headless: false,
            chrome_executable: None,
            target_url: "about:blank".to_string(),
            problem_id: 0,
            workbook_id: None,
            readonly: false,
            grade_id: None,
            final_answer_action: "submitAnswers".to_string(),
            submitted_label: "Submitted".to_string(),
            submit_throttle_ms: 2000,
            preview_throttle_ms: 500,
            button_refresh_ms: 1000,
            autosave_quiet_ms: 2000,
            applet_update_debounce_ms: 2000,
            event_poll_ms: 100,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            session_cookie: std::env::var("SESSION_COOKIE").ok().or(default.session_cookie),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            problem_id: env_parse("PROBLEM_ID").unwrap_or(default.problem_id),
            workbook_id: env_parse("WORKBOOK_ID").or(default.workbook_id),
            readonly: env_parse("READONLY").unwrap_or(default.readonly),
            grade_id: env_parse("GRADE_ID").or(default.grade_id),
            final_answer_action: std::env::var("FINAL_ANSWER_ACTION").unwrap_or(default.final_answer_action),
            submitted_label: std::env::var("SUBMITTED_LABEL").unwrap_or(default.submitted_label),
            submit_throttle_ms: env_parse("SUBMIT_THROTTLE_MS").unwrap_or(default.submit_throttle_ms),
            preview_throttle_ms: env_parse("PREVIEW_THROTTLE_MS").unwrap_or(default.preview_throttle_ms),
            button_refresh_ms: env_parse("BUTTON_REFRESH_MS").unwrap_or(default.button_refresh_ms),
            autosave_quiet_ms: env_parse("AUTOSAVE_QUIET_MS").unwrap_or(default.autosave_quiet_ms),
            applet_update_debounce_ms: env_parse("APPLET_UPDATE_DEBOUNCE_MS")
                .unwrap_or(default.applet_update_debounce_ms),
            event_poll_ms: env_parse("EVENT_POLL_MS").unwrap_or(default.event_poll_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::TomlParseFailed { source, .. } => ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: String::new(),
            source,
        })
    }

    pub fn submit_throttle(&self) -> Duration {
        Duration::from_millis(self.submit_throttle_ms)
    }

    pub fn preview_throttle(&self) -> Duration {
        Duration::from_millis(self.preview_throttle_ms)
    }

    pub fn button_refresh(&self) -> Duration {
        Duration::from_millis(self.button_refresh_ms)
    }

    pub fn autosave_quiet(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }

    pub fn applet_update_debounce(&self) -> Duration {
        Duration::from_millis(self.applet_update_debounce_ms)
    }

    pub fn event_poll(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms.max(1))
    }
}

/// 读取并解析环境变量，无法解析时记录警告并回退到默认值
fn env_parse<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            };
            tracing::warn!("{}，使用默认值", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            problem_id = 42
            workbook_id = 7
            autosave_quiet_ms = 3000
            "#,
        )
        .unwrap();

        assert_eq!(config.problem_id, 42);
        assert_eq!(config.workbook_id, Some(7));
        assert_eq!(config.autosave_quiet(), Duration::from_secs(3));
        assert_eq!(config.final_answer_action, "submitAnswers");
        assert_eq!(config.submit_throttle(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("problem_id = \"abc\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }
}
