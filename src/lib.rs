//! # Problem Iframe Bridge
//!
//! 在浏览器页面中渲染后端返回的题目 HTML，拦截表单提交与输入，
//! 把答案提交 / 自动保存到后端，并把成绩回报给宿主。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `FormSurface` - 渲染表面抽象：`ChromiumSurface`（真实页面）/ `MemorySurface`（测试）
//! - `clients/` - 后端 HTTP 接口（`ProblemApi` / `BackendClient`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 与具体题目无关的纯能力
//! - `Throttle` / `Debounce` - 显式截止时间的节流与防抖
//! - `reconcile` - 提交按钮状态
//! - `dress` - 一次性回调转 Future
//! - `ContentLoader` - 带代号的题目加载
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 一道题的完整交互流程
//! - `ProblemCtx` - 上下文封装（题目 + 加载参数）
//! - `FormInterceptor` - 渲染后处理、提交、自动保存、小程序
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/bridge` - 单任务事件循环
//! - `orchestrator/app` - 浏览器资源与会话生命周期
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, launch_headless_browser};
pub use clients::{BackendClient, ProblemApi};
pub use config::Config;
pub use error::{ApiError, BridgeError, ErrorKind, SurfaceError};
pub use infrastructure::{ChromiumSurface, FormSurface, JsExecutor, MemorySurface, SurfaceEvent};
pub use models::{FormData, LoadOptions, Problem, RenderedSurface, SubmissionSnapshot};
pub use orchestrator::{App, BridgeCommand, BridgeStatus, ProblemBridge};
pub use workflow::{FormInterceptor, InterceptorState, ProblemCtx};
