//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `bridge` - 题目桥接器
//! - 单任务事件循环：命令、在途加载、小程序初始化、计时器、页面事件
//! - 用加载凭据丢弃过期响应
//!
//! ### `app` - 应用入口
//! - 管理浏览器资源和会话生命周期
//!
//! ## 层次关系
//!
//! ```text
//! app (持有 Browser)
//!     ↓
//! bridge::ProblemBridge (事件循环)
//!     ↓
//! workflow::FormInterceptor (单道题的表单拦截)
//!     ↓
//! services (节流/防抖、按钮状态、回调适配、内容加载)
//!     ↓
//! infrastructure (FormSurface：Chromium / 内存)
//! ```

pub mod app;
pub mod bridge;

pub use crate::workflow::BridgeStatus;
pub use app::App;
pub use bridge::{BridgeCommand, ProblemBridge};
