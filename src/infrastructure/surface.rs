//! 渲染表面抽象
//!
//! 拦截器只通过这个接口读写表单，不直接接触真实页面

use serde::Deserialize;
use serde_json::Value;

use crate::error::SurfaceError;
use crate::models::{FormData, RenderedSurface};
use crate::services::button_state::SubmitButton;
use crate::utils::console::ConsoleEntry;

/// 小程序初始化钩子
pub type InitHook = Box<dyn FnMut(Vec<Value>) -> Value + Send>;

/// 渲染表面上的小程序描述
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppletDescriptor {
    /// 小程序在注册表中的键
    pub key: String,
    /// 初始化钩子的全局名称
    pub on_init: String,
}

/// 点击的提交按钮
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClickedButton {
    pub name: String,
    pub value: String,
}

/// 渲染表面产生的事件
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// 表单提交，附带被点击的按钮
    Submit(ClickedButton),
    /// 表单输入
    Input,
    /// 小程序内容变化
    AppletUpdate { key: String },
    /// 页面控制台输出
    Console(ConsoleEntry),
}

/// 表单视图：加载、读取、修改渲染表面中的主表单
#[allow(async_fn_in_trait)]
pub trait FormSurface {
    /// 整体替换渲染内容，旧内容上的事件一并丢弃
    async fn render(&self, markup: &RenderedSurface) -> Result<(), SurfaceError>;

    /// 主表单是否存在
    async fn has_main_form(&self) -> Result<bool, SurfaceError>;

    /// 主表单的 action 属性
    async fn form_action(&self) -> Result<Option<String>, SurfaceError>;

    /// 主表单当前数据
    async fn form_data(&self) -> Result<FormData, SurfaceError>;

    /// 所有提交按钮的当前状态
    async fn submit_buttons(&self) -> Result<Vec<SubmitButton>, SurfaceError>;

    /// 按顺序写回提交按钮状态
    async fn apply_buttons(&self, buttons: &[SubmitButton]) -> Result<(), SurfaceError>;

    /// 调用渲染器的全局 submitAction，为提交准备隐藏字段
    async fn prepare_submission(&self) -> Result<(), SurfaceError>;

    /// 小程序注册表
    async fn applets(&self) -> Result<Vec<AppletDescriptor>, SurfaceError>;

    /// 调用指定小程序的 submitAction
    async fn prepare_applet(&self, key: &str) -> Result<(), SurfaceError>;

    /// 取出当前安装的初始化钩子
    fn take_init_hook(&self, name: &str) -> Option<InitHook>;

    /// 安装初始化钩子（替换同名钩子）
    fn install_init_hook(&self, name: &str, hook: InitHook);

    /// 取出自上次调用以来产生的事件
    async fn drain_events(&self) -> Result<Vec<SurfaceEvent>, SurfaceError>;
}
