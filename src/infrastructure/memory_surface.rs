//! 内存渲染表面
//!
//! 不依赖浏览器的表单视图，用于无头运行和测试：
//! 表单字段、按钮、小程序都由调用方直接设置，事件由调用方推入

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::surface::{AppletDescriptor, ClickedButton, FormSurface, InitHook, SurfaceEvent};
use crate::error::SurfaceError;
use crate::models::{FormData, RenderedSurface};
use crate::services::button_state::SubmitButton;

/// 页面脚本定义的原始钩子，每次渲染都重新挂到页面上
type PageHook = Arc<Mutex<InitHook>>;

#[derive(Default)]
struct MemoryState {
    markup: RenderedSurface,
    renders: usize,
    has_form: bool,
    action: Option<String>,
    fields: FormData,
    buttons: Vec<SubmitButton>,
    applets: Vec<AppletDescriptor>,
    page_hooks: HashMap<String, PageHook>,
    hooks: HashMap<String, InitHook>,
    events: VecDeque<SurfaceEvent>,
    prepare_calls: usize,
    applet_prepares: Vec<String>,
}

/// 内存渲染表面，克隆后共享同一份状态
#[derive(Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带主表单的表面
    pub fn with_form(action: impl Into<String>, buttons: Vec<SubmitButton>) -> Self {
        let surface = Self::new();
        {
            let mut state = surface.lock();
            state.has_form = true;
            state.action = Some(action.into());
            state.buttons = buttons;
        }
        surface
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 设置字段值（替换同名字段）
    pub fn set_field(&self, name: &str, value: &str) {
        self.lock().fields.set(name, value);
    }

    pub fn set_fields(&self, fields: FormData) {
        self.lock().fields = fields;
    }

    pub fn set_action(&self, action: Option<String>) {
        self.lock().action = action;
    }

    pub fn set_has_form(&self, has_form: bool) {
        self.lock().has_form = has_form;
    }

    /// 注册一个小程序及其原始初始化钩子
    pub fn add_applet(&self, key: &str, on_init: &str, hook: Option<InitHook>) {
        let mut state = self.lock();
        state.applets.push(AppletDescriptor {
            key: key.to_string(),
            on_init: on_init.to_string(),
        });
        if let Some(hook) = hook {
            let page_hook = Arc::new(Mutex::new(hook));
            state.hooks.insert(on_init.to_string(), bind_page_hook(&page_hook));
            state.page_hooks.insert(on_init.to_string(), page_hook);
        }
    }

    /// 模拟小程序调用初始化钩子，返回钩子的返回值
    pub fn fire_applet_init(&self, on_init: &str, args: Vec<Value>) -> Option<Value> {
        // 调用钩子时不能持有锁
        let mut hook = self.lock().hooks.remove(on_init)?;
        let output = hook(args);
        self.lock().hooks.entry(on_init.to_string()).or_insert(hook);
        Some(output)
    }

    pub fn push_event(&self, event: SurfaceEvent) {
        self.lock().events.push_back(event);
    }

    /// 模拟输入：修改字段并产生 input 事件
    pub fn type_into(&self, name: &str, value: &str) {
        let mut state = self.lock();
        state.fields.set(name, value);
        state.events.push_back(SurfaceEvent::Input);
    }

    /// 模拟点击提交按钮
    pub fn click(&self, name: &str, value: &str) {
        self.push_event(SurfaceEvent::Submit(ClickedButton {
            name: name.to_string(),
            value: value.to_string(),
        }));
    }

    pub fn markup(&self) -> RenderedSurface {
        self.lock().markup.clone()
    }

    pub fn render_count(&self) -> usize {
        self.lock().renders
    }

    pub fn buttons(&self) -> Vec<SubmitButton> {
        self.lock().buttons.clone()
    }

    pub fn prepare_calls(&self) -> usize {
        self.lock().prepare_calls
    }

    pub fn applet_prepares(&self) -> Vec<String> {
        self.lock().applet_prepares.clone()
    }
}

impl FormSurface for MemorySurface {
    async fn render(&self, markup: &RenderedSurface) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        state.markup = markup.clone();
        state.renders += 1;
        state.events.clear();
        // 新内容重新定义页面钩子，旧内容上安装的钩子全部作废
        let hooks: HashMap<String, InitHook> = state
            .page_hooks
            .iter()
            .map(|(name, hook)| (name.clone(), bind_page_hook(hook)))
            .collect();
        state.hooks = hooks;
        Ok(())
    }

    async fn has_main_form(&self) -> Result<bool, SurfaceError> {
        Ok(self.lock().has_form)
    }

    async fn form_action(&self) -> Result<Option<String>, SurfaceError> {
        Ok(self.lock().action.clone())
    }

    async fn form_data(&self) -> Result<FormData, SurfaceError> {
        let state = self.lock();
        if !state.has_form {
            return Err(SurfaceError::Unavailable);
        }
        Ok(state.fields.clone())
    }

    async fn submit_buttons(&self) -> Result<Vec<SubmitButton>, SurfaceError> {
        Ok(self.lock().buttons.clone())
    }

    async fn apply_buttons(&self, buttons: &[SubmitButton]) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        for (slot, button) in state.buttons.iter_mut().zip(buttons) {
            *slot = button.clone();
        }
        Ok(())
    }

    async fn prepare_submission(&self) -> Result<(), SurfaceError> {
        self.lock().prepare_calls += 1;
        Ok(())
    }

    async fn applets(&self) -> Result<Vec<AppletDescriptor>, SurfaceError> {
        Ok(self.lock().applets.clone())
    }

    async fn prepare_applet(&self, key: &str) -> Result<(), SurfaceError> {
        self.lock().applet_prepares.push(key.to_string());
        Ok(())
    }

    fn take_init_hook(&self, name: &str) -> Option<InitHook> {
        self.lock().hooks.remove(name)
    }

    fn install_init_hook(&self, name: &str, hook: InitHook) {
        self.lock().hooks.insert(name.to_string(), hook);
    }

    async fn drain_events(&self) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        Ok(self.lock().events.drain(..).collect())
    }
}

fn bind_page_hook(hook: &PageHook) -> InitHook {
    let hook = Arc::clone(hook);
    Box::new(move |args: Vec<Value>| {
        let mut original = hook.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        original(args)
    })
}
