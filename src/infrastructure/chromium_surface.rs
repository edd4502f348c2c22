//! 浏览器渲染表面
//!
//! 通过 JsExecutor 在真实页面里写入题目内容、读写主表单。
//! 页面内的 submit / input / 小程序 / console 事件先进入 `window.__bridgeQueue`，
//! 再由 `drain_events` 轮询取出。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::js_executor::JsExecutor;
use super::surface::{AppletDescriptor, ClickedButton, FormSurface, InitHook, SurfaceEvent};
use crate::error::SurfaceError;
use crate::models::{FormData, RenderedSurface};
use crate::services::button_state::SubmitButton;
use crate::utils::console::ConsoleEntry;

/// 主表单的元素ID
pub const MAIN_FORM_ID: &str = "problemMainForm";

/// 浏览器渲染表面
pub struct ChromiumSurface {
    executor: JsExecutor,
    form_id: String,
    control_name: String,
    hooks: Mutex<HashMap<String, InitHook>>,
}

/// 页面队列中的原始事件
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum QueuedEvent {
    Submit {
        name: String,
        value: String,
    },
    Input,
    AppletInit {
        hook: String,
        #[serde(default)]
        args: Vec<String>,
    },
    AppletUpdate {
        key: String,
    },
    Console {
        level: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct FormProbe {
    found: bool,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    entries: Vec<(String, String)>,
}

impl ChromiumSurface {
    /// 创建浏览器渲染表面
    ///
    /// `control_name` 是提交按钮的 name
    pub fn new(executor: JsExecutor, control_name: impl Into<String>) -> Self {
        Self {
            executor,
            form_id: MAIN_FORM_ID.to_string(),
            control_name: control_name.into(),
            hooks: Mutex::new(HashMap::new()),
        }
    }

    fn hooks(&self) -> MutexGuard<'_, HashMap<String, InitHook>> {
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn probe_form(&self) -> Result<FormProbe, SurfaceError> {
        let script = format!(
            r#"
            (() => {{
                const form = document.getElementById({form_id});
                if (!form) return {{ found: false }};
                const entries = Array.from(new FormData(form).entries()).map(([k, v]) =>
                    [k, typeof v === 'string' ? v : ((v && v.name) || '')]);
                return {{ found: true, action: form.getAttribute('action'), entries }};
            }})()
            "#,
            form_id = JsExecutor::literal(&self.form_id)?
        );
        self.executor.eval_as(script).await
    }

    /// 安装事件转发脚本，旧内容的队列一并清空
    async fn install_listeners(&self) -> Result<(), SurfaceError> {
        let script = format!(
            r#"
            (() => {{
                window.__bridgeQueue = [];
                const push = (e) => window.__bridgeQueue.push(e);
                const text = (v) => {{
                    if (typeof v === 'string') return v;
                    try {{ return JSON.stringify(v); }} catch (_) {{ return String(v); }}
                }};

                if (!window.__bridgeConsolePatched) {{
                    window.__bridgeConsolePatched = true;
                    ['log', 'info', 'warn', 'error', 'debug'].forEach((level) => {{
                        const original = console[level];
                        console[level] = function (...args) {{
                            push({{ kind: 'console', level, args: args.map(text) }});
                            return original.apply(console, args);
                        }};
                    }});
                }}

                const form = document.getElementById({form_id});
                if (form) {{
                    form.addEventListener('submit', (event) => {{
                        event.preventDefault();
                        const button = form.querySelector('.btn-clicked') || event.submitter;
                        if (!button) return;
                        push({{ kind: 'submit', name: button.name || '', value: button.value || '' }});
                    }});
                    form.addEventListener('input', () => push({{ kind: 'input' }}));
                }}

                const applets = window.ww_applet_list || {{}};
                Object.keys(applets).forEach((key) => {{
                    const hook = applets[key].onInit;
                    if (!hook) return;
                    const original = window[hook];
                    window[hook] = function (...args) {{
                        const result = typeof original === 'function' ? original.apply(this, args) : undefined;
                        push({{ kind: 'appletInit', hook, args: args.map(text) }});
                        const applet = typeof window.getApplet === 'function' ? window.getApplet(key) : null;
                        if (applet && typeof applet.registerUpdateListener === 'function') {{
                            applet.registerUpdateListener(() => push({{ kind: 'appletUpdate', key }}));
                        }}
                        return result;
                    }};
                }});
                return true;
            }})()
            "#,
            form_id = JsExecutor::literal(&self.form_id)?
        );
        self.executor.eval(script).await?;
        Ok(())
    }

    /// 页面调用了初始化钩子：转交给 Rust 侧安装的钩子
    fn invoke_init_hook(&self, hook: &str, args: Vec<String>) {
        let Some(mut installed) = self.hooks().remove(hook) else {
            debug!("初始化钩子 {} 未安装，忽略", hook);
            return;
        };
        installed(args.into_iter().map(Value::String).collect());
        self.hooks().entry(hook.to_string()).or_insert(installed);
    }
}

impl FormSurface for ChromiumSurface {
    async fn render(&self, markup: &RenderedSurface) -> Result<(), SurfaceError> {
        // 钩子属于旧内容，随内容一起丢弃
        self.hooks().clear();
        let script = format!(
            "(() => {{ document.open(); document.write({}); document.close(); return true; }})()",
            JsExecutor::literal(markup.as_str())?
        );
        self.executor.eval(script).await?;
        self.install_listeners().await
    }

    async fn has_main_form(&self) -> Result<bool, SurfaceError> {
        Ok(self.probe_form().await?.found)
    }

    async fn form_action(&self) -> Result<Option<String>, SurfaceError> {
        Ok(self.probe_form().await?.action)
    }

    async fn form_data(&self) -> Result<FormData, SurfaceError> {
        let probe = self.probe_form().await?;
        if !probe.found {
            return Err(SurfaceError::Unavailable);
        }
        Ok(probe.entries.into_iter().collect())
    }

    async fn submit_buttons(&self) -> Result<Vec<SubmitButton>, SurfaceError> {
        let script = format!(
            r#"
            (() => Array.from(document.getElementsByName({name})).map((b) => ({{
                name: b.name,
                value: b.value || '',
                stash: b.dataset.bridgeLabel === undefined ? null : b.dataset.bridgeLabel,
                disabled: !!b.disabled,
            }})))()
            "#,
            name = JsExecutor::literal(&self.control_name)?
        );
        self.executor.eval_as(script).await
    }

    async fn apply_buttons(&self, buttons: &[SubmitButton]) -> Result<(), SurfaceError> {
        let script = format!(
            r#"
            (() => {{
                const states = {states};
                const buttons = Array.from(document.getElementsByName({name}));
                states.forEach((s, i) => {{
                    const b = buttons[i];
                    if (!b) return;
                    if (s.disabled) b.setAttribute('disabled', ''); else b.removeAttribute('disabled');
                    b.value = s.value;
                    if (s.stash === null) delete b.dataset.bridgeLabel; else b.dataset.bridgeLabel = s.stash;
                }});
                return true;
            }})()
            "#,
            states = JsExecutor::literal(buttons)?,
            name = JsExecutor::literal(&self.control_name)?
        );
        self.executor.eval(script).await?;
        Ok(())
    }

    async fn prepare_submission(&self) -> Result<(), SurfaceError> {
        self.executor
            .eval("(() => { if (typeof window.submitAction === 'function') window.submitAction(); return true; })()")
            .await?;
        Ok(())
    }

    async fn applets(&self) -> Result<Vec<AppletDescriptor>, SurfaceError> {
        self.executor
            .eval_as(
                r#"
                (() => {
                    const list = window.ww_applet_list || {};
                    return Object.keys(list)
                        .filter((k) => list[k] && list[k].onInit)
                        .map((k) => ({ key: k, on_init: String(list[k].onInit) }));
                })()
                "#,
            )
            .await
    }

    async fn prepare_applet(&self, key: &str) -> Result<(), SurfaceError> {
        let script = format!(
            r#"
            (() => {{
                const applet = (window.ww_applet_list || {{}})[{key}];
                if (applet && typeof applet.submitAction === 'function') applet.submitAction();
                return true;
            }})()
            "#,
            key = JsExecutor::literal(key)?
        );
        self.executor.eval(script).await?;
        Ok(())
    }

    fn take_init_hook(&self, name: &str) -> Option<InitHook> {
        self.hooks().remove(name)
    }

    fn install_init_hook(&self, name: &str, hook: InitHook) {
        self.hooks().insert(name.to_string(), hook);
    }

    async fn drain_events(&self) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        let queued: Vec<Value> = self
            .executor
            .eval_as("(() => { const q = window.__bridgeQueue || []; window.__bridgeQueue = []; return q; })()")
            .await?;

        let mut events = Vec::with_capacity(queued.len());
        for raw in queued {
            match serde_json::from_value::<QueuedEvent>(raw) {
                Ok(QueuedEvent::Submit { name, value }) => {
                    events.push(SurfaceEvent::Submit(ClickedButton { name, value }))
                }
                Ok(QueuedEvent::Input) => events.push(SurfaceEvent::Input),
                Ok(QueuedEvent::AppletInit { hook, args }) => self.invoke_init_hook(&hook, args),
                Ok(QueuedEvent::AppletUpdate { key }) => {
                    events.push(SurfaceEvent::AppletUpdate { key })
                }
                Ok(QueuedEvent::Console { level, args }) => {
                    events.push(SurfaceEvent::Console(ConsoleEntry::new(level, args)))
                }
                Err(e) => warn!("无法识别的页面事件: {}", e),
            }
        }
        Ok(events)
    }
}
