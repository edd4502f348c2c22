//! 表单拦截流程 - 流程层
//!
//! 核心职责：定义"一道题"在渲染表面上的完整交互流程
//!
//! 状态流转：
//! `Loading → Ready → (Submitting | Saving) → Ready`，
//! `Error` 可由 `Loading` 或任一动作状态进入
//!
//! - submit（最终答案）：节流 + 重复提交判断
//! - submit（其他动作）：独立节流，不做重复判断
//! - input：节流刷新按钮状态 + 防抖自动保存

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clients::ProblemApi;
use crate::config::Config;
use crate::error::{BridgeError, ErrorKind, SurfaceError};
use crate::infrastructure::{ClickedButton, FormSurface, InitHook, SurfaceEvent};
use crate::models::{reported_problem_id, GradeEntry, RenderedSurface, StudentGrade, SubmissionSnapshot};
use crate::services::button_state::reconcile;
use crate::services::callback::{dress, PendingInit};
use crate::services::timing::{Debounce, Throttle};
use crate::utils::console;
use crate::workflow::problem_ctx::ProblemCtx;

/// 拦截器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorState {
    Loading,
    Ready,
    Submitting,
    Saving,
    Error(ErrorKind),
}

/// 对外可见的题目状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeStatus {
    pub last_submitted_at: Option<DateTime<Local>>,
    pub last_saved_at: Option<DateTime<Local>>,
    pub student_grade: Option<StudentGrade>,
    /// 内联显示的错误信息
    pub error: Option<String>,
}

/// 拦截器参数
#[derive(Debug, Clone)]
pub struct InterceptorSettings {
    pub final_answer_action: String,
    pub submitted_label: String,
    pub submit_throttle: Duration,
    pub preview_throttle: Duration,
    pub button_refresh: Duration,
    pub autosave_quiet: Duration,
    pub applet_update_debounce: Duration,
}

impl InterceptorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            final_answer_action: config.final_answer_action.clone(),
            submitted_label: config.submitted_label.clone(),
            submit_throttle: config.submit_throttle(),
            preview_throttle: config.preview_throttle(),
            button_refresh: config.button_refresh(),
            autosave_quiet: config.autosave_quiet(),
            applet_update_debounce: config.applet_update_debounce(),
        }
    }
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 等待初始化的小程序
pub struct PendingApplet {
    /// 所属渲染内容的代号
    pub generation: u64,
    pub key: String,
    pub init: PendingInit<Vec<Value>>,
}

/// 表单拦截器
///
/// - 持有渲染表面和后端能力
/// - 决定何时提交、何时保存、按钮何时禁用
/// - 不关心加载请求的调度（由编排层负责）
pub struct FormInterceptor<A, S> {
    api: A,
    surface: S,
    settings: InterceptorSettings,
    ctx: Option<ProblemCtx>,
    state: InterceptorState,
    attached: bool,
    snapshot: SubmissionSnapshot,
    status: BridgeStatus,
    last_error: Option<BridgeError>,
    submit_throttle: Throttle<ClickedButton>,
    preview_throttle: Throttle<ClickedButton>,
    refresh_throttle: Throttle<()>,
    autosave: Debounce<()>,
    applet_updates: HashMap<String, Debounce<()>>,
    surface_generation: u64,
    pending_applets: Vec<PendingApplet>,
    applets_waiting: usize,
    grade_listener: Option<Box<dyn FnMut(&StudentGrade)>>,
}

impl<A: ProblemApi, S: FormSurface> FormInterceptor<A, S> {
    pub fn new(api: A, surface: S, settings: InterceptorSettings) -> Self {
        Self {
            api,
            surface,
            submit_throttle: Throttle::new(settings.submit_throttle),
            preview_throttle: Throttle::new(settings.preview_throttle),
            refresh_throttle: Throttle::new(settings.button_refresh),
            autosave: Debounce::new(settings.autosave_quiet),
            settings,
            ctx: None,
            state: InterceptorState::Loading,
            attached: false,
            snapshot: SubmissionSnapshot::default(),
            status: BridgeStatus::default(),
            last_error: None,
            applet_updates: HashMap::new(),
            surface_generation: 0,
            pending_applets: Vec::new(),
            applets_waiting: 0,
            grade_listener: None,
        }
    }

    /// 注册成绩回调，最终答案提交成功后调用
    pub fn set_grade_listener(&mut self, listener: impl FnMut(&StudentGrade) + 'static) {
        self.grade_listener = Some(Box::new(listener));
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn ctx(&self) -> Option<&ProblemCtx> {
        self.ctx.as_ref()
    }

    pub fn state(&self) -> InterceptorState {
        self.state
    }

    pub fn status(&self) -> &BridgeStatus {
        &self.status
    }

    pub fn snapshot(&self) -> &SubmissionSnapshot {
        &self.snapshot
    }

    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    /// 监听器是否挂在当前渲染内容上
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// 当前渲染内容的代号，每次渲染加一
    pub fn surface_generation(&self) -> u64 {
        self.surface_generation
    }

    /// 内容未就绪，或仍有小程序未初始化
    pub fn is_loading(&self) -> bool {
        self.state == InterceptorState::Loading || self.applets_waiting > 0
    }

    /// 切换到新题目：所有与上一题相关的状态全部清空
    pub fn reset_for(&mut self, ctx: ProblemCtx) {
        info!("{} 🔄 切换题目，重置提交记录", ctx);
        self.detach();
        self.submit_throttle.cancel();
        self.preview_throttle.cancel();
        self.ctx = Some(ctx);
        self.state = InterceptorState::Loading;
        self.snapshot = SubmissionSnapshot::default();
        self.status = BridgeStatus::default();
        self.last_error = None;
    }

    /// 记录加载失败
    pub fn fail_load(&mut self, err: BridgeError) {
        self.set_error(err);
    }

    /// 渲染新内容并挂载监听
    ///
    /// 初次加载和每次提交返回后都会走这里
    pub async fn show(&mut self, markup: &RenderedSurface, context: ErrorKind) {
        let Some(problem_id) = self.ctx.as_ref().map(ProblemCtx::problem_id) else {
            warn!("没有当前题目，忽略渲染");
            return;
        };

        self.detach();
        self.surface_generation += 1;

        if let Err(e) = self.surface.render(markup).await {
            self.set_error(BridgeError::surface(context, e));
            return;
        }
        debug!(
            "[题目 ID#{}] 渲染内容已写入 (代号 {}, {} 字节)",
            problem_id,
            self.surface_generation,
            markup.as_str().len()
        );

        match self.surface.has_main_form().await {
            Ok(true) => {}
            Ok(false) => {
                error!("[题目 ID#{}] ❌ 渲染内容缺少主表单", problem_id);
                self.state = InterceptorState::Ready;
                // 没有表单时小程序仍需初始化
                self.dress_applets().await;
                return;
            }
            Err(e) => {
                self.set_error(BridgeError::surface(context, e));
                return;
            }
        }

        // 校验表单上报的题目ID
        match self.surface.form_action().await {
            Ok(Some(action)) => {
                if let Some(reported) = reported_problem_id(&action) {
                    if reported != problem_id {
                        self.set_error(BridgeError::Integrity {
                            expected: problem_id,
                            reported,
                        });
                        return;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.set_error(BridgeError::surface(context, e));
                return;
            }
        }

        self.attached = true;
        self.state = InterceptorState::Ready;
        self.refresh_buttons().await;
        self.dress_applets().await;
    }

    /// 处理渲染表面事件
    pub async fn handle_event(&mut self, event: SurfaceEvent, now: Instant) {
        self.fire_due(now).await;

        let problem_id = self.ctx.as_ref().map(ProblemCtx::problem_id).unwrap_or_default();
        match event {
            SurfaceEvent::Console(entry) => console::forward(problem_id, &entry),
            _ if !self.attached => debug!("[题目 ID#{}] 监听未挂载，忽略事件 {:?}", problem_id, event),
            SurfaceEvent::Submit(button) => self.on_submit(button, now).await,
            SurfaceEvent::Input => self.on_input(now).await,
            SurfaceEvent::AppletUpdate { key } => self.on_applet_update(key, now),
        }
    }

    /// 执行所有已到期的节流/防抖调用
    pub async fn fire_due(&mut self, now: Instant) {
        if let Some(button) = self.submit_throttle.poll(now) {
            self.submit(button).await;
        }
        if let Some(button) = self.preview_throttle.poll(now) {
            self.submit(button).await;
        }
        if self.refresh_throttle.poll(now).is_some() {
            self.refresh_buttons().await;
        }

        let settled: Vec<String> = self
            .applet_updates
            .iter_mut()
            .filter_map(|(key, debounce)| debounce.poll(now).map(|_| key.clone()))
            .collect();
        for key in settled {
            if let Err(e) = self.surface.prepare_applet(&key).await {
                warn!("小程序 {} 准备提交字段失败: {}", key, e);
            }
            self.on_input(now).await;
        }

        if self.autosave.poll(now).is_some() {
            self.save().await;
        }
    }

    /// 最近一个待触发调用的时间
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.submit_throttle.deadline(),
            self.preview_throttle.deadline(),
            self.refresh_throttle.deadline(),
            self.autosave.deadline(),
        ]
        .into_iter()
        .chain(self.applet_updates.values().map(Debounce::deadline))
        .flatten()
        .min()
    }

    /// 取出新渲染内容上等待初始化的小程序
    pub fn take_pending_applets(&mut self) -> Vec<PendingApplet> {
        std::mem::take(&mut self.pending_applets)
    }

    /// 小程序初始化完成，开始监听其内容变化
    pub fn applet_ready(&mut self, generation: u64, key: String, args: Vec<Value>) {
        if generation != self.surface_generation {
            debug!("过期的小程序初始化信号: {} (代号 {})", key, generation);
            return;
        }
        self.applets_waiting = self.applets_waiting.saturating_sub(1);
        info!("🧩 小程序 {} 初始化完成 (参数 {} 个)", key, args.len());
        self.applet_updates
            .insert(key, Debounce::new(self.settings.applet_update_debounce));
    }

    // ========== 事件处理 ==========

    async fn on_submit(&mut self, button: ClickedButton, now: Instant) {
        let throttle = if self.is_final_answer(&button) {
            &mut self.submit_throttle
        } else {
            &mut self.preview_throttle
        };
        match throttle.call(now, button) {
            Some(button) => self.submit(button).await,
            None => debug!("提交被节流，窗口结束时再发送"),
        }
    }

    async fn on_input(&mut self, now: Instant) {
        if self.refresh_throttle.call(now, ()).is_some() {
            self.refresh_buttons().await;
        }
        self.autosave.call(now, ());
    }

    fn on_applet_update(&mut self, key: String, now: Instant) {
        match self.applet_updates.get_mut(&key) {
            Some(debounce) => debounce.call(now, ()),
            None => debug!("小程序 {} 尚未初始化，忽略更新", key),
        }
    }

    fn is_final_answer(&self, button: &ClickedButton) -> bool {
        button.name == self.settings.final_answer_action
    }

    // ========== 动作 ==========

    /// 提交答案
    async fn submit(&mut self, button: ClickedButton) {
        let Some(problem_id) = self.ctx.as_ref().map(ProblemCtx::problem_id) else {
            return;
        };
        if !self.attached {
            debug!("[题目 ID#{}] 渲染内容已替换，丢弃待提交动作", problem_id);
            return;
        }
        let is_final = self.is_final_answer(&button);

        // 渲染器的全局 submitAction 负责填充隐藏字段
        if let Err(e) = self.surface.prepare_submission().await {
            self.set_error(BridgeError::surface(ErrorKind::Submit, e));
            return;
        }
        let mut form = match self.surface.form_data().await {
            Ok(form) => form,
            Err(e) => {
                self.set_error(BridgeError::surface(ErrorKind::Submit, e));
                return;
            }
        };

        let current = form.to_snapshot();
        if is_final && current == self.snapshot {
            info!("[题目 ID#{}] ⏭️ 答案未变化，跳过重复提交", problem_id);
            return;
        }

        // 快照必须在加入按钮字段之前更新
        let previous = std::mem::replace(&mut self.snapshot, current);
        form.set(button.name.as_str(), button.value.as_str());

        self.state = InterceptorState::Submitting;
        info!(
            "[题目 ID#{}] 📤 正在提交 ({}, {} 个字段)...",
            problem_id,
            button.name,
            form.len()
        );

        match self.api.submit_answers(problem_id, &form).await {
            Ok(result) => {
                self.clear_error();
                self.show(&result.rendered, ErrorKind::Submit).await;
                if is_final {
                    self.record_grade(result.student_grade);
                    self.status.last_submitted_at = Some(Local::now());
                    info!("[题目 ID#{}] ✓ 答案提交成功", problem_id);
                } else {
                    info!("[题目 ID#{}] ✓ {} 完成", problem_id, button.name);
                }
            }
            Err(source) => {
                // 提交失败时恢复快照，允许用户原样重试
                self.snapshot = previous;
                self.set_error(BridgeError::Submit { problem_id, source });
            }
        }
    }

    /// 自动保存当前作答状态
    async fn save(&mut self) {
        let Some(ctx) = self.ctx.as_ref() else {
            return;
        };
        let problem_id = ctx.problem_id();
        let Some(grade_id) = ctx.problem.saved_grade_id() else {
            debug!("[题目 ID#{}] 没有已保存的成绩记录，跳过自动保存", problem_id);
            return;
        };
        if !self.attached {
            return;
        }

        if let Err(e) = self.surface.prepare_submission().await {
            self.set_error(BridgeError::surface(ErrorKind::Save, e));
            return;
        }
        let snapshot = match self.surface.form_data().await {
            Ok(form) => form.to_snapshot(),
            Err(e) => {
                self.set_error(BridgeError::surface(ErrorKind::Save, e));
                return;
            }
        };

        let resume = self.state;
        self.state = InterceptorState::Saving;
        debug!("[题目 ID#{}] 💾 自动保存 (成绩 {})", problem_id, grade_id);

        match self.api.save_grade(grade_id, &snapshot).await {
            Ok(updates) => {
                if updates > 0 {
                    self.status.last_saved_at = Some(Local::now());
                    info!("[题目 ID#{}] 💾 作答状态已保存", problem_id);
                } else {
                    debug!("[题目 ID#{}] 保存未产生更新", problem_id);
                }
                self.state = resume;
                if resume == InterceptorState::Error(ErrorKind::Save) {
                    self.clear_error();
                }
            }
            Err(source) => self.set_error(BridgeError::Save { grade_id, source }),
        }
    }

    /// 根据当前表单数据是否等于快照同步提交按钮
    async fn refresh_buttons(&mut self) {
        if !self.attached {
            return;
        }
        let live = match self.surface.form_data().await {
            Ok(form) => form.to_snapshot(),
            Err(e) => return log_surface_warning("读取表单", e),
        };
        let is_clean = live == self.snapshot;

        let mut buttons = match self.surface.submit_buttons().await {
            Ok(buttons) => buttons,
            Err(e) => return log_surface_warning("读取提交按钮", e),
        };
        if reconcile(&mut buttons, is_clean, &self.settings.submitted_label) {
            debug!("提交按钮状态更新: {}", if is_clean { "已提交" } else { "可提交" });
            if let Err(e) = self.surface.apply_buttons(&buttons).await {
                log_surface_warning("更新提交按钮", e);
            }
        }
    }

    /// 用一次性信号替换每个小程序的初始化钩子
    async fn dress_applets(&mut self) {
        let applets = match self.surface.applets().await {
            Ok(applets) => applets,
            Err(e) => return log_surface_warning("读取小程序列表", e),
        };

        for applet in applets {
            let original = self
                .surface
                .take_init_hook(&applet.on_init)
                .unwrap_or_else(noop_hook);
            let (dressed, init) = dress(original);
            self.surface.install_init_hook(&applet.on_init, Box::new(dressed));

            debug!("等待小程序 {} 调用 {}", applet.key, applet.on_init);
            self.pending_applets.push(PendingApplet {
                generation: self.surface_generation,
                key: applet.key,
                init,
            });
            self.applets_waiting += 1;
        }
    }

    // ========== 状态辅助 ==========

    fn record_grade(&mut self, grade: Option<StudentGrade>) {
        let Some(grade) = grade else {
            return;
        };
        if let (Some(ctx), Some(grade_id)) = (self.ctx.as_mut(), grade.id) {
            if ctx.problem.saved_grade_id().is_none() {
                match ctx.problem.grades.first_mut() {
                    Some(entry) => entry.id = Some(grade_id),
                    None => ctx.problem.grades.push(GradeEntry { id: Some(grade_id) }),
                }
            }
        }
        if let Some(listener) = self.grade_listener.as_mut() {
            listener(&grade);
        }
        self.status.student_grade = Some(grade);
    }

    /// 卸下当前渲染内容上的监听和计时器
    ///
    /// 提交节流的窗口跨越重新渲染，只丢弃针对旧内容的待提交动作
    fn detach(&mut self) {
        self.attached = false;
        self.submit_throttle.drop_pending();
        self.preview_throttle.drop_pending();
        self.refresh_throttle.cancel();
        self.autosave.cancel();
        self.applet_updates.clear();
        self.pending_applets.clear();
        self.applets_waiting = 0;
    }

    fn set_error(&mut self, err: BridgeError) {
        let kind = err.kind();
        error!("❌ {}错误: {}", kind, err);
        if kind == ErrorKind::Integrity {
            self.attached = false;
        }
        self.status.error = Some(err.to_string());
        self.state = InterceptorState::Error(kind);
        self.last_error = Some(err);
    }

    fn clear_error(&mut self) {
        self.status.error = None;
        self.last_error = None;
        if matches!(self.state, InterceptorState::Error(_)) {
            self.state = InterceptorState::Ready;
        }
    }
}

fn noop_hook() -> InitHook {
    Box::new(|_args: Vec<Value>| Value::Null)
}

fn log_surface_warning(action: &str, err: SurfaceError) {
    warn!("{}失败: {}", action, err);
}
