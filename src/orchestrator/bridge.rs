//! 题目桥接器 - 编排层
//!
//! ## 职责
//!
//! 单任务事件循环，把以下事件源汇总到一个 `FormInterceptor`：
//!
//! 1. **外部命令**：切换题目、退出
//! 2. **在途加载**：不排队、不取消，过期结果直接丢弃
//! 3. **小程序初始化**：一次性信号完成后开始监听小程序更新
//! 4. **计时器**：节流/防抖的最近截止时间
//! 5. **页面事件**：按固定间隔轮询渲染表面
//!
//! 所有等待都是非阻塞的，加载或等待小程序期间输入照常处理。

use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clients::ProblemApi;
use crate::config::Config;
use crate::error::{BridgeError, ErrorKind};
use crate::infrastructure::{FormSurface, SurfaceEvent};
use crate::models::{LoadOptions, Problem};
use crate::services::content_loader::{ContentLoader, LoadOutcome, LoadTicket};
use crate::utils::logging::truncate_text;
use crate::workflow::{BridgeStatus, FormInterceptor, InterceptorSettings, PendingApplet, ProblemCtx};

/// 桥接循环的外部命令
#[derive(Debug, Clone)]
pub enum BridgeCommand {
    /// 加载（或切换到）一道题
    Load {
        problem: Problem,
        options: LoadOptions,
    },
    /// 退出循环
    Shutdown,
}

/// 题目桥接器
pub struct ProblemBridge<A, S> {
    interceptor: FormInterceptor<A, S>,
    loader: ContentLoader,
    loads: FuturesUnordered<LocalBoxFuture<'static, LoadOutcome>>,
    applet_inits: FuturesUnordered<LocalBoxFuture<'static, (u64, String, Vec<Value>)>>,
    /// `applet_inits` 所属的渲染内容代号
    applet_generation: u64,
    poll_interval: Duration,
}

impl<A, S> ProblemBridge<A, S>
where
    A: ProblemApi + Clone + 'static,
    S: FormSurface,
{
    pub fn new(api: A, surface: S, settings: InterceptorSettings, poll_interval: Duration) -> Self {
        Self {
            interceptor: FormInterceptor::new(api, surface, settings),
            loader: ContentLoader::new(),
            loads: FuturesUnordered::new(),
            applet_inits: FuturesUnordered::new(),
            applet_generation: 0,
            poll_interval,
        }
    }

    pub fn from_config(api: A, surface: S, config: &Config) -> Self {
        Self::new(
            api,
            surface,
            InterceptorSettings::from_config(config),
            config.event_poll(),
        )
    }

    pub fn interceptor(&self) -> &FormInterceptor<A, S> {
        &self.interceptor
    }

    pub fn interceptor_mut(&mut self) -> &mut FormInterceptor<A, S> {
        &mut self.interceptor
    }

    pub fn status(&self) -> &BridgeStatus {
        self.interceptor.status()
    }

    pub fn is_loading(&self) -> bool {
        self.interceptor.is_loading()
    }

    /// 当前渲染内容上仍在等待初始化的小程序数量
    pub fn pending_applet_inits(&self) -> usize {
        self.applet_inits.len()
    }

    /// 开始切换题目：签发新凭据并清空上一题的状态
    pub fn begin_load(&mut self, problem: Problem, options: LoadOptions) -> LoadTicket {
        let ticket = self.loader.begin(problem.id);
        self.interceptor.reset_for(ProblemCtx::new(problem, options));
        self.applet_inits = FuturesUnordered::new();
        ticket
    }

    /// 开始切换题目并发出加载请求，结果由 `run` 循环应用
    pub fn request_load(&mut self, problem: Problem, options: LoadOptions) -> LoadTicket {
        let ticket = self.begin_load(problem, options.clone());
        let api = self.interceptor.api().clone();
        self.loads.push(
            async move { ContentLoader::fetch(&api, ticket, &options).await }.boxed_local(),
        );
        ticket
    }

    /// 应用加载结果，过期结果返回 false
    pub async fn complete_load(&mut self, outcome: LoadOutcome) -> bool {
        let LoadOutcome { ticket, result } = outcome;
        if !self.loader.is_current(&ticket) {
            info!(
                "[题目 ID#{}] ⏭️ 丢弃过期的加载结果 (凭据 #{}, 当前 #{})",
                ticket.problem_id,
                ticket.generation,
                self.loader.generation()
            );
            return false;
        }

        match result {
            Ok(markup) => {
                info!(
                    "[题目 ID#{}] ✓ 题目内容加载完成 ({} 字节)",
                    ticket.problem_id,
                    markup.as_str().len()
                );
                debug!("内容预览: {}", truncate_text(markup.as_str(), 80));
                self.interceptor.show(&markup, ErrorKind::Load).await;
                self.collect_applets();
            }
            Err(source) => self.interceptor.fail_load(BridgeError::Load {
                problem_id: ticket.problem_id,
                source,
            }),
        }
        true
    }

    /// 加载一道题并等待结果
    pub async fn load(&mut self, problem: Problem, options: LoadOptions) {
        let ticket = self.begin_load(problem, options.clone());
        let outcome = ContentLoader::fetch(self.interceptor.api(), ticket, &options).await;
        self.complete_load(outcome).await;
    }

    /// 处理一个页面事件
    pub async fn handle_event(&mut self, event: SurfaceEvent, now: Instant) {
        self.interceptor.handle_event(event, now).await;
        self.collect_applets();
    }

    /// 执行已到期的计时器
    pub async fn fire_due(&mut self, now: Instant) {
        self.interceptor.fire_due(now).await;
        self.collect_applets();
    }

    /// 取出页面事件并逐个处理
    pub async fn pump_surface(&mut self) {
        let events = match self.interceptor.surface().drain_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("读取页面事件失败: {}", e);
                return;
            }
        };
        for event in events {
            self.handle_event(event, Instant::now()).await;
        }
    }

    /// 等待一个小程序完成初始化并通知拦截器
    ///
    /// 没有等待中的小程序时立即返回 false
    pub async fn next_applet_ready(&mut self) -> bool {
        match self.applet_inits.next().await {
            Some((generation, key, args)) => {
                self.interceptor.applet_ready(generation, key, args);
                true
            }
            None => false,
        }
    }

    /// 事件循环，收到 `Shutdown` 或命令通道关闭时返回
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<BridgeCommand>) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.interceptor.next_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(BridgeCommand::Load { problem, options }) => {
                        self.request_load(problem, options);
                    }
                    Some(BridgeCommand::Shutdown) | None => {
                        info!("🛑 桥接循环退出");
                        break;
                    }
                },
                Some(outcome) = self.loads.next(), if !self.loads.is_empty() => {
                    self.complete_load(outcome).await;
                }
                Some((generation, key, args)) = self.applet_inits.next(), if !self.applet_inits.is_empty() => {
                    self.interceptor.applet_ready(generation, key, args);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due(Instant::now()).await;
                }
                _ = poll.tick() => {
                    self.pump_surface().await;
                }
            }
        }
    }

    fn collect_applets(&mut self) {
        // 内容已重新渲染，旧内容上的等待全部作废
        let generation = self.interceptor.surface_generation();
        if generation != self.applet_generation {
            self.applet_inits = FuturesUnordered::new();
            self.applet_generation = generation;
        }

        for PendingApplet {
            generation,
            key,
            init,
        } in self.interceptor.take_pending_applets()
        {
            debug!("登记小程序初始化信号: {} (代号 {})", key, generation);
            self.applet_inits.push(
                async move {
                    let args = init.wait().await;
                    (generation, key, args)
                }
                .boxed_local(),
            );
        }
    }
}
