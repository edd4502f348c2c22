//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：连接（或启动）浏览器、创建 JsExecutor / 渲染表面 / 后端客户端
//! 2. **资源管理**：唯一持有 Browser 的模块，保证页面在会话期间存活
//! 3. **会话驱动**：按配置加载题目，运行桥接循环直到 Ctrl-C
//! 4. **收尾**：输出会话结束状态

use anyhow::Result;
use chromiumoxide::Browser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::browser;
use crate::clients::BackendClient;
use crate::config::Config;
use crate::infrastructure::{ChromiumSurface, JsExecutor};
use crate::models::{LoadOptions, Problem};
use crate::orchestrator::{BridgeCommand, ProblemBridge};
use crate::utils::logging::{log_startup, print_final_status};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    bridge: ProblemBridge<BackendClient, ChromiumSurface>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let (browser, page) = if config.headless {
            browser::launch_headless_browser(&config.target_url, config.chrome_executable.as_deref())
                .await?
        } else {
            browser::connect_to_browser_and_page(config.browser_debug_port, &config.target_url, None)
                .await?
        };

        let surface = ChromiumSurface::new(JsExecutor::new(page), config.final_answer_action.clone());
        let api = BackendClient::new(&config)?;

        let mut bridge = ProblemBridge::from_config(api, surface, &config);
        let problem_id = config.problem_id;
        bridge.interceptor_mut().set_grade_listener(move |grade| {
            info!("[题目 ID#{}] 🎯 收到成绩: {:?}", problem_id, grade.id);
        });

        Ok(Self {
            config,
            _browser: browser,
            bridge,
        })
    }

    /// 运行会话，直到收到退出信号
    pub async fn run(mut self) -> Result<()> {
        let (commands, receiver) = mpsc::unbounded_channel();

        commands
            .send(BridgeCommand::Load {
                problem: self.initial_problem(),
                options: LoadOptions {
                    workbook_id: self.config.workbook_id,
                    readonly: self.config.readonly,
                },
            })
            .map_err(|_| anyhow::anyhow!("桥接循环未启动"))?;

        let shutdown = commands.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("收到退出信号"),
                Err(e) => warn!("监听退出信号失败: {}", e),
            }
            let _ = shutdown.send(BridgeCommand::Shutdown);
        });

        self.bridge.run(receiver).await;

        print_final_status(self.config.problem_id, self.bridge.status());
        Ok(())
    }

    fn initial_problem(&self) -> Problem {
        let problem = Problem::new(self.config.problem_id);
        match self.config.grade_id {
            Some(grade_id) => problem.with_grade(grade_id),
            None => problem,
        }
    }
}
