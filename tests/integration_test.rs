use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use problem_iframe_bridge::clients::ProblemApi;
use problem_iframe_bridge::config::Config;
use problem_iframe_bridge::error::{ApiError, ErrorKind};
use problem_iframe_bridge::infrastructure::{ChromiumSurface, FormSurface, JsExecutor, MemorySurface, SurfaceEvent};
use problem_iframe_bridge::models::{
    FieldValue, FormData, LoadOptions, Problem, RenderedSurface, StudentGrade, SubmissionResult,
    SubmissionSnapshot,
};
use problem_iframe_bridge::orchestrator::{BridgeCommand, ProblemBridge};
use problem_iframe_bridge::services::{ContentLoader, SubmitButton};
use problem_iframe_bridge::workflow::{InterceptorSettings, InterceptorState};
use problem_iframe_bridge::{connect_to_browser_and_page, logger};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

const ACTION: &str = "/backend-api/courses/question/7?workbookId=3";
const FINAL: &str = "submitAnswers";

#[derive(Default)]
struct ApiLog {
    fetches: Vec<u64>,
    submits: Vec<FormData>,
    saves: Vec<(u64, SubmissionSnapshot)>,
    fail_submit: bool,
}

/// 记录所有调用的内存后端
#[derive(Clone, Default)]
struct MockApi {
    log: Arc<Mutex<ApiLog>>,
}

impl MockApi {
    fn log(&self) -> MutexGuard<'_, ApiLog> {
        self.log.lock().unwrap()
    }

    fn submit_count(&self) -> usize {
        self.log().submits.len()
    }

    fn save_count(&self) -> usize {
        self.log().saves.len()
    }
}

impl ProblemApi for MockApi {
    async fn fetch_problem(
        &self,
        problem_id: u64,
        _options: &LoadOptions,
    ) -> Result<RenderedSurface, ApiError> {
        self.log().fetches.push(problem_id);
        Ok(RenderedSurface::new(format!(
            r#"<form id="problemMainForm" data-problem="{}"></form>"#,
            problem_id
        )))
    }

    async fn submit_answers(
        &self,
        problem_id: u64,
        form: &FormData,
    ) -> Result<SubmissionResult, ApiError> {
        let mut log = self.log();
        if log.fail_submit {
            return Err(ApiError::BadStatus {
                endpoint: format!("/courses/question/{}", problem_id),
                status: 500,
                message: None,
            });
        }
        log.submits.push(form.clone());
        Ok(SubmissionResult {
            rendered: RenderedSurface::new(format!(
                r#"<form id="problemMainForm">graded #{}</form>"#,
                log.submits.len()
            )),
            student_grade: Some(StudentGrade {
                id: Some(77),
                ..Default::default()
            }),
        })
    }

    async fn save_grade(
        &self,
        grade_id: u64,
        snapshot: &SubmissionSnapshot,
    ) -> Result<u64, ApiError> {
        self.log().saves.push((grade_id, snapshot.clone()));
        Ok(1)
    }
}

type Bridge = ProblemBridge<MockApi, MemorySurface>;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn options() -> LoadOptions {
    LoadOptions {
        workbook_id: Some(3),
        readonly: false,
    }
}

fn fixture() -> (MockApi, MemorySurface, Bridge) {
    let api = MockApi::default();
    let surface = MemorySurface::with_form(ACTION, vec![SubmitButton::new(FINAL, "Submit Answers")]);
    surface.set_field("answer", "");
    let bridge = ProblemBridge::new(
        api.clone(),
        surface.clone(),
        InterceptorSettings::default(),
        ms(100),
    );
    (api, surface, bridge)
}

async fn loaded(problem: Problem) -> (MockApi, MemorySurface, Bridge) {
    let (api, surface, mut bridge) = fixture();
    bridge.load(problem, options()).await;
    assert_eq!(bridge.interceptor().state(), InterceptorState::Ready);
    (api, surface, bridge)
}

fn click(name: &str) -> SurfaceEvent {
    SurfaceEvent::Submit(problem_iframe_bridge::infrastructure::ClickedButton {
        name: name.to_string(),
        value: "1".to_string(),
    })
}

fn single(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Single(value.to_string()))
}

#[tokio::test]
async fn test_load_renders_and_attaches() {
    let (api, surface, bridge) = loaded(Problem::new(7).with_grade(42)).await;

    assert_eq!(api.log().fetches, vec![7]);
    assert_eq!(surface.render_count(), 1);
    assert!(surface.markup().as_str().contains(r#"data-problem="7""#));
    assert!(bridge.interceptor().is_attached());
    assert!(!bridge.is_loading());
    // 初始快照为空，表单有字段，按钮可用
    assert!(!surface.buttons()[0].disabled);
}

#[tokio::test]
async fn test_duplicate_clicks_within_window_submit_once() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");

    let t0 = Instant::now();
    bridge.handle_event(click(FINAL), t0).await;
    bridge.handle_event(click(FINAL), t0 + ms(300)).await;
    assert_eq!(api.submit_count(), 1);

    // 尾端触发时答案未变，视为重复提交
    bridge.fire_due(t0 + ms(2000)).await;
    assert_eq!(api.submit_count(), 1);
}

#[tokio::test]
async fn test_changed_answer_in_window_sends_on_trailing_edge() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");

    let t0 = Instant::now();
    bridge.handle_event(click(FINAL), t0).await;
    surface.set_field("answer", "5");
    bridge.handle_event(click(FINAL), t0 + ms(300)).await;
    bridge.handle_event(click(FINAL), t0 + ms(600)).await;
    assert_eq!(api.submit_count(), 1);
    assert_eq!(bridge.interceptor().next_deadline(), Some(t0 + ms(2000)));

    bridge.fire_due(t0 + ms(2000)).await;
    let log = api.log();
    assert_eq!(log.submits.len(), 2);
    assert_eq!(log.submits[1].get("answer"), Some("5"));
}

#[tokio::test]
async fn test_submit_disables_buttons_and_reports_grade() {
    let (api, surface, mut bridge) = loaded(Problem::new(7)).await;
    let grades = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&grades);
    bridge
        .interceptor_mut()
        .set_grade_listener(move |grade| seen.borrow_mut().push(grade.id));

    surface.set_field("answer", "4");
    bridge.handle_event(click(FINAL), Instant::now()).await;

    assert_eq!(api.submit_count(), 1);
    assert_eq!(surface.render_count(), 2);
    assert!(surface.markup().as_str().contains("graded #1"));

    let button = &surface.buttons()[0];
    assert!(button.disabled);
    assert_eq!(button.value, "Submitted");
    assert_eq!(button.stash.as_deref(), Some("Submit Answers"));

    let status = bridge.status();
    assert!(status.last_submitted_at.is_some());
    assert_eq!(status.student_grade.as_ref().and_then(|g| g.id), Some(77));
    assert_eq!(*grades.borrow(), vec![Some(77)]);

    // 没有成绩记录的题目采用返回的成绩ID
    let ctx = bridge.interceptor().ctx().unwrap();
    assert_eq!(ctx.problem.saved_grade_id(), Some(77));
}

#[tokio::test]
async fn test_input_after_submit_restores_label() {
    let (_api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");
    bridge.handle_event(click(FINAL), Instant::now()).await;
    assert!(surface.buttons()[0].disabled);

    surface.type_into("answer", "5");
    bridge.pump_surface().await;

    let button = &surface.buttons()[0];
    assert!(!button.disabled);
    assert_eq!(button.value, "Submit Answers");
    assert_eq!(button.stash, None);
}

#[tokio::test]
async fn test_edit_back_to_submitted_answer_disables_again() {
    let (_api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");

    let t0 = Instant::now();
    bridge.handle_event(click(FINAL), t0).await;
    assert!(surface.buttons()[0].disabled);

    surface.set_field("answer", "5");
    bridge.handle_event(SurfaceEvent::Input, t0 + ms(100)).await;
    assert!(!surface.buttons()[0].disabled);
    assert_eq!(surface.buttons()[0].value, "Submit Answers");

    // 改回已提交的答案，刷新在节流窗口结束时执行
    surface.set_field("answer", "4");
    bridge.handle_event(SurfaceEvent::Input, t0 + ms(200)).await;
    assert!(!surface.buttons()[0].disabled);

    bridge.fire_due(t0 + ms(1100)).await;
    let button = &surface.buttons()[0];
    assert!(button.disabled);
    assert_eq!(button.value, "Submitted");
    assert_eq!(button.stash.as_deref(), Some("Submit Answers"));
}

#[tokio::test]
async fn test_snapshot_excludes_button_and_blocks_identical_resubmit() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");

    let t0 = Instant::now();
    bridge.handle_event(click(FINAL), t0).await;
    let snapshot = bridge.interceptor().snapshot();
    assert_eq!(snapshot.get("answer").cloned(), single("4"));
    assert!(!snapshot.contains(FINAL));
    assert_eq!(api.log().submits[0].get(FINAL), Some("1"));

    // 窗口已过，但答案与快照相同
    bridge.handle_event(click(FINAL), t0 + ms(3000)).await;
    assert_eq!(api.submit_count(), 1);

    surface.set_field("answer", "5");
    bridge.handle_event(click(FINAL), t0 + ms(6000)).await;
    assert_eq!(api.submit_count(), 2);
    assert_eq!(
        bridge.interceptor().snapshot().get("answer").cloned(),
        single("5")
    );
}

#[tokio::test]
async fn test_preview_action_is_not_deduplicated() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");

    let t0 = Instant::now();
    bridge.handle_event(click("previewAnswers"), t0).await;
    bridge.handle_event(click("previewAnswers"), t0 + ms(600)).await;

    assert_eq!(api.submit_count(), 2);
    // 预览不产生成绩
    assert!(bridge.status().last_submitted_at.is_none());
}

#[tokio::test]
async fn test_keystroke_burst_saves_once() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;

    let t0 = Instant::now();
    for i in 0..10u64 {
        surface.set_field("answer", &i.to_string());
        bridge.handle_event(SurfaceEvent::Input, t0 + ms(i * 100)).await;
    }
    assert_eq!(api.save_count(), 0);

    bridge.fire_due(t0 + ms(2899)).await;
    assert_eq!(api.save_count(), 0);

    bridge.fire_due(t0 + ms(2900)).await;
    let log = api.log();
    assert_eq!(log.saves.len(), 1);
    assert_eq!(log.saves[0].0, 42);
    assert_eq!(log.saves[0].1.get("answer").cloned(), single("9"));
    assert!(surface.prepare_calls() >= 1);
    drop(log);

    assert!(bridge.status().last_saved_at.is_some());
    assert_eq!(bridge.interceptor().state(), InterceptorState::Ready);
}

#[tokio::test]
async fn test_autosave_skipped_without_grade_id() {
    let (api, surface, mut bridge) = loaded(Problem::new(7)).await;

    let t0 = Instant::now();
    surface.set_field("answer", "4");
    bridge.handle_event(SurfaceEvent::Input, t0).await;
    bridge.fire_due(t0 + ms(5000)).await;

    assert_eq!(api.save_count(), 0);
    assert!(bridge.status().error.is_none());
}

#[tokio::test]
async fn test_applet_init_resolves_once() {
    let (api, surface, mut bridge) = fixture();
    surface.add_applet(
        "graph1",
        "initGraph",
        Some(Box::new(|args: Vec<Value>| json!(args.len()))),
    );
    bridge.load(Problem::new(7).with_grade(42), options()).await;

    assert!(bridge.is_loading());
    assert_eq!(bridge.pending_applet_inits(), 1);

    // 包装后的钩子原样返回原函数的结果
    assert_eq!(surface.fire_applet_init("initGraph", vec![json!("a")]), Some(json!(1)));
    assert_eq!(
        surface.fire_applet_init("initGraph", vec![json!("a"), json!("b")]),
        Some(json!(2))
    );

    assert!(bridge.next_applet_ready().await);
    assert!(!bridge.is_loading());
    assert!(!bridge.next_applet_ready().await);

    // 初始化完成后，小程序更新经防抖后写回表单并触发自动保存
    let t0 = Instant::now();
    bridge
        .handle_event(SurfaceEvent::AppletUpdate { key: "graph1".to_string() }, t0)
        .await;
    bridge.fire_due(t0 + ms(2000)).await;
    assert_eq!(surface.applet_prepares(), vec!["graph1".to_string()]);

    bridge.fire_due(t0 + ms(4000)).await;
    assert_eq!(api.save_count(), 1);
}

#[tokio::test]
async fn test_rerenders_leave_one_live_applet_wait() {
    let api = MockApi::default();
    let surface = MemorySurface::with_form(ACTION, vec![SubmitButton::new(FINAL, "Submit Answers")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    surface.add_applet(
        "graph1",
        "initGraph",
        Some(Box::new(move |_args: Vec<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Null
        })),
    );
    let settings = InterceptorSettings {
        preview_throttle: Duration::ZERO,
        ..InterceptorSettings::default()
    };
    let mut bridge = ProblemBridge::new(api.clone(), surface.clone(), settings, ms(100));
    bridge.load(Problem::new(7).with_grade(42), options()).await;

    let t0 = Instant::now();
    for i in 0..5u64 {
        surface.set_field("answer", &i.to_string());
        bridge.handle_event(click("previewAnswers"), t0 + ms(i * 10)).await;
    }
    assert_eq!(api.submit_count(), 5);
    assert_eq!(surface.render_count(), 6);
    assert_eq!(bridge.pending_applet_inits(), 1);

    surface.fire_applet_init("initGraph", vec![json!("a")]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(bridge.next_applet_ready().await);
    assert!(!bridge.next_applet_ready().await);
    assert!(!bridge.is_loading());
}

#[tokio::test]
async fn test_stale_load_response_is_discarded() {
    let (api, surface, mut bridge) = fixture();
    surface.set_action(None);

    let ticket_a = bridge.begin_load(Problem::new(7), options());
    let outcome_a = ContentLoader::fetch(&api, ticket_a, &options()).await;
    let ticket_b = bridge.begin_load(Problem::new(8), options());
    let outcome_b = ContentLoader::fetch(&api, ticket_b, &options()).await;

    assert!(bridge.complete_load(outcome_b).await);
    assert!(!bridge.complete_load(outcome_a).await);

    assert_eq!(surface.render_count(), 1);
    assert!(surface.markup().as_str().contains(r#"data-problem="8""#));
    assert_eq!(bridge.interceptor().ctx().map(|c| c.problem_id()), Some(8));
}

#[tokio::test]
async fn test_switching_problem_clears_history() {
    let (_api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");
    bridge.handle_event(click(FINAL), Instant::now()).await;
    assert!(bridge.status().last_submitted_at.is_some());

    surface.set_action(Some("/backend-api/courses/question/8?".to_string()));
    bridge.load(Problem::new(8), options()).await;

    assert!(bridge.status().last_submitted_at.is_none());
    assert!(bridge.interceptor().snapshot().is_empty());
    assert!(!surface.buttons()[0].disabled);
}

#[tokio::test]
async fn test_integrity_mismatch_detaches() {
    let (api, surface, mut bridge) = fixture();
    surface.set_action(Some("/backend-api/courses/question/99?workbookId=3".to_string()));
    bridge.load(Problem::new(7), options()).await;

    assert_eq!(
        bridge.interceptor().state(),
        InterceptorState::Error(ErrorKind::Integrity)
    );
    assert!(!bridge.interceptor().is_attached());
    assert!(bridge.status().error.is_some());

    surface.set_field("answer", "4");
    bridge.handle_event(click(FINAL), Instant::now()).await;
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test]
async fn test_missing_form_leaves_listeners_detached() {
    let (api, surface, mut bridge) = fixture();
    surface.set_has_form(false);
    surface.add_applet("graph1", "initGraph", None);
    bridge.load(Problem::new(7), options()).await;

    assert_eq!(bridge.interceptor().state(), InterceptorState::Ready);
    assert!(!bridge.interceptor().is_attached());
    // 小程序照常等待初始化
    assert_eq!(bridge.pending_applet_inits(), 1);
    assert!(bridge.is_loading());
    surface.fire_applet_init("initGraph", Vec::new());
    assert!(bridge.next_applet_ready().await);
    assert!(!bridge.is_loading());

    bridge.handle_event(click(FINAL), Instant::now()).await;
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test]
async fn test_failed_submit_keeps_surface_and_allows_retry() {
    let (api, surface, mut bridge) = loaded(Problem::new(7).with_grade(42)).await;
    surface.set_field("answer", "4");
    api.log().fail_submit = true;

    let t0 = Instant::now();
    bridge.handle_event(click(FINAL), t0).await;
    assert_eq!(
        bridge.interceptor().state(),
        InterceptorState::Error(ErrorKind::Submit)
    );
    assert_eq!(surface.render_count(), 1);
    assert!(bridge.status().error.is_some());
    assert!(bridge.interceptor().snapshot().is_empty());

    api.log().fail_submit = false;
    bridge.handle_event(click(FINAL), t0 + ms(2500)).await;
    assert_eq!(api.submit_count(), 1);
    assert_eq!(bridge.interceptor().state(), InterceptorState::Ready);
    assert!(bridge.status().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_loads_and_autosaves() {
    let (api, surface, mut bridge) = fixture();
    let (commands, receiver) = mpsc::unbounded_channel();

    let driver = async {
        commands
            .send(BridgeCommand::Load {
                problem: Problem::new(7).with_grade(42),
                options: options(),
            })
            .unwrap();
        tokio::time::sleep(ms(50)).await;
        surface.type_into("answer", "4");
        tokio::time::sleep(ms(5000)).await;
        commands.send(BridgeCommand::Shutdown).unwrap();
    };
    tokio::join!(bridge.run(receiver), driver);

    assert_eq!(api.log().fetches, vec![7]);
    assert_eq!(api.save_count(), 1);
    assert!(bridge.status().last_saved_at.is_some());
}

#[tokio::test]
#[ignore] // 需要本机浏览器开启调试端口：cargo test -- --ignored
async fn test_chromium_surface_renders_form() {
    logger::init();
    let config = Config::from_env();

    let (_browser, page) =
        connect_to_browser_and_page(config.browser_debug_port, &config.target_url, None)
            .await
            .expect("连接浏览器失败");
    let surface = ChromiumSurface::new(JsExecutor::new(page), FINAL);

    let markup = RenderedSurface::new(format!(
        r#"<form id="problemMainForm" action="{}"><input name="answer" value="4"><input type="submit" name="{}" value="Submit Answers"></form>"#,
        ACTION, FINAL
    ));
    surface.render(&markup).await.expect("渲染失败");

    assert!(surface.has_main_form().await.expect("查找表单失败"));
    assert_eq!(surface.form_action().await.expect("读取 action 失败").as_deref(), Some(ACTION));
    let form = surface.form_data().await.expect("读取表单失败");
    assert_eq!(form.get("answer"), Some("4"));
    assert_eq!(surface.submit_buttons().await.expect("读取按钮失败").len(), 1);
}
