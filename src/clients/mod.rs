pub mod backend_client;

pub use backend_client::BackendClient;

use crate::error::ApiError;
use crate::models::{FormData, LoadOptions, RenderedSurface, SubmissionResult, SubmissionSnapshot};

/// 后端能力：题目内容、答案提交、成绩保存
#[allow(async_fn_in_trait)]
pub trait ProblemApi {
    /// GET 题目渲染内容
    async fn fetch_problem(
        &self,
        problem_id: u64,
        options: &LoadOptions,
    ) -> Result<RenderedSurface, ApiError>;

    /// POST 表单字段（含动作按钮），返回新的渲染内容和成绩
    async fn submit_answers(
        &self,
        problem_id: u64,
        form: &FormData,
    ) -> Result<SubmissionResult, ApiError>;

    /// PUT 当前作答状态，返回更新条数
    async fn save_grade(
        &self,
        grade_id: u64,
        snapshot: &SubmissionSnapshot,
    ) -> Result<u64, ApiError>;
}
