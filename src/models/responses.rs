//! 后端响应结构

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::problem::RenderedSurface;

/// 通用响应外壳：`{ "message": ..., "data": ... }`
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererData {
    #[serde(rename = "renderedHTML")]
    pub rendered_html: Option<String>,
}

/// 题目内容响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub renderer_data: Option<RendererData>,
}

/// 提交响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    pub renderer_data: Option<RendererData>,
    #[serde(default)]
    pub student_grade: Option<StudentGrade>,
}

/// 保存响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    #[serde(default)]
    pub updates_count: u64,
}

/// 后端计算出的学生成绩
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentGrade {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub rendered: RenderedSurface,
    pub student_grade: Option<StudentGrade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_envelope() {
        let body = r#"{
            "message": "ok",
            "data": {
                "rendererData": { "renderedHTML": "<form></form>" },
                "studentGrade": { "id": 12, "overallBestScore": 1 }
            }
        }"#;
        let envelope: ApiEnvelope<SubmissionData> = serde_json::from_str(body).unwrap();
        let data = envelope.data.unwrap();

        assert_eq!(
            data.renderer_data.unwrap().rendered_html.as_deref(),
            Some("<form></form>")
        );
        let grade = data.student_grade.unwrap();
        assert_eq!(grade.id, Some(12));
        assert_eq!(grade.extra.get("overallBestScore"), Some(&Value::from(1)));
    }

    #[test]
    fn test_save_envelope_defaults() {
        let envelope: ApiEnvelope<SaveData> = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert_eq!(envelope.data.unwrap().updates_count, 0);
    }
}
