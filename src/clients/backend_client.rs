/// 课程后端 API 客户端
///
/// 封装题目内容、答案提交、成绩保存三个接口
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::ProblemApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::responses::{ApiEnvelope, QuestionData, SaveData, SubmissionData};
use crate::models::{FormData, LoadOptions, RenderedSurface, SubmissionResult, SubmissionSnapshot};

/// 课程后端客户端
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// 创建新的后端客户端
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        if let Some(cookie) = &config.session_cookie {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                headers.insert(COOKIE, value);
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::request_failed("client", e))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn question_url(&self, problem_id: u64) -> String {
        format!("{}/courses/question/{}", self.base_url, problem_id)
    }

    fn grade_url(&self, grade_id: u64) -> String {
        format!("{}/courses/question/grade/{}", self.base_url, grade_id)
    }

    /// 发送请求并解析响应外壳中的 data
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::request_failed(endpoint, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(endpoint, e))?;

        debug!("{} -> {} ({} 字节)", endpoint, status, body.len());

        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.message);
            return Err(ApiError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&body).map_err(|source| ApiError::JsonParseFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        envelope.data.ok_or_else(|| ApiError::MissingField {
            endpoint: endpoint.to_string(),
            field: "data".to_string(),
        })
    }
}

impl ProblemApi for BackendClient {
    async fn fetch_problem(
        &self,
        problem_id: u64,
        options: &LoadOptions,
    ) -> Result<RenderedSurface, ApiError> {
        let url = self.question_url(problem_id);
        let request = self.http.get(&url).query(options);
        let data: QuestionData = self.send(&url, request).await?;

        extract_markup(&url, data.renderer_data)
    }

    async fn submit_answers(
        &self,
        problem_id: u64,
        form: &FormData,
    ) -> Result<SubmissionResult, ApiError> {
        let url = self.question_url(problem_id);
        let request = self.http.post(&url).form(form);
        let data: SubmissionData = self.send(&url, request).await?;

        Ok(SubmissionResult {
            rendered: extract_markup(&url, data.renderer_data)?,
            student_grade: data.student_grade,
        })
    }

    async fn save_grade(
        &self,
        grade_id: u64,
        snapshot: &SubmissionSnapshot,
    ) -> Result<u64, ApiError> {
        let url = self.grade_url(grade_id);
        let request = self
            .http
            .put(&url)
            .json(&json!({ "currentProblemState": snapshot }));
        let data: SaveData = self.send(&url, request).await?;

        Ok(data.updates_count)
    }
}

fn extract_markup(
    endpoint: &str,
    renderer_data: Option<crate::models::responses::RendererData>,
) -> Result<RenderedSurface, ApiError> {
    renderer_data
        .and_then(|r| r.rendered_html)
        .map(RenderedSurface::new)
        .ok_or_else(|| ApiError::MissingField {
            endpoint: endpoint.to_string(),
            field: "rendererData.renderedHTML".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let config = Config {
            api_base_url: "http://localhost:3001/backend-api/".to_string(),
            ..Config::default()
        };
        let client = BackendClient::new(&config).unwrap();

        assert_eq!(
            client.question_url(7),
            "http://localhost:3001/backend-api/courses/question/7"
        );
        assert_eq!(
            client.grade_url(3),
            "http://localhost:3001/backend-api/courses/question/grade/3"
        );
    }

    #[test]
    fn test_load_query_omits_missing_workbook() {
        let url = reqwest::Url::parse("http://h/q").unwrap();
        let client = Client::new();

        let request = client
            .get(url.clone())
            .query(&LoadOptions::default())
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("readonly=false"));

        let request = client
            .get(url)
            .query(&LoadOptions {
                workbook_id: Some(5),
                readonly: true,
            })
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("workbookId=5&readonly=true"));
    }

    #[test]
    fn test_missing_markup_is_an_error() {
        let err = extract_markup("/q", None).unwrap_err();
        assert!(matches!(err, ApiError::MissingField { .. }));
    }
}
