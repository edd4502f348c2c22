use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 题目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: u64,
    /// 当前学生在该题上的成绩记录，第一条用于自动保存
    #[serde(default)]
    pub grades: Vec<GradeEntry>,
}

impl Problem {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            grades: Vec::new(),
        }
    }

    pub fn with_grade(mut self, grade_id: u64) -> Self {
        self.grades.push(GradeEntry { id: Some(grade_id) });
        self
    }

    /// 可用于自动保存的成绩ID
    pub fn saved_grade_id(&self) -> Option<u64> {
        self.grades.first().and_then(|g| g.id)
    }
}

/// 成绩记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub id: Option<u64>,
}

/// 加载参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook_id: Option<u64>,
    pub readonly: bool,
}

/// 后端渲染出的题目标记，每次重新加载时整体替换
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSurface(String);

impl RenderedSurface {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 从表单 action 中解析题目ID
///
/// 形如 `/backend-api/courses/question/123?...`，不匹配时返回 None
pub fn reported_problem_id(action: &str) -> Option<u64> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"/backend-api/courses/question/([0-9]+)\?").ok())
        .as_ref()?;
    re.captures(action)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_problem_id() {
        assert_eq!(
            reported_problem_id("https://x.org/backend-api/courses/question/123?workbookId=4"),
            Some(123)
        );
        assert_eq!(reported_problem_id("/backend-api/courses/question/123"), None);
        assert_eq!(reported_problem_id("/render"), None);
    }

    #[test]
    fn test_saved_grade_id() {
        assert_eq!(Problem::new(1).saved_grade_id(), None);
        assert_eq!(Problem::new(1).with_grade(9).saved_grade_id(), Some(9));

        let unsaved = Problem {
            id: 1,
            grades: vec![GradeEntry { id: None }],
        };
        assert_eq!(unsaved.saved_grade_id(), None);
    }
}
