//! 题目上下文
//!
//! 封装"当前渲染的是哪道题、用什么参数加载"这一信息

use std::fmt::Display;

use crate::models::{LoadOptions, Problem};

/// 题目上下文
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemCtx {
    pub problem: Problem,
    pub options: LoadOptions,
}

impl ProblemCtx {
    pub fn new(problem: Problem, options: LoadOptions) -> Self {
        Self { problem, options }
    }

    pub fn problem_id(&self) -> u64 {
        self.problem.id
    }
}

impl Display for ProblemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.options.workbook_id {
            Some(workbook_id) => write!(f, "[题目 ID#{} 作业本#{}]", self.problem.id, workbook_id),
            None => write!(f, "[题目 ID#{}]", self.problem.id),
        }
    }
}
