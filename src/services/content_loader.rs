//! 题目内容加载 - 业务能力层
//!
//! 负责"拿到渲染内容"，并用代号丢弃过期的加载结果

use tracing::{debug, info};

use crate::clients::ProblemApi;
use crate::error::ApiError;
use crate::models::{LoadOptions, RenderedSurface};

/// 一次加载请求的凭据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub problem_id: u64,
}

/// 加载结果
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<RenderedSurface, ApiError>,
}

/// 内容加载器
///
/// 不排队也不取消在途请求，只保证过期结果不会被应用
#[derive(Debug, Default)]
pub struct ContentLoader {
    generation: u64,
}

impl ContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始新的加载，之前签发的凭据全部过期
    pub fn begin(&mut self, problem_id: u64) -> LoadTicket {
        self.generation += 1;
        debug!("签发加载凭据 #{} (题目 {})", self.generation, problem_id);
        LoadTicket {
            generation: self.generation,
            problem_id,
        }
    }

    /// 凭据是否仍对应当前题目
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 请求渲染内容
    pub async fn fetch<A: ProblemApi>(
        api: &A,
        ticket: LoadTicket,
        options: &LoadOptions,
    ) -> LoadOutcome {
        info!("[题目 ID#{}] 📥 正在加载题目内容...", ticket.problem_id);
        let result = api.fetch_problem(ticket.problem_id, options).await;
        LoadOutcome { ticket, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_load_invalidates_previous_ticket() {
        let mut loader = ContentLoader::new();
        let a = loader.begin(1);
        assert!(loader.is_current(&a));

        let b = loader.begin(2);
        assert!(!loader.is_current(&a));
        assert!(loader.is_current(&b));
    }

    #[test]
    fn test_reloading_same_problem_still_invalidates() {
        let mut loader = ContentLoader::new();
        let first = loader.begin(5);
        let second = loader.begin(5);
        assert_ne!(first, second);
        assert!(!loader.is_current(&first));
    }
}
