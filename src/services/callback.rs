//! 回调转 Future 适配器 - 业务能力层
//!
//! 把回调风格的初始化钩子包装成"可等待一次"的信号，调用方无需改动

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

/// 一次性初始化信号
///
/// 只会被包装函数的第一次调用完成；包装函数被丢弃时永远保持挂起，
/// 需要超时的调用方自行处理
#[derive(Debug)]
pub struct PendingInit<A> {
    receiver: oneshot::Receiver<A>,
    resolved: Arc<AtomicBool>,
}

impl<A> PendingInit<A> {
    /// 等待第一次调用的参数
    pub async fn wait(self) -> A {
        match self.receiver.await {
            Ok(args) => args,
            Err(_) => std::future::pending().await,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}

/// 包装回调
///
/// 返回的函数先调用原函数并原样返回其结果，再用本次参数完成信号；
/// 之后的调用照常转发给原函数，参数不再进入信号
pub fn dress<A, R, F>(mut original: F) -> (impl FnMut(A) -> R + Send + 'static, PendingInit<A>)
where
    A: Clone + Send + 'static,
    R: 'static,
    F: FnMut(A) -> R + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let resolved = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&resolved);
    let mut sender = Some(sender);

    let dressed = move |args: A| {
        let output = original(args.clone());
        if let Some(sender) = sender.take() {
            flag.store(true, Ordering::Release);
            let _ = sender.send(args);
        }
        output
    };

    (dressed, PendingInit { receiver, resolved })
}
