//! 浏览器连接：附着到已打开的调试端口，或启动一个无头实例

pub mod connection;
pub mod headless;

pub use connection::connect_to_browser_and_page;
pub use headless::launch_headless_browser;

use chromiumoxide::handler::Handler;
use futures::StreamExt;
use tracing::debug;

/// 在后台驱动 CDP 消息，连接断开时退出
fn spawn_handler(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                debug!("浏览器事件流结束");
                break;
            }
        }
    });
}
