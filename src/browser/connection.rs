use anyhow::Result;
use chromiumoxide::{Browser, Page};
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::spawn_handler;

/// 连接到调试端口上的浏览器，并准备一个承载题目的页面
///
/// 给定 `target_title` 时优先复用标题匹配的已有页面，否则新建页面并导航到 `target_url`
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: &str,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    spawn_handler(handler);

    // 等待浏览器同步已有页面
    sleep(tokio::time::Duration::from_millis(300)).await;

    if let Some(title) = target_title {
        for p in browser.pages().await? {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 复用已有页面: {}", page_title);
                    return Ok((browser, p));
                }
            }
        }
        debug!("未找到标题包含 '{}' 的页面，将创建新页面", title);
    }

    let page = browser.new_page(target_url).await.map_err(|e| {
        error!("创建页面 {} 失败: {}", target_url, e);
        e
    })?;
    info!("✓ 题目页面已就绪: {}", target_url);

    Ok((browser, page))
}
