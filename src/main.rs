use anyhow::Result;
use problem_iframe_bridge::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 可选参数：TOML 配置文件路径，否则读取环境变量
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };

    logger::init_with_verbose(config.verbose_logging);

    App::initialize(config).await?.run().await
}
