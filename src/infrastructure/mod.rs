//! 基础设施层 - 持有稀缺资源（Page / 渲染表面），只暴露能力

pub mod chromium_surface;
pub mod js_executor;
pub mod memory_surface;
pub mod surface;

pub use chromium_surface::ChromiumSurface;
pub use js_executor::JsExecutor;
pub use memory_surface::MemorySurface;
pub use surface::{AppletDescriptor, ClickedButton, FormSurface, InitHook, SurfaceEvent};
