pub mod form_interceptor;
pub mod problem_ctx;

pub use form_interceptor::{
    BridgeStatus, FormInterceptor, InterceptorSettings, InterceptorState, PendingApplet,
};
pub use problem_ctx::ProblemCtx;
