use thiserror::Error;

/// 桥接层错误类型
///
/// 所有错误最终都会被转换为界面内联提示，不会让桥接层崩溃
#[derive(Debug, Error)]
pub enum BridgeError {
    /// 题目内容加载失败
    #[error("题目 {problem_id} 加载失败: {source}")]
    Load {
        problem_id: u64,
        #[source]
        source: ApiError,
    },
    /// 答案提交失败
    #[error("题目 {problem_id} 提交失败: {source}")]
    Submit {
        problem_id: u64,
        #[source]
        source: ApiError,
    },
    /// 自动保存失败
    #[error("成绩 {grade_id} 保存失败: {source}")]
    Save {
        grade_id: u64,
        #[source]
        source: ApiError,
    },
    /// 表单上报的题目ID与请求的不一致
    #[error("题目ID不同步: 请求 {expected}, 表单上报 {reported}")]
    Integrity { expected: u64, reported: u64 },
    /// 渲染表面操作失败
    #[error("渲染表面错误 ({context}): {source}")]
    Surface {
        context: ErrorKind,
        #[source]
        source: SurfaceError,
    },
}

/// 内联错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Load,
    Submit,
    Save,
    Integrity,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Load => "加载",
            ErrorKind::Submit => "提交",
            ErrorKind::Save => "保存",
            ErrorKind::Integrity => "校验",
        };
        f.write_str(name)
    }
}

impl BridgeError {
    /// 错误所属分类，决定状态机进入哪种错误状态
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Load { .. } => ErrorKind::Load,
            BridgeError::Submit { .. } => ErrorKind::Submit,
            BridgeError::Save { .. } => ErrorKind::Save,
            BridgeError::Integrity { .. } => ErrorKind::Integrity,
            BridgeError::Surface { context, .. } => *context,
        }
    }

    /// 包装渲染表面错误
    pub fn surface(context: ErrorKind, source: SurfaceError) -> Self {
        BridgeError::Surface { context, source }
    }
}

/// 后端 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回非成功状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message:?}")]
    BadStatus {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// 响应缺少必需字段
    #[error("API响应缺少字段 ({endpoint}): {field}")]
    MissingField { endpoint: String, field: String },
}

impl ApiError {
    /// 创建请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

/// 渲染表面错误
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// 执行页面脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 渲染表面不可用（尚未加载或已被替换）
    #[error("渲染表面不可用")]
    Unavailable,
    /// 页面返回的数据无法解码
    #[error("页面数据解码失败: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<chromiumoxide::error::CdpError> for SurfaceError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SurfaceError::ScriptFailed {
            source: Box::new(err),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

