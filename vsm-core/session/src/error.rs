//! 会话层错误定义

use thiserror::Error;
use vsm_transport::TransportError;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 登录调用本身失败
    #[error("认证失败: {0}")]
    Authentication(#[source] TransportError),

    /// 远端报告会话已失效，调用方可重新 `connect`
    #[error("会话已失效: {0}")]
    SessionExpired(String),

    /// 引用的清单对象已被删除或尚未创建完成，调用方应重新枚举视图
    #[error("对象不存在: {0}")]
    ObjectGone(String),

    #[error("未知的性能计数器: {0}")]
    UnknownCounter(String),

    #[error("会话未连接")]
    NotConnected,

    #[error("会话已连接")]
    AlreadyConnected,

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("无数据: {0}")]
    NoData(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// 会话层结果类型
pub type Result<T> = std::result::Result<T, SessionError>;
