//! 传输层配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 服务端证书信任策略
///
/// 只作用于传输层自己构建的 HTTP 客户端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// 按系统 CA 链校验证书
    Verify,
    /// 接受任意服务端证书（内网自签名端点）
    AcceptInvalidCerts,
}

impl TrustPolicy {
    pub fn accept_invalid_certs(&self) -> bool {
        matches!(self, Self::AcceptInvalidCerts)
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::AcceptInvalidCerts
    }
}

/// 传输层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 证书信任策略
    #[serde(default)]
    pub trust_policy: TrustPolicy,

    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// TCP 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// vSAN 健康通道握手/请求超时（秒）
    #[serde(default = "default_health_handshake_timeout")]
    pub health_handshake_timeout: u64,

    /// 协商失败时使用的 vim25 版本
    #[serde(default = "default_vim_version")]
    pub vim_version: String,

    /// 是否通过 vimServiceVersions.xml 协商协议版本
    #[serde(default = "default_negotiate_version")]
    pub negotiate_version: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            trust_policy: TrustPolicy::default(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            health_handshake_timeout: default_health_handshake_timeout(),
            vim_version: default_vim_version(),
            negotiate_version: default_negotiate_version(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn health_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.health_handshake_timeout)
    }

    /// 设置信任策略
    pub fn with_trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust_policy = policy;
        self
    }
}

// 默认值函数
fn default_request_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_health_handshake_timeout() -> u64 {
    30
}

fn default_vim_version() -> String {
    "6.7".to_string()
}

fn default_negotiate_version() -> bool {
    true
}
