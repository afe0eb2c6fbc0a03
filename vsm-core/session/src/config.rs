//! 端点与会话配置

use std::fmt;

use serde::{Deserialize, Serialize};
use vsm_transport::{TransportConfig, DEFAULT_VSAN_NAMESPACE};

/// 管理端点凭据
///
/// 创建后不再修改；`Debug` 与序列化输出都不包含密码。
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// SDK 端点（如 `https://vcenter.local/sdk`）
    pub url: String,
}

impl EndpointConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            url: url.into(),
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("username", &self.username)
            .field("password", &"******")
            .field("url", &self.url)
            .finish()
    }
}

/// 性能查询窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfWindow {
    /// 采样间隔（秒）
    #[serde(default = "default_interval_id")]
    pub interval_id: i32,

    /// 最近采样点个数
    #[serde(default = "default_max_sample")]
    pub max_sample: i32,
}

impl Default for PerfWindow {
    fn default() -> Self {
        Self {
            interval_id: default_interval_id(),
            max_sample: default_max_sample(),
        }
    }
}

/// 会话选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub perf_window: PerfWindow,

    /// vSAN 健康协议命名空间
    #[serde(default = "default_health_namespace")]
    pub health_namespace: String,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            perf_window: PerfWindow::default(),
            health_namespace: default_health_namespace(),
            transport: TransportConfig::default(),
        }
    }
}

// 默认值函数
fn default_interval_id() -> i32 {
    20
}

fn default_max_sample() -> i32 {
    15
}

fn default_health_namespace() -> String {
    DEFAULT_VSAN_NAMESPACE.to_string()
}
