//! VSM 传输层
//!
//! 负责与 vCenter / ESXi 管理端点之间的 SOAP 通信，提供两条逻辑独立的通道：
//!
//! - **主通道** (`VimPort` / `VimClient`): vim25 管理接口（登录、容器视图、属性检索、性能查询）
//! - **健康通道** (`HealthPort` / `VsanHealthClient`): vSAN 集群健康摘要接口，
//!   通过复用主通道的会话 Cookie 完成认证
//!
//! 证书信任策略通过 [`TrustPolicy`] 显式注入，仅作用于本层创建的 HTTP 客户端，
//! 不修改任何进程级状态。

pub mod binding;
pub mod config;
pub mod cookies;
pub mod envelope;
pub mod health;
pub mod types;
pub mod vim;
pub mod xml;

pub use binding::{health_endpoint, TransportBinding};
pub use config::{TransportConfig, TrustPolicy};
pub use cookies::derive_health_cookies;
pub use envelope::SoapFault;
pub use health::{
    ClusterHealthQuery, HealthHandshake, HealthPort, VsanClusterHealthGroup,
    VsanClusterHealthSummary, VsanClusterHealthTest, VsanHealthClient, DEFAULT_VSAN_NAMESPACE,
};
pub use types::{
    AboutInfo, DynamicProperty, ManagedObjectReference, MissingProperty, ObjectContent,
    ObjectSpec, PerfCounterInfo, PerfEntityMetric, PerfMetricId, PerfMetricSeries,
    PerfQuerySpec, PerfSampleInfo, PropertyFilterSpec, PropertySpec, RetrieveOptions,
    RetrieveResult, ServiceContent, TraversalSpec, UserSession,
};
pub use vim::{VimClient, VimPort};
pub use xml::XmlNode;

use thiserror::Error;

/// 传输层错误
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP 错误: {0}")]
    Http(String),

    #[error("SOAP 故障: {0}")]
    Fault(SoapFault),

    #[error("解析错误: {0}")]
    Parse(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("请求超时: {0}")]
    Timeout(String),

    #[error("通道未连接: {0}")]
    NotConnected(String),
}

impl TransportError {
    /// 若错误来自远端 SOAP 故障，返回故障内容
    pub fn fault(&self) -> Option<&SoapFault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<quick_xml::Error> for TransportError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(format!("无效的 URL: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
