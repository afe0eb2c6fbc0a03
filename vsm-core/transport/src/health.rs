//! vSAN 集群健康通道
//!
//! 该通道没有独立的凭据：`connect` 时注入从主通道派生的 Cookie 存储，
//! 之后每次请求都携带主会话的 Cookie。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::config::TransportConfig;
use crate::envelope::{self, SoapRequest};
use crate::types::{parse_timestamp, ManagedObjectReference};
use crate::xml::XmlNode;
use crate::{Result, TransportError};

/// 默认 vSAN 命名空间，由服务端选择其支持的最新版本
pub const DEFAULT_VSAN_NAMESPACE: &str = "urn:vsan";

/// 健康通道握手参数
#[derive(Debug, Clone)]
pub struct HealthHandshake {
    /// 协议命名空间（同时用作 SOAPAction）
    pub namespace: String,
    /// 健康服务端点
    pub url: Url,
    /// 从主通道派生的 Cookie
    pub cookies: Arc<Jar>,
    /// 请求超时
    pub timeout: Duration,
}

/// 集群健康摘要查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHealthQuery {
    pub cluster: ManagedObjectReference,
    pub vm_create_timeout: i32,
    pub include_obj_uuids: bool,
    /// 需要返回的摘要字段
    pub fields: Vec<String>,
    /// 使用缓存结果还是重新计算
    pub fetch_from_cache: bool,
    pub perspective: String,
}

impl ClusterHealthQuery {
    pub fn new(cluster: ManagedObjectReference, fields: Vec<String>, fetch_from_cache: bool) -> Self {
        Self {
            cluster,
            vm_create_timeout: 0,
            include_obj_uuids: false,
            fields,
            fetch_from_cache,
            perspective: "defaultView".to_string(),
        }
    }

    /// 构建 `VsanQueryVcClusterHealthSummary` 请求
    pub fn to_request(&self, this: &ManagedObjectReference, namespace: &str) -> SoapRequest {
        let mut request = SoapRequest::new("VsanQueryVcClusterHealthSummary", namespace)
            .this(this)
            .mor("cluster", &self.cluster)
            .text("vmCreateTimeout", self.vm_create_timeout)
            .text("includeObjUuids", self.include_obj_uuids);
        for field in &self.fields {
            request = request.text("fields", field);
        }
        request
            .text("fetchFromCache", self.fetch_from_cache)
            .text("perspective", &self.perspective)
    }
}

/// 单项健康检查
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsanClusterHealthTest {
    pub test_id: String,
    pub test_name: String,
    pub test_health: String,
}

/// 健康检查分组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsanClusterHealthGroup {
    pub group_id: String,
    pub group_name: String,
    pub group_health: String,
    pub group_tests: Vec<VsanClusterHealthTest>,
}

impl VsanClusterHealthGroup {
    fn from_node(node: &XmlNode) -> Self {
        let text = |n: &XmlNode, name: &str| n.child_text(name).unwrap_or_default().to_string();
        Self {
            group_id: text(node, "groupId"),
            group_name: text(node, "groupName"),
            group_health: text(node, "groupHealth"),
            group_tests: node
                .children_named("groupTests")
                .map(|t| VsanClusterHealthTest {
                    test_id: text(t, "testId"),
                    test_name: text(t, "testName"),
                    test_health: text(t, "testHealth"),
                })
                .collect(),
        }
    }
}

/// vSAN 集群健康摘要
///
/// 只有调用方请求过的字段才会有值；各子系统详情保持为原始节点。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VsanClusterHealthSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub groups: Vec<VsanClusterHealthGroup>,
    pub overall_health: Option<String>,
    pub overall_health_description: Option<String>,
    pub encryption_health: Option<XmlNode>,
    pub file_service_health: Option<XmlNode>,
    pub limit_health: Option<XmlNode>,
    pub network_health: Option<XmlNode>,
    pub object_health: Option<XmlNode>,
    pub perfsvc_health: Option<XmlNode>,
}

impl VsanClusterHealthSummary {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let timestamp = match node.child_text("timestamp") {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                TransportError::Parse(format!("无效的时间戳: {}", raw))
            })?),
            None => None,
        };

        Ok(Self {
            timestamp,
            groups: node
                .children_named("groups")
                .map(VsanClusterHealthGroup::from_node)
                .collect(),
            overall_health: node.child_text("overallHealth").map(str::to_string),
            overall_health_description: node
                .child_text("overallHealthDescription")
                .map(str::to_string),
            encryption_health: node.child("encryptionHealth").cloned(),
            file_service_health: node.child("fileServiceHealth").cloned(),
            limit_health: node.child("limitHealth").cloned(),
            network_health: node.child("networkHealth").cloned(),
            object_health: node.child("objectHealth").cloned(),
            perfsvc_health: node.child("perfsvcHealth").cloned(),
        })
    }
}

/// vSAN 健康接口
#[async_trait]
pub trait HealthPort: Send + Sync {
    /// 使用派生的 Cookie 建立通道
    async fn connect(&self, handshake: HealthHandshake) -> Result<()>;

    /// 丢弃通道状态（包括 Cookie）
    async fn disconnect(&self);

    async fn is_connected(&self) -> bool;

    /// 查询集群健康摘要
    async fn query_cluster_health_summary(
        &self,
        this: &ManagedObjectReference,
        query: &ClusterHealthQuery,
    ) -> Result<VsanClusterHealthSummary>;
}

/// 已建立的健康通道
struct HealthSession {
    http_client: Client,
    url: Url,
    namespace: String,
}

/// 基于 reqwest 的 vSAN 健康 SOAP 客户端
pub struct VsanHealthClient {
    accept_invalid_certs: bool,
    connect_timeout: Duration,
    session: RwLock<Option<HealthSession>>,
}

impl VsanHealthClient {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            accept_invalid_certs: config.trust_policy.accept_invalid_certs(),
            connect_timeout: config.connect_timeout(),
            session: RwLock::new(None),
        }
    }

    /// 固定的集群健康系统对象
    pub fn cluster_health_system() -> ManagedObjectReference {
        ManagedObjectReference::new("VsanVcClusterHealthSystem", "vsan-cluster-health-system")
    }
}

#[async_trait]
impl HealthPort for VsanHealthClient {
    async fn connect(&self, handshake: HealthHandshake) -> Result<()> {
        info!("建立 vSAN 健康通道: {} ({})", handshake.url, handshake.namespace);

        let http_client = Client::builder()
            .timeout(handshake.timeout)
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .cookie_provider(handshake.cookies)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        *self.session.write().await = Some(HealthSession {
            http_client,
            url: handshake.url,
            namespace: handshake.namespace,
        });
        Ok(())
    }

    async fn disconnect(&self) {
        if self.session.write().await.take().is_some() {
            debug!("vSAN 健康通道已关闭");
        }
    }

    async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn query_cluster_health_summary(
        &self,
        this: &ManagedObjectReference,
        query: &ClusterHealthQuery,
    ) -> Result<VsanClusterHealthSummary> {
        let guard = self.session.read().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| TransportError::NotConnected("vSAN 健康通道".to_string()))?;

        debug!("查询集群健康摘要: {} (缓存: {})", query.cluster, query.fetch_from_cache);
        let body = query.to_request(this, &session.namespace).finish();
        let response =
            envelope::call(&session.http_client, &session.url, &session.namespace, body).await?;
        VsanClusterHealthSummary::from_node(response.require("returnval")?)
    }
}
