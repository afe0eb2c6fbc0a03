//! 端点绑定
//!
//! 把一个 SDK 端点解析成两条通道与一份服务描述，供会话层使用。

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::config::TransportConfig;
use crate::health::{HealthPort, VsanHealthClient};
use crate::types::{AboutInfo, ManagedObjectReference, ServiceContent};
use crate::vim::{VimClient, VimPort};
use crate::Result;

/// 计算 vSAN 健康服务端点
///
/// 单台 ESXi 主机使用 `/vsan`，vCenter 使用 `/vsanHealth`；主机与端口沿用 SDK 端点。
pub fn health_endpoint(sdk_url: &Url, about: &AboutInfo) -> Result<Url> {
    let path = if about.is_host_agent() { "/vsan" } else { "/vsanHealth" };
    Ok(sdk_url.join(path)?)
}

/// 已绑定的端点
pub struct TransportBinding {
    pub sdk_url: Url,
    pub health_url: Url,
    pub content: ServiceContent,
    pub vim: Arc<dyn VimPort>,
    pub health: Arc<dyn HealthPort>,
}

impl TransportBinding {
    /// 连接真实端点：协商版本并获取服务描述（不登录）
    pub async fn open(url: &str, config: &TransportConfig) -> Result<Self> {
        let mut vim = VimClient::new(url, config)?;
        if config.negotiate_version {
            vim.negotiate_version().await;
        }

        let sdk_url = vim.url().clone();
        let health = Arc::new(VsanHealthClient::new(config));
        Self::with_ports(sdk_url, Arc::new(vim), health).await
    }

    /// 使用给定的通道实现绑定端点
    pub async fn with_ports(
        sdk_url: Url,
        vim: Arc<dyn VimPort>,
        health: Arc<dyn HealthPort>,
    ) -> Result<Self> {
        let content = vim
            .retrieve_service_content(&ManagedObjectReference::service_instance())
            .await?;
        let health_url = health_endpoint(&sdk_url, &content.about)?;

        info!(
            "已绑定端点: {} ({} {}, 健康服务 {})",
            sdk_url, content.about.api_type, content.about.api_version, health_url
        );

        Ok(Self {
            sdk_url,
            health_url,
            content,
            vim,
            health,
        })
    }
}
