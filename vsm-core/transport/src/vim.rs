//! vim25 主通道

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::TransportConfig;
use crate::envelope::{self, SoapRequest};
use crate::types::{
    ManagedObjectReference, PerfEntityMetric, PerfQuerySpec, PropertyFilterSpec,
    RetrieveOptions, RetrieveResult, ServiceContent, UserSession,
};
use crate::xml::XmlNode;
use crate::{Result, TransportError};

const VIM_NAMESPACE: &str = "urn:vim25";

/// vim25 管理接口
///
/// 会话层只通过这个 trait 访问主通道，测试时可替换为内存实现。
#[async_trait]
pub trait VimPort: Send + Sync {
    /// 获取服务描述（无需认证）
    async fn retrieve_service_content(
        &self,
        service_instance: &ManagedObjectReference,
    ) -> Result<ServiceContent>;

    /// 用户名/密码登录
    async fn login(
        &self,
        session_manager: &ManagedObjectReference,
        username: &str,
        password: &str,
    ) -> Result<UserSession>;

    /// 注销当前会话
    async fn logout(&self, session_manager: &ManagedObjectReference) -> Result<()>;

    /// 创建容器视图
    async fn create_container_view(
        &self,
        view_manager: &ManagedObjectReference,
        container: &ManagedObjectReference,
        types: &[String],
        recursive: bool,
    ) -> Result<ManagedObjectReference>;

    /// 检索属性（第一批）
    async fn retrieve_properties_ex(
        &self,
        property_collector: &ManagedObjectReference,
        specs: &[PropertyFilterSpec],
        options: &RetrieveOptions,
    ) -> Result<RetrieveResult>;

    /// 按 token 继续检索后续批次
    async fn continue_retrieve_properties_ex(
        &self,
        property_collector: &ManagedObjectReference,
        token: &str,
    ) -> Result<RetrieveResult>;

    /// 查询性能数据
    async fn query_perf(
        &self,
        perf_manager: &ManagedObjectReference,
        specs: &[PerfQuerySpec],
    ) -> Result<Vec<PerfEntityMetric>>;

    /// 主通道的 Cookie 存储（登录后包含会话 Cookie）
    fn cookie_store(&self) -> Arc<dyn CookieStore>;
}

/// 基于 reqwest 的 vim25 SOAP 客户端
pub struct VimClient {
    /// SDK 端点（如 `https://vcenter/sdk`）
    url: Url,

    /// HTTP 客户端
    http_client: Client,

    /// 会话 Cookie
    cookies: Arc<Jar>,

    /// 当前使用的 vim25 版本
    version: String,
}

impl VimClient {
    /// 创建客户端（未认证）
    pub fn new(url: &str, config: &TransportConfig) -> Result<Self> {
        let url = Url::parse(url)?;
        let cookies = Arc::new(Jar::default());

        if config.trust_policy.accept_invalid_certs() {
            warn!("主通道已关闭证书校验: {}", url);
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(config.trust_policy.accept_invalid_certs())
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            url,
            http_client,
            cookies,
            version: config.vim_version.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// 通过 `/sdk/vimServiceVersions.xml` 协商 vim25 版本
    ///
    /// 失败时保留配置中的默认版本。
    pub async fn negotiate_version(&mut self) -> &str {
        match self.fetch_service_version().await {
            Ok(Some(version)) => {
                info!("协商 vim25 版本: {}", version);
                self.version = version;
            }
            Ok(None) => warn!("vimServiceVersions.xml 中未找到 urn:vim25，使用默认版本 {}", self.version),
            Err(e) => warn!("协商 vim25 版本失败，使用默认版本 {}: {}", self.version, e),
        }
        &self.version
    }

    async fn fetch_service_version(&self) -> Result<Option<String>> {
        let versions_url = self.url.join("/sdk/vimServiceVersions.xml")?;
        debug!("获取服务版本: {}", versions_url);

        let response = self.http_client.get(versions_url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let text = response.text().await?;
        parse_service_versions(&text)
    }

    fn soap_action(&self) -> String {
        format!("{}/{}", VIM_NAMESPACE, self.version)
    }

    async fn invoke(&self, request: SoapRequest) -> Result<XmlNode> {
        envelope::call(&self.http_client, &self.url, &self.soap_action(), request.finish()).await
    }
}

#[async_trait]
impl VimPort for VimClient {
    async fn retrieve_service_content(
        &self,
        service_instance: &ManagedObjectReference,
    ) -> Result<ServiceContent> {
        let response = self
            .invoke(SoapRequest::new("RetrieveServiceContent", VIM_NAMESPACE).this(service_instance))
            .await?;
        ServiceContent::from_node(response.require("returnval")?)
    }

    async fn login(
        &self,
        session_manager: &ManagedObjectReference,
        username: &str,
        password: &str,
    ) -> Result<UserSession> {
        debug!("vim25 登录: {}", username);
        let response = self
            .invoke(
                SoapRequest::new("Login", VIM_NAMESPACE)
                    .this(session_manager)
                    .text("userName", username)
                    .text("password", password),
            )
            .await?;
        UserSession::from_node(response.require("returnval")?)
    }

    async fn logout(&self, session_manager: &ManagedObjectReference) -> Result<()> {
        self.invoke(SoapRequest::new("Logout", VIM_NAMESPACE).this(session_manager))
            .await?;
        Ok(())
    }

    async fn create_container_view(
        &self,
        view_manager: &ManagedObjectReference,
        container: &ManagedObjectReference,
        types: &[String],
        recursive: bool,
    ) -> Result<ManagedObjectReference> {
        let mut request = SoapRequest::new("CreateContainerView", VIM_NAMESPACE)
            .this(view_manager)
            .mor("container", container);
        for mo_type in types {
            request = request.text("type", mo_type);
        }
        let response = self.invoke(request.text("recursive", recursive)).await?;
        ManagedObjectReference::from_node(response.require("returnval")?)
    }

    async fn retrieve_properties_ex(
        &self,
        property_collector: &ManagedObjectReference,
        specs: &[PropertyFilterSpec],
        options: &RetrieveOptions,
    ) -> Result<RetrieveResult> {
        let mut request =
            SoapRequest::new("RetrievePropertiesEx", VIM_NAMESPACE).this(property_collector);
        for spec in specs {
            request = request.raw(&spec.to_xml());
        }
        let response = self.invoke(request.raw(&options.to_xml())).await?;

        // 没有匹配对象时服务端不返回 returnval
        match response.child("returnval") {
            Some(node) => RetrieveResult::from_node(node),
            None => Ok(RetrieveResult::default()),
        }
    }

    async fn continue_retrieve_properties_ex(
        &self,
        property_collector: &ManagedObjectReference,
        token: &str,
    ) -> Result<RetrieveResult> {
        let response = self
            .invoke(
                SoapRequest::new("ContinueRetrievePropertiesEx", VIM_NAMESPACE)
                    .this(property_collector)
                    .text("token", token),
            )
            .await?;
        match response.child("returnval") {
            Some(node) => RetrieveResult::from_node(node),
            None => Ok(RetrieveResult::default()),
        }
    }

    async fn query_perf(
        &self,
        perf_manager: &ManagedObjectReference,
        specs: &[PerfQuerySpec],
    ) -> Result<Vec<PerfEntityMetric>> {
        let mut request = SoapRequest::new("QueryPerf", VIM_NAMESPACE).this(perf_manager);
        for spec in specs {
            request = request.raw(&spec.to_xml());
        }
        let response = self.invoke(request).await?;
        response
            .children_named("returnval")
            .map(PerfEntityMetric::from_node)
            .collect()
    }

    fn cookie_store(&self) -> Arc<dyn CookieStore> {
        self.cookies.clone()
    }
}

/// 从 `vimServiceVersions.xml` 中取出 `urn:vim25` 的版本号
pub fn parse_service_versions(xml: &str) -> Result<Option<String>> {
    let root = XmlNode::parse(xml)?;
    let version = root
        .children_named("namespace")
        .find(|ns| ns.child_text("name").map(str::trim) == Some(VIM_NAMESPACE))
        .and_then(|ns| ns.child_text("version"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    Ok(version)
}
