//! 会话管理器
//!
//! 持有认证状态、两条通道、容器视图与计数器目录，并向外提供四类查询。

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;
use vsm_transport::{
    derive_health_cookies, ClusterHealthQuery, HealthHandshake, HealthPort,
    ManagedObjectReference, ObjectContent, ObjectSpec, PerfCounterInfo, PerfEntityMetric,
    PerfMetricId, PerfQuerySpec, PropertyFilterSpec, PropertySpec, RetrieveOptions,
    ServiceContent, TransportBinding, TransportError, TraversalSpec, UserSession, VimPort,
    VsanClusterHealthSummary, VsanHealthClient,
};

use crate::catalog::CounterCatalog;
use crate::classifier::{DefaultFaultClassifier, FaultClassifier};
use crate::config::{EndpointConfig, SessionOptions};
use crate::error::{Result, SessionError};
use crate::views::{ObjectKind, Views};

/// 认证状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 未登录（初始状态，以及注销之后）
    Pending,
    /// 已登录，视图与计数器目录可用
    Authenticated,
}

/// 会话管理器
///
/// `connect` / `disconnect` 需要 `&mut self`，查询只需要 `&self`；
/// 多个任务共享同一个管理器时由外层锁保证状态切换与查询互斥。
pub struct SessionManager {
    config: EndpointConfig,
    options: SessionOptions,

    sdk_url: Url,
    health_url: Url,
    content: ServiceContent,

    vim: Arc<dyn VimPort>,
    health: Arc<dyn HealthPort>,
    classifier: Arc<dyn FaultClassifier>,

    state: SessionState,
    user_session: Option<UserSession>,
    views: Option<Views>,
    catalog: Option<CounterCatalog>,
}

impl SessionManager {
    /// 连接端点并获取服务描述，此时尚未登录
    pub async fn open(config: &EndpointConfig, options: SessionOptions) -> Result<Self> {
        info!("打开会话: {}", config.url);
        let binding = TransportBinding::open(&config.url, &options.transport).await?;
        Ok(Self::with_binding(config, options, binding))
    }

    /// 使用已绑定的端点创建管理器
    pub fn with_binding(
        config: &EndpointConfig,
        options: SessionOptions,
        binding: TransportBinding,
    ) -> Self {
        Self {
            config: config.clone(),
            options,
            sdk_url: binding.sdk_url,
            health_url: binding.health_url,
            content: binding.content,
            vim: binding.vim,
            health: binding.health,
            classifier: Arc::new(DefaultFaultClassifier),
            state: SessionState::Pending,
            user_session: None,
            views: None,
            catalog: None,
        }
    }

    /// 替换故障分类器
    pub fn with_classifier(mut self, classifier: Arc<dyn FaultClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    // ============================================
    // 状态
    // ============================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    /// vSAN 健康服务端点
    pub fn health_endpoint(&self) -> &Url {
        &self.health_url
    }

    pub fn user_session(&self) -> Option<&UserSession> {
        self.user_session.as_ref()
    }

    /// 容器视图（仅在已登录时存在）
    pub fn views(&self) -> Option<&Views> {
        self.views.as_ref()
    }

    pub fn view(&self, kind: ObjectKind) -> Option<&ManagedObjectReference> {
        self.views.as_ref().map(|v| v.get(kind))
    }

    /// 计数器目录（仅在已登录时存在）
    pub fn catalog(&self) -> Option<&CounterCatalog> {
        self.catalog.as_ref()
    }

    // ============================================
    // 生命周期
    // ============================================

    /// 登录并准备视图、计数器目录与健康通道
    ///
    /// 已登录时返回 [`SessionError::AlreadyConnected`]，不发起任何远端调用。
    /// 登录之后的任一步骤失败都会中止连接：尝试注销远端会话，本地保持 `Pending`。
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_authenticated() {
            return Err(SessionError::AlreadyConnected);
        }

        info!("登录 {}: {}", self.config.url, self.config.username);
        let user_session = self
            .vim
            .login(
                &self.content.session_manager,
                &self.config.username,
                &self.config.password,
            )
            .await
            .map_err(|e| {
                warn!("登录失败: {}", e);
                SessionError::Authentication(e)
            })?;

        let (views, catalog) = match self.provision().await {
            Ok(provisioned) => provisioned,
            Err(e) => {
                warn!("登录后初始化失败，放弃本次连接: {}", e);
                self.health.disconnect().await;
                if let Err(logout_err) = self.vim.logout(&self.content.session_manager).await {
                    warn!("注销未完成的会话失败: {}", logout_err);
                }
                return Err(e);
            }
        };

        info!(
            "会话已建立: {} (性能计数器 {} 个)",
            user_session.user_name,
            catalog.len()
        );
        self.user_session = Some(user_session);
        self.views = Some(views);
        self.catalog = Some(catalog);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn provision(&self) -> Result<(Views, CounterCatalog)> {
        let views = self.create_views().await?;
        let catalog = self.build_catalog().await?;
        self.connect_health().await?;
        Ok((views, catalog))
    }

    async fn create_views(&self) -> Result<Views> {
        let mut created = Vec::with_capacity(ObjectKind::ALL.len());
        for kind in ObjectKind::ALL {
            let view = self
                .vim
                .create_container_view(
                    &self.content.view_manager,
                    &self.content.root_folder,
                    &[kind.type_name().to_string()],
                    true,
                )
                .await?;
            debug!("创建容器视图: {} -> {}", kind, view);
            created.push(view);
        }

        let mut created = created.into_iter();
        let mut next = || {
            created
                .next()
                .ok_or_else(|| SessionError::NoData("容器视图".to_string()))
        };
        Ok(Views {
            host: next()?,
            datastore: next()?,
            cluster: next()?,
            vm: next()?,
        })
    }

    async fn build_catalog(&self) -> Result<CounterCatalog> {
        let perf_manager = &self.content.perf_manager;
        let objects = self
            .retrieve_object(perf_manager, &["perfCounter"])
            .await
            .map_err(|e| self.classify_property_error(e))?;
        self.check_missing(&objects)?;

        let value = objects
            .iter()
            .find(|o| &o.obj == perf_manager)
            .and_then(|o| o.get("perfCounter"))
            .ok_or_else(|| SessionError::NoData(format!("{} 没有 perfCounter 属性", perf_manager)))?;

        let counters = PerfCounterInfo::list_from_node(value)?;
        debug!("计数器注册表返回 {} 个条目", counters.len());
        Ok(CounterCatalog::from_counters(counters))
    }

    /// 把主通道的会话 Cookie 交给健康通道
    async fn connect_health(&self) -> Result<()> {
        let cookies = derive_health_cookies(
            self.vim.cookie_store().as_ref(),
            &self.sdk_url,
            &self.health_url,
        );
        let handshake = HealthHandshake {
            namespace: self.options.health_namespace.clone(),
            url: self.health_url.clone(),
            cookies,
            timeout: self.options.transport.health_handshake_timeout(),
        };
        self.health.connect(handshake).await?;
        Ok(())
    }

    /// 注销会话
    ///
    /// 未登录时直接返回。无论远端注销是否成功，本地状态都会回到 `Pending`；
    /// 注销失败的错误在状态复位之后返回。
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_authenticated() {
            debug!("会话未登录，忽略注销");
            return Ok(());
        }

        info!("注销会话: {}", self.config.url);
        let result = self.vim.logout(&self.content.session_manager).await;

        self.health.disconnect().await;
        self.state = SessionState::Pending;
        self.user_session = None;
        self.views = None;
        self.catalog = None;

        result.map_err(|e| {
            warn!("远端注销失败，本地会话已复位: {}", e);
            SessionError::Transport(e)
        })
    }

    // ============================================
    // 查询
    // ============================================

    /// 查询容器视图中所有 `kind` 类型成员的属性
    ///
    /// 结果顺序由服务端决定，两次轮询之间不保证一致。
    pub async fn query_view_properties(
        &self,
        view: &ManagedObjectReference,
        kind: &str,
        properties: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        self.ensure_authenticated()?;
        Self::ensure_properties(properties)?;

        debug!("视图查询: {} ({}) {:?}", view, kind, properties);
        let mut object_spec = ObjectSpec::new(view.clone());
        object_spec.skip = true;
        object_spec.select_set.push(TraversalSpec::container_view());

        let spec = PropertyFilterSpec {
            prop_set: vec![PropertySpec::new(kind, to_paths(properties))],
            object_set: vec![object_spec],
        };

        let objects = self
            .retrieve_all(spec)
            .await
            .map_err(|e| self.classify_property_error(e))?;
        self.check_missing(&objects)?;
        Ok(objects)
    }

    /// 使用登录时创建的视图查询某类对象
    pub async fn query_kind_properties(
        &self,
        kind: ObjectKind,
        properties: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        let view = self.view(kind).ok_or(SessionError::NotConnected)?;
        self.query_view_properties(view, kind.type_name(), properties)
            .await
    }

    /// 查询单个对象的属性
    pub async fn query_object_properties(
        &self,
        obj: &ManagedObjectReference,
        properties: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        self.ensure_authenticated()?;
        Self::ensure_properties(properties)?;

        debug!("对象查询: {} {:?}", obj, properties);
        let objects = self
            .retrieve_object(obj, properties)
            .await
            .map_err(|e| self.classify_property_error(e))?;
        self.check_missing(&objects)?;
        Ok(objects)
    }

    /// 查询单个计数器最近一个窗口的采样
    pub async fn query_performance(
        &self,
        entity: &ManagedObjectReference,
        counter: &str,
    ) -> Result<PerfEntityMetric> {
        self.ensure_authenticated()?;
        let catalog = self.catalog.as_ref().ok_or(SessionError::NotConnected)?;
        let counter_id = catalog
            .counter_id(counter)
            .ok_or_else(|| SessionError::UnknownCounter(counter.to_string()))?;

        let window = self.options.perf_window;
        debug!(
            "性能查询: {} {} (ID {}, 间隔 {}s, {} 个采样)",
            entity, counter, counter_id, window.interval_id, window.max_sample
        );
        let spec = PerfQuerySpec::latest(
            entity.clone(),
            PerfMetricId::aggregate(counter_id),
            window.interval_id,
            window.max_sample,
        );

        let metrics = self
            .vim
            .query_perf(&self.content.perf_manager, &[spec])
            .await
            .map_err(|e| self.classify_session_error(e))?;

        metrics
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::NoData(format!("{} 没有 {} 的采样", entity, counter)))
    }

    /// 查询 vSAN 集群健康摘要
    pub async fn query_cluster_health(
        &self,
        cluster: &ManagedObjectReference,
        fields: &[&str],
        use_cache: bool,
    ) -> Result<VsanClusterHealthSummary> {
        self.ensure_authenticated()?;

        debug!("集群健康查询: {} {:?} (缓存: {})", cluster, fields, use_cache);
        let query = ClusterHealthQuery::new(cluster.clone(), to_paths(fields), use_cache);
        self.health
            .query_cluster_health_summary(&VsanHealthClient::cluster_health_system(), &query)
            .await
            .map_err(|e| self.classify_session_error(e))
    }

    // ============================================
    // 内部辅助
    // ============================================

    fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn ensure_properties(properties: &[&str]) -> Result<()> {
        if properties.is_empty() {
            return Err(SessionError::InvalidArgument("属性列表不能为空".to_string()));
        }
        Ok(())
    }

    async fn retrieve_object(
        &self,
        obj: &ManagedObjectReference,
        properties: &[&str],
    ) -> std::result::Result<Vec<ObjectContent>, TransportError> {
        let spec = PropertyFilterSpec {
            prop_set: vec![PropertySpec::new(obj.mo_type.clone(), to_paths(properties))],
            object_set: vec![ObjectSpec::new(obj.clone())],
        };
        self.retrieve_all(spec).await
    }

    /// 检索并按 token 拼接所有批次
    async fn retrieve_all(
        &self,
        spec: PropertyFilterSpec,
    ) -> std::result::Result<Vec<ObjectContent>, TransportError> {
        let collector = &self.content.property_collector;
        let mut batch = self
            .vim
            .retrieve_properties_ex(collector, &[spec], &RetrieveOptions::default())
            .await?;
        let mut objects = std::mem::take(&mut batch.objects);

        while let Some(token) = batch.token.take() {
            debug!("继续检索: {}", token);
            batch = self
                .vim
                .continue_retrieve_properties_ex(collector, &token)
                .await?;
            objects.append(&mut batch.objects);
        }

        Ok(objects)
    }

    /// 属性级 `NotAuthenticated` 故障视为会话失效
    fn check_missing(&self, objects: &[ObjectContent]) -> Result<()> {
        for object in objects {
            for missing in &object.missing_set {
                if self.classifier.is_missing_unauthenticated(missing) {
                    warn!("属性 {}.{} 报告会话未认证", object.obj, missing.path);
                    return Err(SessionError::SessionExpired(
                        missing
                            .localized_message()
                            .unwrap_or("NotAuthenticated")
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn classify_property_error(&self, err: TransportError) -> SessionError {
        if let Some(fault) = err.fault() {
            if self.classifier.is_object_gone(fault) {
                warn!("对象已不存在: {}", fault);
                return SessionError::ObjectGone(fault.message.clone());
            }
        }
        self.classify_session_error(err)
    }

    fn classify_session_error(&self, err: TransportError) -> SessionError {
        if let Some(fault) = err.fault() {
            if self.classifier.is_session_expired(fault) {
                warn!("会话已失效: {}", fault);
                return SessionError::SessionExpired(fault.message.clone());
            }
        }
        SessionError::Transport(err)
    }
}

fn to_paths(properties: &[&str]) -> Vec<String> {
    properties.iter().map(|p| p.to_string()).collect()
}
