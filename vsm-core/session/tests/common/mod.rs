//! 测试用内存通道
//!
//! `FakeVim` / `FakeHealth` 记录所有发出的请求，并按预置队列返回结果。

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;
use vsm_session::{EndpointConfig, SessionManager, SessionOptions};
use vsm_transport::{
    AboutInfo, ClusterHealthQuery, DynamicProperty, HealthHandshake, HealthPort,
    ManagedObjectReference, ObjectContent, PerfCounterInfo, PerfEntityMetric, PerfQuerySpec,
    PropertyFilterSpec, Result, RetrieveOptions, RetrieveResult, ServiceContent, SoapFault,
    TransportBinding, TransportError, UserSession, VimPort, VsanClusterHealthSummary, XmlNode,
};

pub const SDK_URL: &str = "https://vcenter.local/sdk";
pub const SESSION_COOKIE: &str = "vmware_soap_session=52f0a1b2-fake";

/// 初始化测试日志
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn mor(mo_type: &str, value: &str) -> ManagedObjectReference {
    ManagedObjectReference::new(mo_type, value)
}

pub fn fault(message: &str) -> TransportError {
    TransportError::Fault(SoapFault::new("ServerFaultCode", message))
}

pub fn fault_with_detail(message: &str, node: &str) -> TransportError {
    TransportError::Fault(
        SoapFault::new("ServerFaultCode", message)
            .with_detail(XmlNode::new("detail").with_child(XmlNode::new(node))),
    )
}

pub fn counter(key: i32, group: &str, name: &str, rollup: &str) -> PerfCounterInfo {
    PerfCounterInfo {
        key,
        name_key: name.to_string(),
        group_key: group.to_string(),
        unit_key: "percent".to_string(),
        rollup_type: rollup.to_string(),
        stats_type: "rate".to_string(),
        level: Some(1),
    }
}

fn counter_node(c: &PerfCounterInfo) -> XmlNode {
    let keyed = |name: &str, key: &str| {
        XmlNode::new(name).with_child(XmlNode::new("key").with_text(key))
    };
    XmlNode::new("PerfCounterInfo")
        .with_child(XmlNode::new("key").with_text(c.key.to_string()))
        .with_child(keyed("nameInfo", &c.name_key))
        .with_child(keyed("groupInfo", &c.group_key))
        .with_child(keyed("unitInfo", &c.unit_key))
        .with_child(XmlNode::new("rollupType").with_text(c.rollup_type.clone()))
        .with_child(XmlNode::new("statsType").with_text(c.stats_type.clone()))
}

/// 构造一个带字符串属性的对象结果
pub fn object(obj: ManagedObjectReference, props: &[(&str, &str)]) -> ObjectContent {
    ObjectContent {
        obj,
        prop_set: props
            .iter()
            .map(|(name, val)| DynamicProperty {
                name: name.to_string(),
                val: XmlNode::new("val")
                    .with_attr("xsi:type", "xsd:string")
                    .with_text(*val),
            })
            .collect(),
        missing_set: Vec::new(),
    }
}

pub fn service_content() -> ServiceContent {
    ServiceContent {
        root_folder: mor("Folder", "group-d1"),
        property_collector: mor("PropertyCollector", "propertyCollector"),
        view_manager: mor("ViewManager", "ViewManager"),
        perf_manager: mor("PerformanceManager", "PerfMgr"),
        session_manager: mor("SessionManager", "SessionManager"),
        about: AboutInfo {
            name: "VMware vCenter Server".to_string(),
            api_type: "VirtualCenter".to_string(),
            api_version: "7.0.3.0".to_string(),
            ..Default::default()
        },
    }
}

/// 主通道记录的调用
#[derive(Debug, Clone)]
pub enum VimCall {
    RetrieveServiceContent,
    Login { username: String },
    Logout,
    CreateContainerView {
        container: ManagedObjectReference,
        types: Vec<String>,
        recursive: bool,
    },
    RetrieveProperties(PropertyFilterSpec),
    ContinueRetrieve(String),
    QueryPerf(Vec<PerfQuerySpec>),
}

pub struct FakeVim {
    pub sdk_url: Url,
    pub content: ServiceContent,
    pub cookies: Arc<Jar>,
    pub counters: Mutex<Vec<PerfCounterInfo>>,
    /// 计数器注册表检索失败时返回的错误
    pub registry_error: Mutex<Option<TransportError>>,
    pub calls: Mutex<Vec<VimCall>>,
    pub login_error: Mutex<Option<TransportError>>,
    pub logout_error: Mutex<Option<TransportError>>,
    pub property_responses: Mutex<VecDeque<Result<RetrieveResult>>>,
    pub continuations: Mutex<HashMap<String, RetrieveResult>>,
    pub perf_responses: Mutex<VecDeque<Result<Vec<PerfEntityMetric>>>>,
    view_seq: AtomicUsize,
}

impl FakeVim {
    pub fn new() -> Self {
        Self {
            sdk_url: Url::parse(SDK_URL).unwrap(),
            content: service_content(),
            cookies: Arc::new(Jar::default()),
            counters: Mutex::new(vec![counter(7, "cpu", "usage", "average")]),
            registry_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            login_error: Mutex::new(None),
            logout_error: Mutex::new(None),
            property_responses: Mutex::new(VecDeque::new()),
            continuations: Mutex::new(HashMap::new()),
            perf_responses: Mutex::new(VecDeque::new()),
            view_seq: AtomicUsize::new(0),
        }
    }

    pub fn with_counters(self, counters: Vec<PerfCounterInfo>) -> Self {
        *self.counters.lock().unwrap() = counters;
        self
    }

    pub fn push_properties(&self, response: Result<RetrieveResult>) {
        self.property_responses.lock().unwrap().push_back(response);
    }

    pub fn push_perf(&self, response: Result<Vec<PerfEntityMetric>>) {
        self.perf_responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<VimCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&VimCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(*c)).count()
    }

    /// 除计数器目录之外的属性检索请求
    pub fn property_requests(&self) -> Vec<PropertyFilterSpec> {
        let perf_manager = self.content.perf_manager.clone();
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VimCall::RetrieveProperties(spec) if spec.object_set[0].obj != perf_manager => {
                    Some(spec)
                }
                _ => None,
            })
            .collect()
    }

    pub fn perf_requests(&self) -> Vec<PerfQuerySpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VimCall::QueryPerf(specs) => Some(specs),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, call: VimCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn counter_registry(&self) -> RetrieveResult {
        let array = self
            .counters
            .lock()
            .unwrap()
            .iter()
            .fold(XmlNode::new("val").with_attr("xsi:type", "ArrayOfPerfCounterInfo"), |node, c| {
                node.with_child(counter_node(c))
            });
        RetrieveResult {
            token: None,
            objects: vec![ObjectContent {
                obj: self.content.perf_manager.clone(),
                prop_set: vec![DynamicProperty {
                    name: "perfCounter".to_string(),
                    val: array,
                }],
                missing_set: Vec::new(),
            }],
        }
    }
}

#[async_trait]
impl VimPort for FakeVim {
    async fn retrieve_service_content(
        &self,
        _service_instance: &ManagedObjectReference,
    ) -> Result<ServiceContent> {
        self.record(VimCall::RetrieveServiceContent);
        Ok(self.content.clone())
    }

    async fn login(
        &self,
        _session_manager: &ManagedObjectReference,
        username: &str,
        _password: &str,
    ) -> Result<UserSession> {
        self.record(VimCall::Login {
            username: username.to_string(),
        });
        if let Some(err) = self.login_error.lock().unwrap().take() {
            return Err(err);
        }
        self.cookies
            .add_cookie_str(&format!("{}; Path=/; HttpOnly; Secure", SESSION_COOKIE), &self.sdk_url);
        Ok(UserSession {
            key: "52f0a1b2-fake".to_string(),
            user_name: username.to_string(),
            full_name: Some("Administrator".to_string()),
            login_time: None,
        })
    }

    async fn logout(&self, _session_manager: &ManagedObjectReference) -> Result<()> {
        self.record(VimCall::Logout);
        match self.logout_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_container_view(
        &self,
        _view_manager: &ManagedObjectReference,
        container: &ManagedObjectReference,
        types: &[String],
        recursive: bool,
    ) -> Result<ManagedObjectReference> {
        self.record(VimCall::CreateContainerView {
            container: container.clone(),
            types: types.to_vec(),
            recursive,
        });
        let seq = self.view_seq.fetch_add(1, Ordering::SeqCst);
        Ok(mor("ContainerView", &format!("session[52f0a1b2]view-{}", seq)))
    }

    async fn retrieve_properties_ex(
        &self,
        _property_collector: &ManagedObjectReference,
        specs: &[PropertyFilterSpec],
        _options: &RetrieveOptions,
    ) -> Result<RetrieveResult> {
        let spec = specs[0].clone();
        let is_registry = spec.object_set[0].obj == self.content.perf_manager;
        self.record(VimCall::RetrieveProperties(spec));

        if is_registry {
            if let Some(err) = self.registry_error.lock().unwrap().take() {
                return Err(err);
            }
            return Ok(self.counter_registry());
        }
        self.property_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RetrieveResult::default()))
    }

    async fn continue_retrieve_properties_ex(
        &self,
        _property_collector: &ManagedObjectReference,
        token: &str,
    ) -> Result<RetrieveResult> {
        self.record(VimCall::ContinueRetrieve(token.to_string()));
        self.continuations
            .lock()
            .unwrap()
            .remove(token)
            .ok_or_else(|| fault("The specified token is not valid."))
    }

    async fn query_perf(
        &self,
        _perf_manager: &ManagedObjectReference,
        specs: &[PerfQuerySpec],
    ) -> Result<Vec<PerfEntityMetric>> {
        self.record(VimCall::QueryPerf(specs.to_vec()));
        self.perf_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn cookie_store(&self) -> Arc<dyn CookieStore> {
        self.cookies.clone()
    }
}

/// 健康通道收到的握手（Cookie 已展开为请求头文本）
#[derive(Debug, Clone)]
pub struct RecordedHandshake {
    pub namespace: String,
    pub url: Url,
    pub cookie_header: Option<String>,
    pub timeout: Duration,
}

pub struct FakeHealth {
    pub handshakes: Mutex<Vec<RecordedHandshake>>,
    pub queries: Mutex<Vec<(ManagedObjectReference, ClusterHealthQuery)>>,
    pub connect_error: Mutex<Option<TransportError>>,
    pub responses: Mutex<VecDeque<Result<VsanClusterHealthSummary>>>,
    connected: Mutex<bool>,
}

impl FakeHealth {
    pub fn new() -> Self {
        Self {
            handshakes: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            connect_error: Mutex::new(None),
            responses: Mutex::new(VecDeque::new()),
            connected: Mutex::new(false),
        }
    }

    pub fn push_response(&self, response: Result<VsanClusterHealthSummary>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}

#[async_trait]
impl HealthPort for FakeHealth {
    async fn connect(&self, handshake: HealthHandshake) -> Result<()> {
        let cookie_header = handshake
            .cookies
            .cookies(&handshake.url)
            .and_then(|h| h.to_str().ok().map(str::to_string));
        self.handshakes.lock().unwrap().push(RecordedHandshake {
            namespace: handshake.namespace,
            url: handshake.url,
            cookie_header,
            timeout: handshake.timeout,
        });

        if let Some(err) = self.connect_error.lock().unwrap().take() {
            return Err(err);
        }
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    async fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    async fn is_connected(&self) -> bool {
        self.connected()
    }

    async fn query_cluster_health_summary(
        &self,
        this: &ManagedObjectReference,
        query: &ClusterHealthQuery,
    ) -> Result<VsanClusterHealthSummary> {
        self.queries
            .lock()
            .unwrap()
            .push((this.clone(), query.clone()));
        if !self.connected() {
            return Err(TransportError::NotConnected("vSAN 健康通道".to_string()));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(VsanClusterHealthSummary::default()))
    }
}

pub fn endpoint() -> EndpointConfig {
    EndpointConfig::new("administrator@vsphere.local", "VMware1!", SDK_URL)
}

/// 用内存通道创建会话管理器（未登录）
pub async fn session_with(vim: Arc<FakeVim>, health: Arc<FakeHealth>) -> SessionManager {
    init_logging();
    let binding = TransportBinding::with_ports(
        Url::parse(SDK_URL).unwrap(),
        vim as Arc<dyn VimPort>,
        health as Arc<dyn HealthPort>,
    )
    .await
    .unwrap();
    SessionManager::with_binding(&endpoint(), SessionOptions::default(), binding)
}

/// 创建并登录
pub async fn connected_session() -> (SessionManager, Arc<FakeVim>, Arc<FakeHealth>) {
    let vim = Arc::new(FakeVim::new());
    let health = Arc::new(FakeHealth::new());
    let mut session = session_with(vim.clone(), health.clone()).await;
    session.connect().await.unwrap();
    (session, vim, health)
}
