//! vim25 数据类型
//!
//! 仅覆盖会话层需要的部分：服务描述、属性检索规格与结果、性能计数器与查询。
//! 每个请求类型提供 `to_xml`，每个响应类型提供 `from_node`。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::xml::{escape, XmlNode};
use crate::{Result, TransportError};

/// 托管对象引用
///
/// 远端对象的不透明句柄，按 `(type, value)` 比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    /// 对象类型（如 `HostSystem`）
    #[serde(rename = "type")]
    pub mo_type: String,
    /// 对象 ID（如 `host-10`）
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(mo_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            mo_type: mo_type.into(),
            value: value.into(),
        }
    }

    /// 根对象 `ServiceInstance`
    pub fn service_instance() -> Self {
        Self::new("ServiceInstance", "ServiceInstance")
    }

    pub fn to_xml(&self, tag: &str) -> String {
        format!(
            "<{tag} type=\"{}\">{}</{tag}>",
            escape(&self.mo_type),
            escape(&self.value)
        )
    }

    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let mo_type = node.attr("type").ok_or_else(|| {
            TransportError::Parse(format!("<{}> 缺少 type 属性", node.name))
        })?;
        Ok(Self::new(mo_type, node.text.trim()))
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mo_type, self.value)
    }
}

/// 端点产品信息（`ServiceContent.about` 子集）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AboutInfo {
    pub name: String,
    pub full_name: String,
    pub version: String,
    pub build: String,
    /// `VirtualCenter` 或 `HostAgent`
    pub api_type: String,
    pub api_version: String,
    pub instance_uuid: Option<String>,
}

impl AboutInfo {
    fn from_node(node: &XmlNode) -> Result<Self> {
        Ok(Self {
            name: node.child_text("name").unwrap_or_default().to_string(),
            full_name: node.child_text("fullName").unwrap_or_default().to_string(),
            version: node.child_text("version").unwrap_or_default().to_string(),
            build: node.child_text("build").unwrap_or_default().to_string(),
            api_type: node.require_text("apiType")?.to_string(),
            api_version: node.child_text("apiVersion").unwrap_or_default().to_string(),
            instance_uuid: node.child_text("instanceUuid").map(str::to_string),
        })
    }

    /// 端点是否为单台 ESXi 主机
    pub fn is_host_agent(&self) -> bool {
        self.api_type == "HostAgent"
    }
}

/// 服务描述（`RetrieveServiceContent` 的返回值子集）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContent {
    pub root_folder: ManagedObjectReference,
    pub property_collector: ManagedObjectReference,
    pub view_manager: ManagedObjectReference,
    pub perf_manager: ManagedObjectReference,
    pub session_manager: ManagedObjectReference,
    pub about: AboutInfo,
}

impl ServiceContent {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let mor = |name: &str| -> Result<ManagedObjectReference> {
            ManagedObjectReference::from_node(node.require(name)?)
        };

        Ok(Self {
            root_folder: mor("rootFolder")?,
            property_collector: mor("propertyCollector")?,
            view_manager: mor("viewManager")?,
            perf_manager: mor("perfManager")?,
            session_manager: mor("sessionManager")?,
            about: AboutInfo::from_node(node.require("about")?)?,
        })
    }
}

/// 登录返回的用户会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub key: String,
    pub user_name: String,
    pub full_name: Option<String>,
    pub login_time: Option<DateTime<Utc>>,
}

impl UserSession {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        Ok(Self {
            key: node.require_text("key")?.to_string(),
            user_name: node.require_text("userName")?.to_string(),
            full_name: node.child_text("fullName").map(str::to_string),
            login_time: node.child_text("loginTime").and_then(parse_timestamp),
        })
    }
}

// ============================================
// 属性检索
// ============================================

/// 属性选择规格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub mo_type: String,
    pub all: bool,
    pub path_set: Vec<String>,
}

impl PropertySpec {
    pub fn new(mo_type: impl Into<String>, path_set: Vec<String>) -> Self {
        Self {
            mo_type: mo_type.into(),
            all: false,
            path_set,
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            "<propSet><type>{}</type><all>{}</all>",
            escape(&self.mo_type),
            self.all
        );
        for path in &self.path_set {
            xml.push_str(&format!("<pathSet>{}</pathSet>", escape(path)));
        }
        xml.push_str("</propSet>");
        xml
    }
}

/// 遍历规格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalSpec {
    pub name: String,
    pub mo_type: String,
    pub path: String,
    pub skip: bool,
}

impl TraversalSpec {
    /// 沿容器视图的 `view` 属性遍历一层成员
    pub fn container_view() -> Self {
        Self {
            name: "traverseEntities".to_string(),
            mo_type: "ContainerView".to_string(),
            path: "view".to_string(),
            skip: false,
        }
    }

    pub fn to_xml(&self) -> String {
        format!(
            "<selectSet xsi:type=\"TraversalSpec\"><name>{}</name><type>{}</type><path>{}</path><skip>{}</skip></selectSet>",
            escape(&self.name),
            escape(&self.mo_type),
            escape(&self.path),
            self.skip
        )
    }
}

/// 对象选择规格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpec {
    pub obj: ManagedObjectReference,
    pub skip: bool,
    pub select_set: Vec<TraversalSpec>,
}

impl ObjectSpec {
    pub fn new(obj: ManagedObjectReference) -> Self {
        Self {
            obj,
            skip: false,
            select_set: Vec::new(),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!("<objectSet>{}<skip>{}</skip>", self.obj.to_xml("obj"), self.skip);
        for select in &self.select_set {
            xml.push_str(&select.to_xml());
        }
        xml.push_str("</objectSet>");
        xml
    }
}

/// 属性过滤规格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilterSpec {
    pub prop_set: Vec<PropertySpec>,
    pub object_set: Vec<ObjectSpec>,
}

impl PropertyFilterSpec {
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<specSet>");
        for prop in &self.prop_set {
            xml.push_str(&prop.to_xml());
        }
        for obj in &self.object_set {
            xml.push_str(&obj.to_xml());
        }
        xml.push_str("</specSet>");
        xml
    }
}

/// 检索选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveOptions {
    /// 单批返回的最大对象数，`None` 表示由服务端决定
    pub max_objects: Option<i32>,
}

impl RetrieveOptions {
    pub fn to_xml(&self) -> String {
        match self.max_objects {
            Some(max) => format!("<options><maxObjects>{}</maxObjects></options>", max),
            None => "<options></options>".to_string(),
        }
    }
}

/// 单个属性值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicProperty {
    pub name: String,
    pub val: XmlNode,
}

/// 未能返回的属性及其故障
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingProperty {
    pub path: String,
    /// `LocalizedMethodFault` 节点
    pub fault: XmlNode,
}

impl MissingProperty {
    /// 内层故障类型（如 `NotAuthenticated`）
    pub fn fault_type(&self) -> Option<&str> {
        self.fault
            .child("fault")
            .and_then(XmlNode::xsi_type)
            .map(|t| t.rsplit(':').next().unwrap_or(t))
    }

    pub fn localized_message(&self) -> Option<&str> {
        self.fault.child_text("localizedMessage")
    }
}

/// 单个对象的检索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectContent {
    pub obj: ManagedObjectReference,
    pub prop_set: Vec<DynamicProperty>,
    pub missing_set: Vec<MissingProperty>,
}

impl ObjectContent {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let obj = ManagedObjectReference::from_node(node.require("obj")?)?;

        let prop_set = node
            .children_named("propSet")
            .map(|p| {
                Ok(DynamicProperty {
                    name: p.require_text("name")?.to_string(),
                    val: p.require("val")?.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let missing_set = node
            .children_named("missingSet")
            .map(|m| {
                Ok(MissingProperty {
                    path: m.require_text("path")?.to_string(),
                    fault: m.require("fault")?.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            obj,
            prop_set,
            missing_set,
        })
    }

    /// 按属性路径取值
    pub fn get(&self, name: &str) -> Option<&XmlNode> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }
}

/// `RetrievePropertiesEx` 的一批结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveResult {
    /// 存在时表示还有后续批次
    pub token: Option<String>,
    pub objects: Vec<ObjectContent>,
}

impl RetrieveResult {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        Ok(Self {
            token: node.child_text("token").map(str::to_string),
            objects: node
                .children_named("objects")
                .map(ObjectContent::from_node)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

// ============================================
// 性能计数器
// ============================================

/// 性能计数器描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfCounterInfo {
    /// 会话内的计数器 ID
    pub key: i32,
    pub name_key: String,
    pub group_key: String,
    pub unit_key: String,
    pub rollup_type: String,
    pub stats_type: String,
    pub level: Option<i32>,
}

impl PerfCounterInfo {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let element_key = |name: &str| -> Result<String> {
            Ok(node.require(name)?.require_text("key")?.to_string())
        };

        Ok(Self {
            key: node.parse_child("key")?,
            name_key: element_key("nameInfo")?,
            group_key: element_key("groupInfo")?,
            unit_key: node
                .child("unitInfo")
                .and_then(|u| u.child_text("key"))
                .unwrap_or_default()
                .to_string(),
            rollup_type: node.require_text("rollupType")?.to_string(),
            stats_type: node.child_text("statsType").unwrap_or_default().to_string(),
            level: node.child_text("level").and_then(|l| l.trim().parse().ok()),
        })
    }

    /// 解析 `perfCounter` 属性值（`ArrayOfPerfCounterInfo`）
    pub fn list_from_node(node: &XmlNode) -> Result<Vec<Self>> {
        node.children_named("PerfCounterInfo")
            .map(Self::from_node)
            .collect()
    }

    /// `group.metric.rollup` 形式的计数器名
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.group_key, self.name_key, self.rollup_type)
    }
}

/// 计数器与实例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfMetricId {
    pub counter_id: i32,
    /// 空字符串表示聚合值
    pub instance: String,
}

impl PerfMetricId {
    /// 聚合实例（`""`）
    pub fn aggregate(counter_id: i32) -> Self {
        Self {
            counter_id,
            instance: String::new(),
        }
    }

    pub fn to_xml(&self) -> String {
        format!(
            "<metricId><counterId>{}</counterId><instance>{}</instance></metricId>",
            self.counter_id,
            escape(&self.instance)
        )
    }

    fn from_node(node: &XmlNode) -> Result<Self> {
        Ok(Self {
            counter_id: node.parse_child("counterId")?,
            instance: node.child_text("instance").unwrap_or_default().to_string(),
        })
    }
}

/// 性能查询规格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfQuerySpec {
    pub entity: ManagedObjectReference,
    pub max_sample: Option<i32>,
    pub metric_id: Vec<PerfMetricId>,
    pub interval_id: Option<i32>,
    pub format: Option<String>,
}

impl PerfQuerySpec {
    /// 查询最近 `max_sample` 个采样点
    pub fn latest(
        entity: ManagedObjectReference,
        metric_id: PerfMetricId,
        interval_id: i32,
        max_sample: i32,
    ) -> Self {
        Self {
            entity,
            max_sample: Some(max_sample),
            metric_id: vec![metric_id],
            interval_id: Some(interval_id),
            format: Some("normal".to_string()),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!("<querySpec>{}", self.entity.to_xml("entity"));
        if let Some(max) = self.max_sample {
            xml.push_str(&format!("<maxSample>{}</maxSample>", max));
        }
        for metric in &self.metric_id {
            xml.push_str(&metric.to_xml());
        }
        if let Some(interval) = self.interval_id {
            xml.push_str(&format!("<intervalId>{}</intervalId>", interval));
        }
        if let Some(format) = &self.format {
            xml.push_str(&format!("<format>{}</format>", escape(format)));
        }
        xml.push_str("</querySpec>");
        xml
    }
}

/// 采样点时间信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfSampleInfo {
    pub timestamp: DateTime<Utc>,
    pub interval: i32,
}

/// 单个计数器的采样序列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfMetricSeries {
    pub id: PerfMetricId,
    pub values: Vec<i64>,
}

impl PerfMetricSeries {
    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: i128 = self.values.iter().map(|&v| i128::from(v)).sum();
        Some(sum as f64 / self.values.len() as f64)
    }
}

/// 单个实体的性能查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfEntityMetric {
    pub entity: ManagedObjectReference,
    pub sample_info: Vec<PerfSampleInfo>,
    pub value: Vec<PerfMetricSeries>,
}

impl PerfEntityMetric {
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        let entity = ManagedObjectReference::from_node(node.require("entity")?)?;

        let sample_info = node
            .children_named("sampleInfo")
            .map(|s| {
                let raw = s.require_text("timestamp")?;
                Ok(PerfSampleInfo {
                    timestamp: parse_timestamp(raw).ok_or_else(|| {
                        TransportError::Parse(format!("无效的时间戳: {}", raw))
                    })?,
                    interval: s.parse_child("interval")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let value = node
            .children_named("value")
            .map(|v| {
                Ok(PerfMetricSeries {
                    id: PerfMetricId::from_node(v.require("id")?)?,
                    values: v
                        .children_named("value")
                        .map(|x| {
                            x.text.trim().parse::<i64>().map_err(|_| {
                                TransportError::Parse(format!("无效的采样值: {}", x.text))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entity,
            sample_info,
            value,
        })
    }

    /// 按计数器 ID 取序列
    pub fn series(&self, counter_id: i32) -> Option<&PerfMetricSeries> {
        self.value.iter().find(|s| s.id.counter_id == counter_id)
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
