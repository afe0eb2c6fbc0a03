//! SOAP 1.1 报文编解码

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::types::ManagedObjectReference;
use crate::xml::{escape, XmlNode};
use crate::{Result, TransportError};

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// 远端返回的 SOAP 故障
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// `faultcode`
    pub code: String,
    /// `faultstring`
    pub message: String,
    /// `detail` 元素（若有）
    pub detail: Option<XmlNode>,
}

impl SoapFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: XmlNode) -> Self {
        self.detail = Some(detail);
        self
    }

    fn from_node(node: &XmlNode) -> Self {
        Self {
            code: node.child_text("faultcode").unwrap_or_default().to_string(),
            message: node.child_text("faultstring").unwrap_or_default().to_string(),
            detail: node.child("detail").cloned(),
        }
    }

    /// `detail` 下的故障节点名（如 `NotAuthenticatedFault`）
    pub fn fault_nodes(&self) -> impl Iterator<Item = &XmlNode> {
        self.detail.iter().flat_map(|d| d.children.iter())
    }

    /// 检查 `detail` 中是否包含指定故障节点
    ///
    /// 节点名或 `xsi:type` 任一匹配即可，`xsi:type` 比较时忽略命名空间前缀与 `Fault` 后缀。
    pub fn has_detail(&self, fault_node: &str) -> bool {
        let bare = fault_node.trim_end_matches("Fault");
        self.fault_nodes().any(|n| {
            n.name == fault_node
                || n.xsi_type()
                    .map(|t| t.rsplit(':').next().unwrap_or(t) == bare)
                    .unwrap_or(false)
        })
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(node) = self.fault_nodes().next() {
            write!(f, " ({})", node.name)?;
        }
        Ok(())
    }
}

/// SOAP 请求体构建器
///
/// 按参数声明顺序追加子元素，最后由 [`SoapRequest::finish`] 包装成完整信封。
pub struct SoapRequest {
    operation: String,
    body: String,
}

impl SoapRequest {
    pub fn new(operation: &str, namespace: &str) -> Self {
        Self {
            operation: operation.to_string(),
            body: format!("<{} xmlns=\"{}\">", operation, escape(namespace)),
        }
    }

    /// 追加 `_this` 参数
    pub fn this(self, mor: &ManagedObjectReference) -> Self {
        self.mor("_this", mor)
    }

    pub fn mor(mut self, tag: &str, mor: &ManagedObjectReference) -> Self {
        self.body.push_str(&mor.to_xml(tag));
        self
    }

    pub fn text(mut self, tag: &str, value: impl fmt::Display) -> Self {
        self.body
            .push_str(&format!("<{tag}>{}</{tag}>", escape(&value.to_string())));
        self
    }

    /// 追加已编码的 XML 片段
    pub fn raw(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    pub fn finish(mut self) -> String {
        self.body.push_str(&format!("</{}>", self.operation));
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="{SOAP_ENV_NS}" xmlns:xsd="{XSD_NS}" xmlns:xsi="{XSI_NS}"><soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"#,
            self.body
        )
    }
}

/// 解析 SOAP 响应，返回 Body 下的响应元素；若为 Fault 则返回 [`TransportError::Fault`]
pub fn decode_response(xml: &str) -> Result<XmlNode> {
    let envelope = XmlNode::parse(xml)?;
    if envelope.name != "Envelope" {
        return Err(TransportError::Parse(format!(
            "不是 SOAP 信封: <{}>",
            envelope.name
        )));
    }

    let body = envelope.require("Body")?;
    let response = body
        .children
        .first()
        .ok_or_else(|| TransportError::Parse("SOAP Body 为空".to_string()))?;

    if response.name == "Fault" {
        return Err(TransportError::Fault(SoapFault::from_node(response)));
    }

    Ok(response.clone())
}

/// 发送一次 SOAP 调用
///
/// HTTP 500 携带的 Fault 报文按 [`TransportError::Fault`] 返回，其余非 2xx 状态按 HTTP 错误返回。
pub(crate) async fn call(client: &Client, url: &Url, action: &str, body: String) -> Result<XmlNode> {
    debug!("SOAP 请求: {} ({})", url, action);

    let response = client
        .post(url.clone())
        .header(CONTENT_TYPE, "text/xml; charset=utf-8")
        .header("SOAPAction", format!("\"{}\"", action))
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() && status != StatusCode::INTERNAL_SERVER_ERROR {
        warn!("SOAP 请求失败: {} - {}", status, truncate(&text));
        return Err(TransportError::Http(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate(&text)
        )));
    }

    match decode_response(&text) {
        Err(TransportError::Parse(e)) if !status.is_success() => Err(TransportError::Http(format!(
            "HTTP {}: {} ({})",
            status.as_u16(),
            truncate(&text),
            e
        ))),
        other => other,
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(500) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
