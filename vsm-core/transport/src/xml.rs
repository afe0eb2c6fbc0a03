//! 通用 XML 节点树
//!
//! SOAP 响应先被解析成 [`XmlNode`] 树，再由各类型按需投影。属性值对本层是不透明的，
//! 调用方拿到的就是节点树本身。

use std::str::{self, FromStr};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Result, TransportError};

/// XML 元素节点
///
/// `name` 为去掉命名空间前缀的本地名；属性名保留原始限定名（如 `xsi:type`）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// 解析 XML 文本，返回根元素
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Self::from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let node = Self::from_start(e)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| TransportError::Parse("多余的结束标签".to_string()))?;
                    // 叶子节点的文本原样保留，只丢弃子元素之间的缩进
                    if !node.children.is_empty() && node.text.trim().is_empty() {
                        node.text.clear();
                    }
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t.unescape()?;
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(TransportError::Parse(format!(
                        "XML 解析失败 (位置 {}): {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(TransportError::Parse("XML 文档未闭合".to_string()));
        }

        root.ok_or_else(|| TransportError::Parse("XML 文档为空".to_string()))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = str::from_utf8(e.local_name().as_ref())
            .map_err(|_| TransportError::Parse("标签名不是有效的 UTF-8".to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| TransportError::Parse(e.to_string()))?;
            let key = str::from_utf8(attr.key.as_ref())
                .map_err(|_| TransportError::Parse("属性名不是有效的 UTF-8".to_string()))?
                .to_string();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        } else if root.is_none() {
            *root = Some(node);
        } else {
            return Err(TransportError::Parse("XML 文档包含多个根元素".to_string()));
        }
        Ok(())
    }

    /// 按名称查找属性，限定名与本地名均可匹配
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(key, _)| key.rsplit(':').next() == Some(name) && key.contains(':'))
            })
            .map(|(_, value)| value.as_str())
    }

    /// `xsi:type` 属性
    pub fn xsi_type(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.ends_with(":type"))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// 深度优先查找第一个同名后代
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// 读取必需的子元素
    pub fn require(&self, name: &str) -> Result<&XmlNode> {
        self.child(name).ok_or_else(|| {
            TransportError::Parse(format!("<{}> 缺少子元素 <{}>", self.name, name))
        })
    }

    /// 读取必需子元素的文本
    pub fn require_text(&self, name: &str) -> Result<&str> {
        self.require(name).map(|c| c.text.as_str())
    }

    /// 将子元素文本解析为指定类型
    pub fn parse_child<T: FromStr>(&self, name: &str) -> Result<T> {
        let text = self.require_text(name)?;
        text.trim().parse().map_err(|_| {
            TransportError::Parse(format!("<{}> 的值无法解析: {}", name, text))
        })
    }
}

/// 转义 XML 文本
pub fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
