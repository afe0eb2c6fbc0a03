//! VSM 会话层
//!
//! 在传输层之上实现 vSphere 监控会话：
//!
//! - **认证状态机** (`SessionManager`): `Pending` → `connect()` → `Authenticated` → `disconnect()` → `Pending`
//! - **容器视图** (`Views`): 登录时为主机、数据存储、集群、虚拟机各创建一个递归视图
//! - **计数器目录** (`CounterCatalog`): `group.metric.rollup` 到计数器 ID 的映射，重名保留第一个
//! - **查询**: 视图属性、对象属性、性能采样、vSAN 集群健康摘要
//! - **故障分类** (`FaultClassifier`): 把远端故障归类为会话失效或对象已删除
//!
//! # 示例
//!
//! ```ignore
//! use vsm_session::{EndpointConfig, ObjectKind, SessionManager, SessionOptions};
//!
//! let config = EndpointConfig::new("administrator@vsphere.local", "password", "https://vcenter/sdk");
//! let mut session = SessionManager::open(&config, SessionOptions::default()).await?;
//! session.connect().await?;
//!
//! let hosts = session.query_kind_properties(ObjectKind::Host, &["name", "runtime.connectionState"]).await?;
//! for host in &hosts {
//!     let cpu = session.query_performance(&host.obj, "cpu.usage.average").await?;
//! }
//!
//! session.disconnect().await?;
//! ```

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod manager;
pub mod views;

pub use catalog::CounterCatalog;
pub use classifier::{
    DefaultFaultClassifier, FaultClassifier, NOT_AUTHENTICATED_FAULT, OBJECT_GONE_MESSAGE,
    OBJECT_NOT_FOUND_FAULT, SESSION_EXPIRED_MESSAGE,
};
pub use config::{EndpointConfig, PerfWindow, SessionOptions};
pub use error::{Result, SessionError};
pub use manager::{SessionManager, SessionState};
pub use views::{ObjectKind, Views};
