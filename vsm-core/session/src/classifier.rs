//! 远端故障分类
//!
//! 协议没有为“会话失效”和“对象已删除”提供稳定的错误码，只能根据故障详情节点
//! 或故障文本判断，因此分类结果是尽力而为的。下列常量即匹配契约：
//!
//! | 分类 | 详情节点 | 故障文本 |
//! |------|----------|----------|
//! | 会话失效 | `NotAuthenticatedFault` | `The session is not authenticated.` |
//! | 对象已删除 | `ManagedObjectNotFoundFault` | `The object has already been deleted or has not been completely created` |

use vsm_transport::{MissingProperty, SoapFault};

/// 会话失效时的故障详情节点
pub const NOT_AUTHENTICATED_FAULT: &str = "NotAuthenticatedFault";

/// 会话失效时的故障文本
pub const SESSION_EXPIRED_MESSAGE: &str = "The session is not authenticated.";

/// 对象不存在时的故障详情节点
pub const OBJECT_NOT_FOUND_FAULT: &str = "ManagedObjectNotFoundFault";

/// 对象已删除或未创建完成时的故障文本
pub const OBJECT_GONE_MESSAGE: &str =
    "The object has already been deleted or has not been completely created";

/// 故障分类器
pub trait FaultClassifier: Send + Sync {
    /// 故障是否表示会话已失效
    fn is_session_expired(&self, fault: &SoapFault) -> bool;

    /// 故障是否表示对象已不存在
    fn is_object_gone(&self, fault: &SoapFault) -> bool;

    /// 属性级故障是否表示会话已失效
    fn is_missing_unauthenticated(&self, missing: &MissingProperty) -> bool {
        missing.fault_type() == Some(NOT_AUTHENTICATED_FAULT.trim_end_matches("Fault"))
    }
}

/// 默认分类器：先看结构化详情节点，再退回到故障文本匹配
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFaultClassifier;

impl FaultClassifier for DefaultFaultClassifier {
    fn is_session_expired(&self, fault: &SoapFault) -> bool {
        fault.has_detail(NOT_AUTHENTICATED_FAULT) || fault.message.contains(SESSION_EXPIRED_MESSAGE)
    }

    fn is_object_gone(&self, fault: &SoapFault) -> bool {
        fault.has_detail(OBJECT_NOT_FOUND_FAULT) || fault.message.contains(OBJECT_GONE_MESSAGE)
    }
}
