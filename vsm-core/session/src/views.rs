//! 容器视图

use std::fmt;

use vsm_transport::ManagedObjectReference;

/// 视图覆盖的清单对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Host,
    Datastore,
    Cluster,
    VirtualMachine,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Host,
        ObjectKind::Datastore,
        ObjectKind::Cluster,
        ObjectKind::VirtualMachine,
    ];

    /// vim25 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Host => "HostSystem",
            Self::Datastore => "Datastore",
            Self::Cluster => "ClusterComputeResource",
            Self::VirtualMachine => "VirtualMachine",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// 登录时创建的四个容器视图，会话期间不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Views {
    pub host: ManagedObjectReference,
    pub datastore: ManagedObjectReference,
    pub cluster: ManagedObjectReference,
    pub vm: ManagedObjectReference,
}

impl Views {
    pub fn get(&self, kind: ObjectKind) -> &ManagedObjectReference {
        match kind {
            ObjectKind::Host => &self.host,
            ObjectKind::Datastore => &self.datastore,
            ObjectKind::Cluster => &self.cluster,
            ObjectKind::VirtualMachine => &self.vm,
        }
    }
}
