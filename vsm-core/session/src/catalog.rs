//! 性能计数器目录

use std::collections::HashMap;

use tracing::debug;
use vsm_transport::PerfCounterInfo;

/// 计数器名（`group.metric.rollup`）到计数器描述的映射
///
/// 每次登录后构建一次，之后只读。部分版本的计数器注册表存在重名条目，保留第一个。
#[derive(Debug, Clone, Default)]
pub struct CounterCatalog {
    counters: HashMap<String, PerfCounterInfo>,
}

impl CounterCatalog {
    pub fn from_counters(counters: impl IntoIterator<Item = PerfCounterInfo>) -> Self {
        let mut map: HashMap<String, PerfCounterInfo> = HashMap::new();
        let mut duplicates = 0usize;

        for counter in counters {
            let name = counter.full_name();
            if map.contains_key(&name) {
                debug!("忽略重复的性能计数器: {} (key {})", name, counter.key);
                duplicates += 1;
                continue;
            }
            map.insert(name, counter);
        }

        if duplicates > 0 {
            debug!("性能计数器目录: {} 个，丢弃重复 {} 个", map.len(), duplicates);
        }

        Self { counters: map }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PerfCounterInfo> {
        self.counters.get(name)
    }

    /// 计数器名对应的会话内 ID
    pub fn counter_id(&self, name: &str) -> Option<i32> {
        self.counters.get(name).map(|c| c.key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }
}
