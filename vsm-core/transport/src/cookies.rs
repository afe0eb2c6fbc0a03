//! 会话 Cookie 传递
//!
//! vSAN 健康服务不单独登录，而是复用主通道登录后得到的会话 Cookie。

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use tracing::{debug, warn};
use url::Url;

/// 从主通道 Cookie 存储中取出 `source_url` 对应的 Cookie，写入面向 `target_url` 的新存储
///
/// 返回的存储独立于主通道：之后主通道 Cookie 的变化不会影响健康通道。
pub fn derive_health_cookies(source: &dyn CookieStore, source_url: &Url, target_url: &Url) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    let header = match source.cookies(source_url) {
        Some(header) => header,
        None => {
            warn!("主通道没有可传递的会话 Cookie: {}", source_url);
            return jar;
        }
    };

    let header = match header.to_str() {
        Ok(h) => h,
        Err(e) => {
            warn!("会话 Cookie 不是有效的文本: {}", e);
            return jar;
        }
    };

    let mut count = 0;
    for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        jar.add_cookie_str(&format!("{}; Path=/", pair), target_url);
        count += 1;
    }
    debug!("已向 {} 传递 {} 个会话 Cookie", target_url, count);

    jar
}
