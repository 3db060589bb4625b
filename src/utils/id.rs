//! 标识生成
//!
//! 订阅令牌使用 10 位 62 进制字符串（0-9, a-z, A-Z），事件 ID 使用 UUID v4。

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const TOKEN_LENGTH: usize = 10;

/// 生成 10 位 62 进制令牌
///
/// 毫秒时间戳与随机数异或后编码。
///
/// ```
/// use chips_orchestrator::utils::id::generate_token;
///
/// let token = generate_token();
/// assert_eq!(token.len(), 10);
/// ```
pub fn generate_token() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let mut value = millis ^ rand::thread_rng().gen::<u64>();

    let mut chars = [0u8; TOKEN_LENGTH];
    for slot in chars.iter_mut().rev() {
        *slot = BASE62_CHARS[(value % 62) as usize];
        value /= 62;
    }
    chars.iter().map(|&c| c as char).collect()
}

/// 令牌格式是否有效
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 生成 UUID v4 格式的 ID
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_format() {
        let token = generate_token();
        assert!(is_valid_token(&token));
    }

    #[test]
    fn test_token_uniqueness() {
        let mut tokens = HashSet::new();
        for _ in 0..1000 {
            assert!(tokens.insert(generate_token()), "令牌重复");
        }
    }

    #[test]
    fn test_is_valid_token() {
        assert!(is_valid_token("a1B2c3D4e5"));
        assert!(!is_valid_token("short"));
        assert!(!is_valid_token("a1B2c3-4e5"));
        assert!(!is_valid_token(""));
    }

    #[test]
    fn test_generate_uuid() {
        let uuid = generate_uuid();
        assert_eq!(uuid.len(), 36);
    }
}
