//! 媒体类型与参数解析
//!
//! 解析 `Content-Type` / `Content-Disposition` 形如
//! `multipart/related; boundary=X; type="application/json"` 的值。
//! 参数值支持带引号（含反斜杠转义）和裸 token 两种写法；
//! 裸 token 按 RFC 2045 的字符集校验，不合法即报错。

use std::collections::BTreeMap;

use super::MultipartError;

/// 解析媒体类型字符串，返回小写的类型名和参数表（键小写）。
///
/// # 示例
///
/// ```ignore
/// let (mediatype, params) = parse_media_type("multipart/related; boundary=abc")?;
/// assert_eq!(mediatype, "multipart/related");
/// assert_eq!(params.get("boundary").unwrap(), "abc");
/// ```
pub fn parse_media_type(
    input: &str,
) -> Result<(String, BTreeMap<String, String>), MultipartError> {
    let (mediatype, rest) = match input.find(';') {
        Some(pos) => (&input[..pos], &input[pos + 1..]),
        None => (input, ""),
    };
    let mediatype = mediatype.trim().to_ascii_lowercase();
    let (main, sub) = mediatype
        .split_once('/')
        .ok_or_else(|| MultipartError::Protocol(format!("非法的媒体类型: {input:?}")))?;
    if !is_token(main) || !is_token(sub) {
        return Err(MultipartError::Protocol(format!(
            "非法的媒体类型: {input:?}"
        )));
    }

    let mut params = BTreeMap::new();
    let bytes = rest.as_bytes();
    let mut i = 0;
    loop {
        // 跳过参数间的分隔符和空白
        while i < bytes.len() && (bytes[i] == b';' || bytes[i].is_ascii_whitespace()) {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(MultipartError::Protocol(format!(
                "媒体类型参数缺少 '=': {input:?}"
            )));
        }
        let key = rest[key_start..i].trim().to_ascii_lowercase();
        if !is_token(&key) {
            return Err(MultipartError::Protocol(format!(
                "非法的参数名: {key:?}"
            )));
        }
        i += 1;
        let value = if i < bytes.len() && bytes[i] == b'"' {
            i += 1;
            let mut value = Vec::new();
            loop {
                if i >= bytes.len() {
                    return Err(MultipartError::Protocol(format!(
                        "参数引号未闭合: {input:?}"
                    )));
                }
                match bytes[i] {
                    b'\\' if i + 1 < bytes.len() => {
                        value.push(bytes[i + 1]);
                        i += 2;
                    }
                    b'"' => {
                        i += 1;
                        break;
                    }
                    other => {
                        value.push(other);
                        i += 1;
                    }
                }
            }
            String::from_utf8(value).map_err(|_| {
                MultipartError::Protocol(format!("参数值不是合法的 UTF-8: {input:?}"))
            })?
        } else {
            let value_start = i;
            while i < bytes.len() && bytes[i] != b';' {
                i += 1;
            }
            let token = rest[value_start..i].trim();
            if !is_token(token) {
                return Err(MultipartError::Protocol(format!(
                    "参数值不是合法 token: {token:?}"
                )));
            }
            token.to_string()
        };
        params.insert(key, value);
    }
    Ok((mediatype, params))
}

/// RFC 2045 token：可打印 ASCII，排除分隔符
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_media_type() {
        let (mediatype, params) = parse_media_type("application/json").unwrap();
        assert_eq!(mediatype, "application/json");
        assert!(params.is_empty());
    }

    #[test]
    fn test_parse_params_and_case() {
        let (mediatype, params) =
            parse_media_type("Multipart/Related; Boundary=abc-123; type=\"application/json\"")
                .unwrap();
        assert_eq!(mediatype, "multipart/related");
        assert_eq!(params.get("boundary").unwrap(), "abc-123");
        assert_eq!(params.get("type").unwrap(), "application/json");
    }

    #[test]
    fn test_quoted_value_with_escapes() {
        let (_, params) =
            parse_media_type("multipart/form-data; name=\"a\\\"b;c\"").unwrap();
        assert_eq!(params.get("name").unwrap(), "a\"b;c");
    }

    #[test]
    fn test_unquoted_slash_value_rejected() {
        // AVS 下行通道会发送未加引号的 type=application/json，
        // 由调用方在解析前改写为带引号的形式
        assert!(parse_media_type("multipart/related; type=application/json").is_err());
    }

    #[test]
    fn test_missing_subtype_rejected() {
        assert!(parse_media_type("multipart").is_err());
        assert!(parse_media_type("").is_err());
    }
}
