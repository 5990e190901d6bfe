//! 出站 multipart/form-data 报文的渲染
//!
//! 只负责拼装边界行和部分头部，部分体由调用方按自己的节奏写入
//! 管道，整个请求体因此可以边生成边发送。

use bytes::Bytes;
use uuid::Uuid;

/// 出站多部分报文写入器
///
/// # 示例
///
/// ```ignore
/// let mut writer = MultipartWriter::new();
/// let content_type = writer.form_data_content_type();
/// tx.send(writer.begin_json_part("metadata")).await?;
/// tx.send(Bytes::from(metadata_json)).await?;
/// tx.send(writer.finish()).await?;
/// ```
#[derive(Debug)]
pub struct MultipartWriter {
    boundary: String,
    parts_written: usize,
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartWriter {
    /// 用随机边界创建写入器
    pub fn new() -> Self {
        Self::with_boundary(format!("avs{}", Uuid::new_v4().simple()))
    }

    /// 用指定边界创建写入器
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts_written: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// 请求的 `Content-Type` 值
    pub fn form_data_content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// 开始一个新部分：边界行加头部块，之后调用方直接写部分体
    pub fn begin_part(&mut self, headers: &[(&str, &str)]) -> Bytes {
        let mut out = String::new();
        if self.parts_written > 0 {
            out.push_str("\r\n");
        }
        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("\r\n");
        for (name, value) in headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        self.parts_written += 1;
        Bytes::from(out)
    }

    /// 开始一个 JSON 表单部分
    pub fn begin_json_part(&mut self, field_name: &str) -> Bytes {
        let disposition = format!(r#"form-data; name="{}""#, escape_quotes(field_name));
        self.begin_part(&[
            ("Content-Disposition", disposition.as_str()),
            ("Content-Type", "application/json; charset=UTF-8"),
        ])
    }

    /// 开始一个文件表单部分
    pub fn begin_file_part(&mut self, field_name: &str, file_name: &str) -> Bytes {
        let disposition = format!(
            r#"form-data; name="{}"; filename="{}""#,
            escape_quotes(field_name),
            escape_quotes(file_name)
        );
        self.begin_part(&[
            ("Content-Disposition", disposition.as_str()),
            ("Content-Type", "application/octet-stream"),
        ])
    }

    /// 终止边界
    pub fn finish(&mut self) -> Bytes {
        Bytes::from(format!("\r\n--{}--\r\n", self.boundary))
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_part_has_no_leading_newline() {
        let mut writer = MultipartWriter::with_boundary("b1");
        let first = writer.begin_part(&[("Content-Type", "application/json")]);
        assert!(first.starts_with(b"--b1\r\n"));
        let second = writer.begin_part(&[]);
        assert!(second.starts_with(b"\r\n--b1\r\n"));
    }

    #[test]
    fn test_json_part_headers() {
        let mut writer = MultipartWriter::with_boundary("b2");
        let header = writer.begin_json_part("metadata");
        let text = std::str::from_utf8(&header).unwrap();
        assert!(text.contains(r#"Content-Disposition: form-data; name="metadata""#));
        assert!(text.contains("Content-Type: application/json; charset=UTF-8"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_file_part_headers() {
        let mut writer = MultipartWriter::with_boundary("b3");
        let header = writer.begin_file_part("audio", "audio.wav");
        let text = std::str::from_utf8(&header).unwrap();
        assert!(text.contains(r#"name="audio"; filename="audio.wav""#));
        assert!(text.contains("Content-Type: application/octet-stream"));
    }

    #[test]
    fn test_escapes_quotes_in_names() {
        let mut writer = MultipartWriter::with_boundary("b4");
        let header = writer.begin_json_part(r#"a"b"#);
        let text = std::str::from_utf8(&header).unwrap();
        assert!(text.contains(r#"name="a\"b""#));
    }

    #[test]
    fn test_finish_writes_terminal_boundary() {
        let mut writer = MultipartWriter::with_boundary("b5");
        assert_eq!(&writer.finish()[..], b"\r\n--b5--\r\n");
    }
}
