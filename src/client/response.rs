//! AVS 的响应

use std::collections::HashMap;

use crate::message::Message;

/// 一次事件请求的完整响应
///
/// 指令按到达顺序排列；附件以去掉尖括号的 Content-ID 为键。指令
/// 通过 `cid:<id>` 形式的 url 引用附件，附件可能晚于引用它的指令
/// 到达，因此要在整个响应解析完之后再查 `content`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// 服务端分配的请求标识（`x-amzn-requestid`），用于排障
    pub request_id: String,
    pub directives: Vec<Message>,
    pub content: HashMap<String, Vec<u8>>,
}

impl Response {
    /// 按 Content-ID 取附件
    pub fn attachment(&self, content_id: &str) -> Option<&[u8]> {
        self.content.get(content_id).map(Vec::as_slice)
    }
}
