//! 开放流上的 MIME 多部分增量解析器
//!
//! AVS 的下行通道是一条永不关闭的 HTTP 响应体，通用的多部分解析器
//! 会一直等到流关闭才返回，在这里行不通。本解析器按到达的字节增量
//! 工作：每解析完一个部分就立即交给调用方，预读不超过一个固定窗口。
//!
//! # 关键行为
//!
//! - 边界哨兵为 `CRLF "--" <boundary>`；若首个边界以裸 `LF` 结尾，
//!   则永久切换为 `LF` 方言
//! - 边界可以横跨两次底层读取，部分匹配会被保留到窗口补满之后继续
//! - 部分体内恰好等于边界前缀的字节序列不会被误判为边界
//! - 头部块使用同一个窗口读取，超长的头部行直接报错而不是扩容

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::pin::Pin;

use bytes::{Buf, Bytes};
use futures::{Stream, StreamExt};

use super::{parse_media_type, MultipartError};

/// 默认预读窗口大小
pub const PEEK_BUFFER_SIZE: usize = 1024;

/// 解析器的底层字节流
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// 解析器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// 等待下一个部分的边界行
    ExpectingPart,
    /// 正在读取当前部分的体
    InsidePart,
    /// 部分体已结束，边界后的换行符尚未消费
    AfterPart,
    /// 已看到终止边界 `--`
    Done,
}

/// 窗口扫描结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// 在窗口偏移 `pos` 处有完整边界；`done` 表示其后跟着 `--`
    Boundary { pos: usize, done: bool },
    /// 偏移 `pos` 起是边界前缀，窗口数据不足以判定
    Partial { pos: usize },
    /// 窗口内没有任何边界开头
    Clear,
}

/// 开放流上的多部分读取器
///
/// # 示例
///
/// ```ignore
/// let mut reader = MultipartReader::new(body_stream, "boundary");
/// while let Some(mut part) = reader.next_part().await? {
///     let data = part.read_to_end().await?;
///     // ...
/// }
/// ```
pub struct MultipartReader {
    source: ByteStream,
    /// 上一个网络分块里还没搬进窗口的剩余字节
    carry: Bytes,
    source_eof: bool,
    /// 固定大小的预读窗口，`r..w` 为未消费区间
    buf: Box<[u8]>,
    r: usize,
    w: usize,
    state: ParserState,
    parts_read: usize,
    /// 首个边界以裸 LF 结尾时置位，此后换行符按 LF 处理
    lf_mode: bool,
    /// `"--" + boundary`
    dash_boundary: Vec<u8>,
    /// `"\r\n--" + boundary`，LF 方言下跳过首字节使用
    crlf_dash_boundary: Vec<u8>,
    needs_top_up: bool,
}

impl MultipartReader {
    /// 用默认窗口大小创建读取器
    pub fn new<S>(source: S, boundary: &str) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        Self::with_buffer_size(source, boundary, PEEK_BUFFER_SIZE)
    }

    /// 用自定义窗口大小创建读取器（窗口必须能容纳完整的边界行）
    pub fn with_buffer_size<S>(source: S, boundary: &str, buffer_size: usize) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        let buffer_size = buffer_size.max(boundary.len() + 16);
        let crlf_dash_boundary = [&b"\r\n--"[..], boundary.as_bytes()].concat();
        Self {
            source: Box::pin(source),
            carry: Bytes::new(),
            source_eof: false,
            buf: vec![0u8; buffer_size].into_boxed_slice(),
            r: 0,
            w: 0,
            state: ParserState::ExpectingPart,
            parts_read: 0,
            lf_mode: false,
            dash_boundary: crlf_dash_boundary[2..].to_vec(),
            crlf_dash_boundary,
            needs_top_up: false,
        }
    }

    /// 已完整开始过的部分数量
    pub fn parts_read(&self) -> usize {
        self.parts_read
    }

    /// 取下一个部分
    ///
    /// 上一个部分若未读完会先被排空。返回 `Ok(None)` 表示序列正常结束：
    /// 终止边界 `--` 已出现，或对端在两个部分之间关闭了流。
    pub async fn next_part(&mut self) -> Result<Option<Part<'_>>, MultipartError> {
        loop {
            match self.state {
                ParserState::Done => return Ok(None),
                ParserState::InsidePart => {
                    self.drain_body().await?;
                    continue;
                }
                ParserState::AfterPart => {
                    let Some(line) = self.read_line().await? else {
                        return Ok(None);
                    };
                    if line != self.nl() {
                        return Err(MultipartError::Protocol(format!(
                            "边界后应为换行符，实际为 {:?}",
                            String::from_utf8_lossy(&line)
                        )));
                    }
                    self.state = ParserState::ExpectingPart;
                    continue;
                }
                ParserState::ExpectingPart => {}
            }
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            if let Some(rest) = line.strip_prefix(self.dash_boundary.as_slice()) {
                // 换行方言只在首个边界上决定一次
                if self.parts_read == 0 && rest == b"\n" {
                    self.lf_mode = true;
                }
                if rest == self.nl() {
                    self.state = ParserState::InsidePart;
                    self.parts_read += 1;
                    let headers = self.read_part_headers().await?;
                    return Ok(Some(Part {
                        headers,
                        reader: self,
                    }));
                }
                if rest.starts_with(b"--") {
                    self.state = ParserState::Done;
                    return Ok(None);
                }
            }
            // 不是边界行：属于前导数据，跳过
        }
    }

    fn nl(&self) -> &'static [u8] {
        if self.lf_mode {
            b"\n"
        } else {
            b"\r\n"
        }
    }

    fn sentinel(&self) -> &[u8] {
        if self.lf_mode {
            &self.crlf_dash_boundary[1..]
        } else {
            &self.crlf_dash_boundary
        }
    }

    /// 压实窗口并从底层流补充数据
    ///
    /// 返回新增的字节数；返回 0 表示底层流已结束。窗口已满却无字节
    /// 可压实时报 `BufferOverflow`。
    async fn top_up(&mut self) -> Result<usize, MultipartError> {
        if self.r > 0 {
            self.buf.copy_within(self.r..self.w, 0);
            self.w -= self.r;
            self.r = 0;
        }
        if self.w >= self.buf.len() {
            return Err(MultipartError::BufferOverflow);
        }
        while self.carry.is_empty() && !self.source_eof {
            match self.source.next().await {
                Some(Ok(chunk)) => {
                    if !chunk.is_empty() {
                        self.carry = chunk;
                    }
                }
                Some(Err(e)) => return Err(MultipartError::Io(e)),
                None => self.source_eof = true,
            }
        }
        if self.carry.is_empty() {
            return Ok(0);
        }
        let n = (self.buf.len() - self.w).min(self.carry.len());
        self.buf[self.w..self.w + n].copy_from_slice(&self.carry[..n]);
        self.carry.advance(n);
        self.w += n;
        Ok(n)
    }

    /// 读取一行（含换行符）
    ///
    /// 干净的流结束返回 `Ok(None)`；行未结束流就断了则报
    /// `UnexpectedEof`。
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, MultipartError> {
        loop {
            if let Some(idx) = self.buf[self.r..self.w].iter().position(|&b| b == b'\n') {
                let line = self.buf[self.r..self.r + idx + 1].to_vec();
                self.r += idx + 1;
                return Ok(Some(line));
            }
            if self.top_up().await? == 0 {
                if self.r == self.w {
                    return Ok(None);
                }
                return Err(MultipartError::UnexpectedEof);
            }
        }
    }

    /// 读取当前部分的头部块（到第一个空行为止）
    async fn read_part_headers(&mut self) -> Result<BTreeMap<String, String>, MultipartError> {
        let mut headers = BTreeMap::new();
        loop {
            let line = self
                .read_line()
                .await?
                .ok_or(MultipartError::UnexpectedEof)?;
            let line = trim_newline(&line);
            if line.is_empty() {
                return Ok(headers);
            }
            let text = std::str::from_utf8(line)
                .map_err(|_| MultipartError::Header("头部行不是合法的 UTF-8".to_string()))?;
            let Some((name, value)) = text.split_once(':') else {
                return Err(MultipartError::Header(format!("头部行缺少冒号: {text:?}")));
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return Err(MultipartError::Header(format!("头部名为空: {text:?}")));
            }
            let value = value.trim().to_string();
            match headers.entry(name) {
                Entry::Occupied(mut entry) => {
                    let joined = entry.get_mut();
                    joined.push_str(", ");
                    joined.push_str(&value);
                }
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
    }

    /// 在窗口中寻找边界哨兵
    fn scan_window(&self) -> Scan {
        let win = &self.buf[self.r..self.w];
        let sentinel = self.sentinel();
        let nl = self.nl();
        let mut from = 0;
        while from < win.len() {
            let Some(off) = win[from..].iter().position(|&b| b == sentinel[0]) else {
                return Scan::Clear;
            };
            let pos = from + off;
            let avail = &win[pos..];
            let overlap = avail.len().min(sentinel.len());
            if avail[..overlap] != sentinel[..overlap] {
                from = pos + 1;
                continue;
            }
            if overlap < sentinel.len() {
                return Scan::Partial { pos };
            }
            let tail = &avail[sentinel.len()..];
            if tail.len() >= nl.len() && &tail[..nl.len()] == nl {
                return Scan::Boundary { pos, done: false };
            }
            if tail.len() >= 2 && &tail[..2] == b"--" {
                return Scan::Boundary { pos, done: true };
            }
            // 终止符数据不足：tail 仍可能是换行符或 "--" 的前缀
            if (tail.len() < nl.len() && nl.starts_with(tail))
                || (tail.len() < 2 && b"--".starts_with(tail))
            {
                return Scan::Partial { pos };
            }
            from = pos + 1;
        }
        Scan::Clear
    }

    /// 读取当前部分的体
    ///
    /// 返回 0 表示该部分体已结束（遇到了下一个边界）。哨兵本身留在
    /// 窗口里，由 `next_part` 消费。
    async fn read_body(&mut self, out: &mut [u8]) -> Result<usize, MultipartError> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.state != ParserState::InsidePart {
                return Ok(0);
            }
            if self.r == self.w || self.needs_top_up {
                self.needs_top_up = false;
                if self.top_up().await? == 0 {
                    if self.r == self.w {
                        return Err(MultipartError::UnexpectedEof);
                    }
                    // 流结束后残留的半截哨兵永远无法判定，只能视为截断
                    if let Scan::Partial { pos: 0 } = self.scan_window() {
                        return Err(MultipartError::UnexpectedEof);
                    }
                }
            }
            match self.scan_window() {
                Scan::Boundary { pos: 0, done } => {
                    self.state = if done {
                        ParserState::Done
                    } else {
                        ParserState::AfterPart
                    };
                    return Ok(0);
                }
                Scan::Boundary { pos, .. } => {
                    // 边界（或疑似边界）之前的字节可以安全交出
                    let n = out.len().min(pos);
                    out[..n].copy_from_slice(&self.buf[self.r..self.r + n]);
                    self.r += n;
                    return Ok(n);
                }
                Scan::Partial { pos } if pos > 0 => {
                    // 边界（或疑似边界）之前的字节可以安全交出
                    let n = out.len().min(pos);
                    out[..n].copy_from_slice(&self.buf[self.r..self.r + n]);
                    self.r += n;
                    return Ok(n);
                }
                Scan::Partial { .. } => {
                    if self.source_eof && self.carry.is_empty() {
                        return Err(MultipartError::UnexpectedEof);
                    }
                    self.needs_top_up = true;
                }
                Scan::Clear => {
                    let avail = self.w - self.r;
                    if avail == 0 {
                        continue;
                    }
                    let n = out.len().min(avail);
                    out[..n].copy_from_slice(&self.buf[self.r..self.r + n]);
                    self.r += n;
                    return Ok(n);
                }
            }
        }
    }

    /// 丢弃当前部分剩余的体，直到下一个边界
    async fn drain_body(&mut self) -> Result<(), MultipartError> {
        let mut scratch = [0u8; 512];
        loop {
            if self.read_body(&mut scratch).await? == 0 {
                return Ok(());
            }
        }
    }
}

impl std::fmt::Debug for MultipartReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartReader")
            .field("state", &self.state)
            .field("parts_read", &self.parts_read)
            .field("lf_mode", &self.lf_mode)
            .field("buffered", &(self.w - self.r))
            .finish()
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line)
}

/// 多部分流中的一个部分
///
/// 持有解析好的 MIME 头部和对读取器的独占借用：同一时刻只有一个
/// 部分可读，放下它（无论是否读完）之后才能取下一个。
pub struct Part<'a> {
    headers: BTreeMap<String, String>,
    reader: &'a mut MultipartReader,
}

impl Part<'_> {
    /// 全部头部（键为小写）
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// 按名称取头部值（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_id(&self) -> Option<&str> {
        self.header("content-id")
    }

    /// `Content-Disposition: form-data` 的 name 参数
    pub fn form_name(&self) -> Option<String> {
        let (disposition, params) = parse_media_type(self.header("content-disposition")?).ok()?;
        if disposition != "form-data" {
            return None;
        }
        params.get("name").cloned()
    }

    /// `Content-Disposition` 的 filename 参数
    pub fn file_name(&self) -> Option<String> {
        let (_, params) = parse_media_type(self.header("content-disposition")?).ok()?;
        params.get("filename").cloned()
    }

    /// 读取部分体；返回 0 表示体已结束
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize, MultipartError> {
        self.reader.read_body(out).await
    }

    /// 读取部分体的全部剩余字节
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, MultipartError> {
        let mut data = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }
}

impl std::fmt::Debug for Part<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part").field("headers", &self.headers).finish()
    }
}
