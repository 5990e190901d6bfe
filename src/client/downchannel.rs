//! 下行通道：服务端推送指令的长连消费
//!
//! 独立任务持有响应体，把解析出的指令按到达顺序送进有界通道。
//! 序列恰好终止一次：对端关闭、解析出错（先送出一条 `Err`）或
//! 调用方放下 [`Downchannel`] 都会让任务退出并释放响应体。

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{decode_directive, multipart_reader_from_response};
use crate::error::AvsError;
use crate::message::Message;
use crate::multipart::MultipartReader;

/// 下行通道的缓冲深度；写满后消费任务等待，形成背压
const DOWNCHANNEL_BUFFER: usize = 32;

/// 调用方可见的指令序列
///
/// # 示例
///
/// ```ignore
/// let mut downchannel = client.create_downchannel(&token).await?;
/// while let Some(directive) = downchannel.next().await {
///     match directive?.typed() {
///         TypedMessage::SetAlert(alert) => { /* 设闹钟 */ }
///         _ => {}
///     }
/// }
/// // 序列结束：对端关闭或出错，由调用方决定是否重建
/// ```
#[derive(Debug)]
pub struct Downchannel {
    rx: mpsc::Receiver<Result<Message, AvsError>>,
}

impl Downchannel {
    /// 接收下一条指令；`None` 表示序列已终止
    pub async fn next(&mut self) -> Option<Result<Message, AvsError>> {
        self.rx.recv().await
    }

    /// 主动关闭通道；消费任务会在下一次投递时退出
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// 服务端返回 204 时的空通道
    pub(crate) fn closed() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { rx }
    }

    pub(crate) fn spawn(response: reqwest::Response) -> Result<Self, AvsError> {
        let reader = multipart_reader_from_response(response)?;
        let (tx, rx) = mpsc::channel(DOWNCHANNEL_BUFFER);
        tokio::spawn(consume(reader, tx));
        Ok(Self { rx })
    }
}

async fn consume(mut reader: MultipartReader, tx: mpsc::Sender<Result<Message, AvsError>>) {
    loop {
        let directive = match next_directive(&mut reader).await {
            Ok(Some(directive)) => directive,
            Ok(None) => {
                debug!("[DOWNCHANNEL] 对端关闭了下行通道");
                break;
            }
            Err(e) => {
                warn!("[DOWNCHANNEL] 指令流解析失败: {e}");
                let _ = tx.send(Err(e)).await;
                break;
            }
        };
        if tx.send(Ok(directive)).await.is_err() {
            debug!("[DOWNCHANNEL] 调用方已放下下行通道");
            break;
        }
    }
}

async fn next_directive(reader: &mut MultipartReader) -> Result<Option<Message>, AvsError> {
    let Some(mut part) = reader.next_part().await? else {
        return Ok(None);
    };
    let data = part.read_to_end().await?;
    decode_directive(&data).map(Some)
}
