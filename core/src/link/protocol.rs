//! 串口文本协议
//!
//! 每行一条消息，以 `\n` 或 `\r\n` 分隔，字段以 `|` 分隔：
//! - `alive`：心跳
//! - `keyDown|<index>` / `keyUp|<index>`：按键按下 / 抬起
//!
//! 未知消息类型原样返回，由调用方忽略。

use crate::error::ProtocolWarning;

/// 心跳标记
pub const HEARTBEAT: &str = "alive";

/// 解析后的串口消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialMsg {
    /// 心跳
    Heartbeat,
    /// 按下指定索引的按键
    KeyDown(usize),
    /// 抬起指定索引的按键
    KeyUp(usize),
    /// 未知消息类型
    Unknown(String),
}

/// 解析单行消息
///
/// # Errors
///
/// - `keyDown` / `keyUp` 缺少索引或索引不是非负整数
pub fn parse_line(line: &str) -> Result<SerialMsg, ProtocolWarning> {
    let line = line.trim();
    if line.contains(HEARTBEAT) {
        return Ok(SerialMsg::Heartbeat);
    }
    let mut fields = line.split('|');
    let kind = fields.next().unwrap_or_default();
    let ctor: fn(usize) -> SerialMsg = match kind {
        "keyDown" => SerialMsg::KeyDown,
        "keyUp" => SerialMsg::KeyUp,
        _ => return Ok(SerialMsg::Unknown(line.to_string())),
    };
    fields
        .next()
        .and_then(|f| f.trim().parse::<usize>().ok())
        .map(ctor)
        .ok_or_else(|| ProtocolWarning::Malformed(line.to_string()))
}

/// 行缓冲：跨多次读取拼接，只产出完整的行
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// 尚未遇到换行的残余数据
    pending: String,
}

impl LineBuffer {
    /// 追加一段数据，返回其中所有完整的非空行
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find(['\n', '\r']) {
            let raw: String = self.pending.drain(..=pos).collect();
            let line = raw.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}
