//! 错误类型定义
//!
//! - `ConfigError`：启动期致命错误，主循环开始前中止进程
//! - `LinkError`：串口连接错误，可恢复，由连接状态机吸收
//! - `ProtocolWarning`：协议层告警，记录后丢弃该消息

use std::path::PathBuf;

use thiserror::Error;

/// 启动配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取目录失败
    #[error("无法读取目录 {path}: {source}")]
    ReadDir {
        /// 目录路径
        path: PathBuf,
        /// 底层 IO 错误
        source: std::io::Error,
    },

    /// 缺少默认音色目录
    #[error("音色根目录 {root} 下缺少默认音色目录 `{name}`")]
    MissingDefaultFolder {
        /// 音色根目录
        root: PathBuf,
        /// 默认音色目录名
        name: String,
    },

    /// 缺少某个槽位的采样文件
    #[error("缺少采样文件 {path}")]
    MissingSample {
        /// 期望存在的文件路径
        path: PathBuf,
    },

    /// 采样文件解码失败
    #[error("采样文件 {path} 解码失败: {reason}")]
    DecodeSample {
        /// 文件路径
        path: PathBuf,
        /// 失败原因
        reason: String,
    },

    /// 键位布局为空
    #[error("键位布局为空")]
    EmptyLayout,

    /// 某个按键没有任何音色变体
    #[error("第 {slot} 号槽位没有任何音色变体")]
    NoVariants {
        /// 槽位编号
        slot: usize,
    },
}

/// 串口连接错误
#[derive(Error, Debug)]
pub enum LinkError {
    /// 枚举串口失败
    #[error("串口枚举失败: {0}")]
    Enumerate(String),

    /// 打开串口失败
    #[error("无法打开串口 {port}: {reason}")]
    Open {
        /// 串口名
        port: String,
        /// 失败原因
        reason: String,
    },

    /// 读写失败
    #[error("串口 IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for LinkError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => Self::Io(std::io::Error::new(kind, e.description)),
            _ => Self::Enumerate(e.to_string()),
        }
    }
}

/// 协议告警：消息被丢弃，主循环继续
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolWarning {
    /// 消息格式错误
    #[error("无法解析的消息: {0:?}")]
    Malformed(String),

    /// 按键索引越界
    #[error("未知按键索引 {index}（共 {key_count} 个按键），来自 {kind}")]
    KeyIndexOutOfRange {
        /// 消息类型（`keyDown` / `keyUp`）
        kind: &'static str,
        /// 收到的索引
        index: usize,
        /// 当前按键总数
        key_count: usize,
    },
}
