//! 系统配置定义与解析

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Deserializer};

use crate::layout::{KeyKind, LayoutEntry};

/// 系统运行时配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Sys {
    /// 音色与采样配置
    pub sound: Sound,
    /// 键位布局配置
    pub layout: Layout,
    /// 自动轮换配置
    pub cycle: Cycle,
    /// 串口连接配置
    pub link: Link,
    /// 控制键配置
    pub controls: Controls,
    /// 窗口配置
    pub window: Window,
}

/// 音色配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Sound {
    /// 音色根目录
    pub root: PathBuf,
    /// 默认音色目录名（会被移到列表首位）
    pub default_folder: String,
    #[serde(rename = "fade_out_ms", deserialize_with = "de_duration_ms")]
    /// 每次按下后的淡出时长
    pub fade_out: Duration,
    /// 播放音量
    pub volume: f32,
}

impl Default for Sound {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Sound Sets"),
            default_folder: "Piano".to_string(),
            fade_out: Duration::from_millis(3000),
            volume: 1.0,
        }
    }
}

/// 键位布局配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Layout {
    /// 是否反转按键顺序
    pub reverse: bool,
    /// 画布左右留白
    pub padding: f32,
    /// 按键顶部 y 坐标
    pub top: f32,
    /// 虚拟画布高度
    pub canvas_height: f32,
    /// 从左到右的按键表
    pub keys: Vec<LayoutEntry>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            reverse: false,
            padding: 16.0,
            top: 20.0,
            canvas_height: 96.0,
            keys: default_keys(),
        }
    }
}

/// 默认的 13 键布局（一个八度加一个白键）
fn default_keys() -> Vec<LayoutEntry> {
    use KeyKind::{Black, White};
    [
        (White, 0.0),
        (Black, 4.0),
        (White, 4.0),
        (Black, 4.0),
        (White, 4.0),
        (White, 0.0),
        (Black, 4.0),
        (White, 4.0),
        (Black, 4.0),
        (White, 4.0),
        (Black, 4.0),
        (White, 4.0),
        (White, 0.0),
    ]
    .into_iter()
    .map(|(kind, overlap)| LayoutEntry { kind, overlap })
    .collect()
}

/// 自动轮换配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Cycle {
    #[serde(rename = "period_secs", deserialize_with = "de_duration_secs")]
    /// 轮换周期
    pub period: Duration,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
        }
    }
}

/// 串口连接配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Link {
    /// 串口名，`auto` 表示自动发现
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    #[serde(rename = "read_timeout_ms", deserialize_with = "de_duration_ms")]
    /// 单次读取超时
    pub read_timeout: Duration,
    /// 每个候选串口的探测读取次数
    pub probe_attempts: u32,
    #[serde(rename = "heartbeat_timeout_secs", deserialize_with = "de_duration_secs")]
    /// 心跳超时
    pub heartbeat_timeout: Duration,
    #[serde(rename = "retry_interval_ms", deserialize_with = "de_duration_ms")]
    /// 发现失败后的重试间隔
    pub retry_interval: Duration,
    /// 自动发现时跳过的串口描述（不区分大小写的子串）
    pub skip_patterns: Vec<String>,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            port: "auto".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(100),
            probe_attempts: 20,
            heartbeat_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(1000),
            skip_patterns: vec!["bluetooth".to_string()],
        }
    }
}

/// 控制键配置（winit `KeyCode` 名称）
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Controls {
    /// 切换全屏
    pub fullscreen: String,
    /// 下一个音色
    pub next_variant: String,
    /// 上一个音色
    pub previous_variant: String,
    /// 切换自动轮换
    pub toggle_cycle: String,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            fullscreen: "Escape".to_string(),
            next_variant: "ArrowRight".to_string(),
            previous_variant: "ArrowLeft".to_string(),
            toggle_cycle: "ArrowUp".to_string(),
        }
    }
}

/// 窗口配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Window {
    /// 窗口标题
    pub title: String,
    /// 初始宽度
    pub width: u32,
    /// 初始高度
    pub height: u32,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            title: "Larger Than Life Piano".to_string(),
            width: 64 * 16,
            height: 64 * 9,
        }
    }
}

/// 从 TOML 字符串解析系统配置
///
/// # Errors
///
/// - TOML 解析失败
/// - 配置字段反序列化失败
pub fn parse_sys_str(s: &str) -> Result<Sys> {
    let cfg: Sys = toml::from_str(s)?;
    Ok(cfg)
}

/// 从指定路径加载系统配置（TOML）
///
/// # Errors
///
/// - 读取文件失败
/// - TOML 解析失败
/// - 配置字段反序列化失败
pub fn load_sys(path: &Path) -> Result<Sys> {
    let s = std::fs::read_to_string(path)?;
    parse_sys_str(&s)
}

/// 反序列化毫秒为 `Duration`
fn de_duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
}

/// 反序列化秒为 `Duration`
fn de_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(secs.max(0.0)))
}
