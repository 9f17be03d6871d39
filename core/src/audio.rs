//! 采样播放
//!
//! - `SoundSample`：按键所需的播放能力（播放并淡出、停止）
//! - `AudioOutput` / `RodioSample`：基于 rodio 的实现，启动时一次性解码

use std::path::Path;
use std::time::Duration;

use rodio::{Decoder, Sink, Source, buffer::SamplesBuffer, mixer::Mixer, stream::OutputStream};

use crate::error::ConfigError;

/// 可播放的声音采样
pub trait SoundSample {
    /// 从头播放，并在 `fade_out` 内线性淡出至静音后自行结束
    fn play(&mut self, fade_out: Duration);
    /// 立即停止当前播放
    fn stop(&mut self);
}

/// 音频输出流
pub struct AudioOutput {
    /// 默认输出设备上的流，析构即停止所有播放
    stream: OutputStream,
}

impl AudioOutput {
    /// 打开默认输出设备
    ///
    /// # Errors
    ///
    /// - 没有可用的输出设备或打开失败
    pub fn open_default() -> anyhow::Result<Self> {
        let stream = rodio::OutputStreamBuilder::open_default_stream()?;
        Ok(Self { stream })
    }

    /// 从文件加载并解码一个采样
    ///
    /// # Errors
    ///
    /// - 读取或解码失败
    pub fn load(&self, path: &Path, volume: f32) -> Result<RodioSample, ConfigError> {
        let bytes = std::fs::read(path).map_err(|e| ConfigError::DecodeSample {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let buffer = decode_bytes(bytes).map_err(|e| ConfigError::DecodeSample {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(RodioSample {
            buffer,
            mixer: self.stream.mixer().clone(),
            volume,
            sink: None,
        })
    }
}

/// 将原始字节数据解码为可播放的采样缓冲
fn decode_bytes(bytes: Vec<u8>) -> Result<SamplesBuffer, rodio::decoder::DecoderError> {
    let decoder = Decoder::new(std::io::Cursor::new(bytes))?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.collect();
    Ok(SamplesBuffer::new(channels, sample_rate, samples))
}

/// 已解码的 rodio 采样
pub struct RodioSample {
    /// 解码后的采样数据
    buffer: SamplesBuffer,
    /// 输出混音器
    mixer: Mixer,
    /// 播放音量
    volume: f32,
    /// 当前播放中的声部
    sink: Option<Sink>,
}

impl SoundSample for RodioSample {
    fn play(&mut self, fade_out: Duration) {
        self.stop();
        let mut source = self.buffer.clone().take_duration(fade_out);
        source.set_filter_fadeout();
        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(self.volume);
        sink.append(source);
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
