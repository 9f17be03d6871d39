//! 基于 `serialport` 的串口实现

use std::io::{self, Read};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};

use crate::config;
use crate::error::LinkError;
use crate::link::{LinePort, PortInfo, PortProvider};

/// 单次读取的缓冲大小
const READ_BUF: usize = 256;

/// 系统串口
pub struct SerialPortProvider {
    /// 波特率
    baud_rate: u32,
    /// 单次读取的超时
    read_timeout: Duration,
}

impl SerialPortProvider {
    /// 按配置创建
    #[must_use]
    pub const fn new(cfg: &config::Link) -> Self {
        Self {
            baud_rate: cfg.baud_rate,
            read_timeout: cfg.read_timeout,
        }
    }
}

/// 由串口类型拼出描述文本
fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                parts.join(" ")
            }
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}

impl PortProvider for SerialPortProvider {
    type Port = SerialLine;

    fn available_ports(&mut self) -> Result<Vec<PortInfo>, LinkError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| PortInfo {
                description: describe(&p.port_type),
                name: p.port_name,
            })
            .collect())
    }

    fn open(&mut self, name: &str) -> Result<SerialLine, LinkError> {
        let port = serialport::new(name, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| LinkError::Open {
                port: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(SerialLine {
            name: name.to_string(),
            port,
        })
    }
}

/// 已打开的系统串口，析构即关闭
pub struct SerialLine {
    /// 设备名
    name: String,
    /// 底层串口
    port: Box<dyn SerialPort>,
}

impl LinePort for SerialLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_chunk(&mut self) -> Result<Option<String>, LinkError> {
        let mut buf = [0u8; READ_BUF];
        match self.port.read(&mut buf) {
            Ok(0) => Err(LinkError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "串口已关闭",
            ))),
            Ok(n) => Ok(buf
                .get(..n)
                .map(|b| String::from_utf8_lossy(b).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_available(&mut self) -> Result<Option<String>, LinkError> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }
        self.read_chunk()
    }
}
