//! 测试用的内存串口

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use crate::error::LinkError;
use crate::link::{LinePort, PortInfo, PortProvider};

/// 单次读取的脚本
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    /// 返回一段数据
    Data(&'static str),
    /// 超时无数据
    Silence,
    /// 读取失败
    Fail,
}

#[derive(Default)]
struct BusState {
    ports: Vec<PortInfo>,
    scripts: HashMap<String, VecDeque<Step>>,
    enumerations: usize,
    open_attempts: usize,
    opened: Vec<String>,
    closed: Vec<String>,
}

/// 可克隆的假串口总线，测试与被测对象共享同一份状态
#[derive(Clone, Default)]
pub(crate) struct FakeBus {
    state: Rc<RefCell<BusState>>,
}

impl FakeBus {
    pub(crate) fn add_port(&self, name: &str, description: &str) {
        self.state.borrow_mut().ports.push(PortInfo {
            name: name.to_string(),
            description: description.to_string(),
        });
    }

    pub(crate) fn script(&self, name: &str, steps: impl IntoIterator<Item = Step>) {
        self.state
            .borrow_mut()
            .scripts
            .entry(name.to_string())
            .or_default()
            .extend(steps);
    }

    pub(crate) fn push(&self, name: &str, step: Step) {
        self.script(name, [step]);
    }

    pub(crate) fn enumerations(&self) -> usize {
        self.state.borrow().enumerations
    }

    pub(crate) fn open_attempts(&self) -> usize {
        self.state.borrow().open_attempts
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.state.borrow().opened.clone()
    }

    pub(crate) fn closed(&self) -> Vec<String> {
        self.state.borrow().closed.clone()
    }
}

impl PortProvider for FakeBus {
    type Port = FakePort;

    fn available_ports(&mut self) -> Result<Vec<PortInfo>, LinkError> {
        let mut state = self.state.borrow_mut();
        state.enumerations += 1;
        Ok(state.ports.clone())
    }

    fn open(&mut self, name: &str) -> Result<FakePort, LinkError> {
        let mut state = self.state.borrow_mut();
        state.open_attempts += 1;
        if !state.ports.iter().any(|p| p.name == name) {
            return Err(LinkError::Open {
                port: name.to_string(),
                reason: "no such port".to_string(),
            });
        }
        state.opened.push(name.to_string());
        Ok(FakePort {
            name: name.to_string(),
            state: Rc::clone(&self.state),
        })
    }
}

/// 假串口，析构时记录关闭
pub(crate) struct FakePort {
    name: String,
    state: Rc<RefCell<BusState>>,
}

impl LinePort for FakePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_chunk(&mut self) -> Result<Option<String>, LinkError> {
        let step = self
            .state
            .borrow_mut()
            .scripts
            .get_mut(&self.name)
            .and_then(VecDeque::pop_front);
        match step {
            None | Some(Step::Silence) => Ok(None),
            Some(Step::Data(s)) => Ok(Some(s.to_string())),
            Some(Step::Fail) => Err(LinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))),
        }
    }
}

impl Drop for FakePort {
    fn drop(&mut self) {
        self.state.borrow_mut().closed.push(self.name.clone());
    }
}
