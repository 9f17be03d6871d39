//! # Larger Than Life Piano 主程序

use std::{path::PathBuf, sync::mpsc, time::Instant};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use ltl_piano::{
    audio::AudioOutput,
    catalog::Catalog,
    config::{Sys, load_sys},
    entry::VisualApp,
    key::{DisplayTransform, build_keys},
    layout::KeyboardLayout,
    link::{LinkSettings, SerialLink, serial::SerialPortProvider},
    logging,
    loops::{
        key_map::KeyMap,
        main_loop::{ApplicationState, PianoReconciler},
    },
};

#[derive(Parser)]
#[command(version, about = "Larger Than Life Piano")]
/// 命令行参数
struct ExecArgs {
    #[arg(long, default_value = "config_sys.toml")]
    /// 配置文件路径，不存在时使用内置默认配置
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = ExecArgs::parse();
    logging::init_logging();
    let sys = if args.config.exists() {
        load_sys(&args.config)?
    } else {
        info!(path = %args.config.display(), "配置文件不存在，使用默认配置");
        Sys::default()
    };

    for name in ltl_piano_winit::invalid_controls(&sys.controls) {
        warn!(key = %name, "无法识别的控制键名称");
    }
    for line in KeyMap::help_lines(&sys.controls) {
        info!("{line}");
    }

    let layout = KeyboardLayout::from_config(&sys.layout)?;
    let catalog = Catalog::load(
        &sys.sound.root,
        &sys.sound.default_folder,
        layout.slot_count(),
    )?;
    let audio = AudioOutput::open_default()?;
    let keys = build_keys(&layout, &catalog, sys.sound.fade_out, |path| {
        audio.load(path, sys.sound.volume)
    })?;
    info!(
        keys = keys.len(),
        folders = ?catalog.folders(),
        port = %sys.link.port,
        "已加载音色"
    );

    let transform = DisplayTransform {
        canvas: layout.canvas,
        window: (sys.window.width as f32, sys.window.height as f32),
    };
    let state = ApplicationState::new(
        keys,
        catalog.folders().to_vec(),
        transform,
        sys.cycle.period,
        Instant::now(),
    );
    let link = SerialLink::new(
        SerialPortProvider::new(&sys.link),
        LinkSettings::from(&sys.link),
    );
    let (ui_tx, ui_rx) = mpsc::channel();
    let reconciler = PianoReconciler::new(
        state,
        link,
        KeyMap::new(&sys.controls),
        ui_rx,
        sys.window.title.clone(),
    );

    ltl_piano_winit::run(VisualApp::new(reconciler), ui_tx, sys.window)?;
    // 输出流须在事件循环结束后才释放
    drop(audio);
    Ok(())
}
