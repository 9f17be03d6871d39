//! 启动流程：配置 → 布局 → 音色目录 → 按键

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use ltl_piano::audio::SoundSample;
use ltl_piano::catalog::Catalog;
use ltl_piano::config::{self, parse_sys_str};
use ltl_piano::error::ConfigError;
use ltl_piano::key::build_keys;
use ltl_piano::layout::KeyboardLayout;

/// 记录加载路径与播放的假采样
struct PathSample {
    path: PathBuf,
    played: Rc<RefCell<Vec<PathBuf>>>,
}

impl SoundSample for PathSample {
    fn play(&mut self, _fade_out: Duration) {
        self.played.borrow_mut().push(self.path.clone());
    }

    fn stop(&mut self) {}
}

fn sound_tree(folders: &[&str], slots: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for folder in folders {
        let path = dir.path().join(folder);
        std::fs::create_dir(&path).unwrap();
        for slot in 1..=slots {
            std::fs::write(path.join(format!("note{slot}.wav")), b"RIFF").unwrap();
        }
    }
    std::fs::create_dir(dir.path().join(".cache")).unwrap();
    std::fs::write(dir.path().join("README.txt"), b"notes").unwrap();
    dir
}

fn loader(played: &Rc<RefCell<Vec<PathBuf>>>) -> impl FnMut(&Path) -> Result<PathSample, ConfigError> {
    let played = Rc::clone(played);
    move |path| {
        Ok(PathSample {
            path: path.to_path_buf(),
            played: Rc::clone(&played),
        })
    }
}

#[test]
fn test_default_config_builds_thirteen_keys() {
    let dir = sound_tree(&["Organ", "Piano", "Guitar"], 13);
    let sys = parse_sys_str("").unwrap();
    let layout = KeyboardLayout::from_config(&sys.layout).unwrap();
    let catalog = Catalog::load(dir.path(), &sys.sound.default_folder, layout.slot_count()).unwrap();
    assert_eq!(catalog.folders()[0], "Piano");

    let played = Rc::new(RefCell::new(Vec::new()));
    let mut keys = build_keys(&layout, &catalog, sys.sound.fade_out, loader(&played)).unwrap();
    assert_eq!(keys.len(), 13);
    assert!(keys.iter().all(|k| k.variant_count() == 3));

    // 第一个按键对应最高槽位，默认音色在首位
    keys[0].press();
    keys[12].press();
    let played = played.borrow();
    assert_eq!(played[0], dir.path().join("Piano").join("note13.wav"));
    assert_eq!(played[1], dir.path().join("Piano").join("note1.wav"));
}

#[test]
fn test_reversed_layout_swaps_serial_order() {
    let dir = sound_tree(&["Piano"], 13);
    let sys = parse_sys_str("[layout]\nreverse = true\n").unwrap();
    let layout = KeyboardLayout::from_config(&sys.layout).unwrap();
    let catalog = Catalog::load(dir.path(), "Piano", layout.slot_count()).unwrap();

    let played = Rc::new(RefCell::new(Vec::new()));
    let mut keys = build_keys(&layout, &catalog, Duration::from_secs(1), loader(&played)).unwrap();
    keys[0].press();
    assert_eq!(
        played.borrow()[0],
        dir.path().join("Piano").join("note1.wav")
    );
    // 几何不变：反转后第一个按键位于最右侧
    assert!(keys[0].region().x > keys[12].region().x);
}

#[test]
fn test_missing_sample_aborts_startup() {
    let dir = sound_tree(&["Piano", "Organ"], 13);
    std::fs::remove_file(dir.path().join("Organ").join("note7.wav")).unwrap();
    let layout = KeyboardLayout::from_config(&config::Layout::default()).unwrap();
    let err = Catalog::load(dir.path(), "Piano", layout.slot_count()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSample { path } if path.ends_with("Organ/note7.wav")));
}

#[test]
fn test_missing_default_folder_aborts_startup() {
    let dir = sound_tree(&["Organ"], 13);
    let err = Catalog::load(dir.path(), "Piano", 13).unwrap_err();
    assert!(matches!(err, ConfigError::MissingDefaultFolder { .. }));
}
