//! 音色目录：扫描音色根目录并为每个槽位生成采样路径
//!
//! - 忽略以 `.` 开头的条目与普通文件
//! - 默认音色目录移动到首位，其余保持原有顺序
//! - 每个槽位在每个音色目录下必须存在 `note{slot}.wav`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// 启动时计算的只读音色目录
#[derive(Debug, Clone)]
pub struct Catalog {
    /// 音色目录名（默认目录在首位）
    folders: Vec<String>,
    /// 槽位编号到各目录采样路径的映射
    samples: BTreeMap<usize, Vec<PathBuf>>,
}

impl Catalog {
    /// 扫描 `root` 并为 `slot_count` 个槽位建立采样路径
    ///
    /// # Errors
    ///
    /// - 无法读取音色根目录
    /// - 缺少默认音色目录
    /// - 任一槽位在任一目录下缺少采样文件
    pub fn load(root: &Path, default_name: &str, slot_count: usize) -> Result<Self, ConfigError> {
        let folders = discover_instrument_folders(root, default_name)?;
        let folders = reorder(folders, default_name);
        let samples = build_sample_paths(root, &folders, slot_count)?;
        Ok(Self { folders, samples })
    }

    /// 音色目录名列表
    #[must_use]
    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    /// 指定槽位的采样路径（按目录顺序）
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&[PathBuf]> {
        self.samples.get(&slot).map(Vec::as_slice)
    }
}

/// 列出 `root` 下的音色目录
///
/// # Errors
///
/// - 无法读取 `root`
/// - 缺少名为 `default_name` 的目录
pub fn discover_instrument_folders(
    root: &Path,
    default_name: &str,
) -> Result<Vec<String>, ConfigError> {
    let read_dir = std::fs::read_dir(root).map_err(|source| ConfigError::ReadDir {
        path: root.to_path_buf(),
        source,
    })?;
    let mut folders: Vec<String> = read_dir
        .filter_map(|r| {
            let entry = r.ok()?;
            let name = entry.file_name().to_str()?.to_string();
            if name.starts_with('.') {
                return None;
            }
            let is_dir = std::fs::metadata(entry.path()).ok()?.is_dir();
            is_dir.then_some(name)
        })
        .collect();
    // read_dir 顺序依赖平台，统一排序保证目录顺序稳定
    folders.sort();
    if !folders.iter().any(|f| f == default_name) {
        return Err(ConfigError::MissingDefaultFolder {
            root: root.to_path_buf(),
            name: default_name.to_string(),
        });
    }
    Ok(folders)
}

/// 将 `default_name` 移到首位，其余目录保持相对顺序
#[must_use]
pub fn reorder(mut folders: Vec<String>, default_name: &str) -> Vec<String> {
    if let Some(pos) = folders.iter().position(|f| f == default_name) {
        let default = folders.remove(pos);
        folders.insert(0, default);
    }
    folders
}

/// 为槽位 `slot_count..=1` 生成每个目录下的采样路径
///
/// # Errors
///
/// - 任一路径不存在
pub fn build_sample_paths(
    root: &Path,
    folders: &[String],
    slot_count: usize,
) -> Result<BTreeMap<usize, Vec<PathBuf>>, ConfigError> {
    let mut samples = BTreeMap::new();
    for slot in (1..=slot_count).rev() {
        let mut paths = Vec::with_capacity(folders.len());
        for folder in folders {
            let path = root.join(folder).join(format!("note{slot}.wav"));
            if !path.is_file() {
                return Err(ConfigError::MissingSample { path });
            }
            paths.push(path);
        }
        samples.insert(slot, paths);
    }
    Ok(samples)
}
