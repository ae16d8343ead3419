use crate::types::InputItem;
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 入力ファイルの検証ルール
///
/// 拡張子は大文字小文字を区別しない。
#[derive(Debug, Clone, PartialEq)]
pub struct InputPolicy {
    pub extensions: Vec<String>,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
}

impl InputPolicy {
    /// 拡張子が許可されているか
    pub fn accepts_extension(&self, name: &str) -> bool {
        let ext = match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return false,
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }

    /// 1件の入力を検証
    ///
    /// # Errors
    ///
    /// 拡張子またはサイズが規則に合わない場合、理由を返す。
    pub fn validate(&self, item: &InputItem) -> std::result::Result<(), String> {
        if !self.accepts_extension(&item.name) {
            return Err(format!(
                "Invalid file format. Only {} files are supported.",
                self.extensions.join(", ")
            ));
        }

        let size_mb = item.size as f64 / (1024.0 * 1024.0);
        if item.size > self.max_size_bytes {
            return Err(format!(
                "File is too large ({:.2}MB). Max size is {:.2}MB.",
                size_mb,
                self.max_size_bytes as f64 / (1024.0 * 1024.0)
            ));
        }
        if item.size < self.min_size_bytes {
            return Err(format!(
                "File is too small ({:.2}MB). Minimum size is {:.2}MB.",
                size_mb,
                self.min_size_bytes as f64 / (1024.0 * 1024.0)
            ));
        }

        Ok(())
    }
}

/// コマンドライン引数のパスから入力ファイルを読み込む
///
/// ファイルはそのまま、ディレクトリは直下の対象拡張子のファイルを名前順に展開する。
///
/// # Errors
///
/// パスが存在しない、読み込めない、またはファイル名が重複する場合にエラーを返す。
pub fn load_inputs(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<InputItem>> {
    let policy = InputPolicy {
        extensions: extensions.to_vec(),
        min_size_bytes: 0,
        max_size_bytes: u64::MAX,
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("ディレクトリの読み込みに失敗: {:?}", path))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| policy.accepts_extension(n))
                        .unwrap_or(false)
                })
                .collect();
            entries.sort();
            log::debug!("{:?}: {} 件の対象ファイル", path, entries.len());
            files.extend(entries);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("入力ファイルが見つかりません: {:?}", path);
        }
    }

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("ファイル名を取得できません: {:?}", file))?
            .to_string();

        if !seen.insert(name.clone()) {
            bail!("同じファイル名が複数指定されています: {}", name);
        }

        let payload =
            fs::read(&file).with_context(|| format!("入力ファイルの読み込みに失敗: {:?}", file))?;
        items.push(InputItem::new(name, payload));
    }

    Ok(items)
}
