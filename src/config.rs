use crate::deepgram_api::DeepgramConfig as DeepgramClientConfig;
use crate::input::InputPolicy;
use crate::scheduler::BatchSettings;
use crate::types::TranscriptionOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// APIキーを読み込む環境変数名
pub const API_KEY_ENV: &str = "DEEPGRAM_API_KEY";

/// 選択可能な言語コード
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("English", "en"),
    ("Polish", "pl"),
    ("Spanish", "es"),
    ("French", "fr"),
    ("German", "de"),
    ("Italian", "it"),
    ("Portuguese", "pt"),
    ("Dutch", "nl"),
    ("Russian", "ru"),
    ("Chinese", "zh"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub deepgram: DeepgramConfig,
    #[serde(default)]
    pub input: InputConfig,
}

/// バッチ実行設定
///
/// # デフォルト値
///
/// - `group_size`: 10 (1グループあたりのファイル数)
/// - `max_concurrency`: 10 (グループ内の同時実行数)
/// - `staging_dir`: "./staging"
/// - `output_dir`: "./outputs"
/// - `archive_dir`: "." (ZIPファイルの出力先)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

/// 文字起こしオプション設定
///
/// # デフォルト値
///
/// - `language`: "en"
/// - `smart_format`: true
/// - `punctuate`: true
/// - `api_key`: なし (環境変数 `DEEPGRAM_API_KEY` を使用)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub smart_format: bool,
    #[serde(default = "default_true")]
    pub punctuate: bool,
    /// Deepgram API Key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Deepgram API 設定
///
/// # デフォルト値
///
/// - `endpoint`: "https://api.deepgram.com/v1/listen"
/// - `model`: "nova-3"
/// - `timeout_seconds`: 600 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 入力ファイル検証設定
///
/// # デフォルト値
///
/// - `extensions`: ["mp3"]
/// - `min_size_mb`: 0.1 MB
/// - `max_size_mb`: 2000 MB
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_min_size_mb")]
    pub min_size_mb: f64,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,
}

// Default functions
fn default_group_size() -> usize {
    10
}

fn default_max_concurrency() -> usize {
    10
}

fn default_staging_dir() -> String {
    "./staging".to_string()
}

fn default_output_dir() -> String {
    "./outputs".to_string()
}

fn default_archive_dir() -> String {
    ".".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.deepgram.com/v1/listen".to_string()
}

fn default_model() -> String {
    "nova-3".to_string()
}

fn default_timeout_seconds() -> u64 {
    600 // 長時間の音声ファイルを想定
}

fn default_extensions() -> Vec<String> {
    vec!["mp3".to_string()]
}

fn default_min_size_mb() -> f64 {
    0.1
}

fn default_max_size_mb() -> f64 {
    2000.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            transcription: TranscriptionConfig::default(),
            deepgram: DeepgramConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            max_concurrency: default_max_concurrency(),
            staging_dir: default_staging_dir(),
            output_dir: default_output_dir(),
            archive_dir: default_archive_dir(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            smart_format: default_true(),
            punctuate: default_true(),
            api_key: None,
        }
    }
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            min_size_mb: default_min_size_mb(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl BatchConfig {
    pub fn settings(&self) -> BatchSettings {
        BatchSettings {
            group_size: self.group_size,
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn staging_path(&self) -> PathBuf {
        PathBuf::from(&self.staging_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        PathBuf::from(&self.archive_dir)
    }
}

impl TranscriptionConfig {
    /// 文字起こしオプションを生成
    ///
    /// APIキーは設定ファイルの値を優先し、なければ環境変数から取得する。
    /// どちらもない場合は空文字列となり、各ファイルの処理が認証エラーになる。
    pub fn options(&self) -> TranscriptionOptions {
        let credential = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        if credential.is_empty() {
            log::warn!(
                "APIキーが設定されていません ({} または transcription.api_key)",
                API_KEY_ENV
            );
        }

        if !SUPPORTED_LANGUAGES.iter().any(|(_, code)| *code == self.language) {
            log::warn!("未対応の可能性がある言語コードです: {}", self.language);
        }

        TranscriptionOptions {
            language: self.language.clone(),
            smart_format: self.smart_format,
            punctuate: self.punctuate,
            credential,
        }
    }
}

impl DeepgramConfig {
    pub fn client_config(&self) -> DeepgramClientConfig {
        DeepgramClientConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

impl InputConfig {
    pub fn policy(&self) -> InputPolicy {
        InputPolicy {
            extensions: self.extensions.clone(),
            min_size_bytes: mb_to_bytes(self.min_size_mb),
            max_size_bytes: mb_to_bytes(self.max_size_mb),
        }
    }
}

fn mb_to_bytes(mb: f64) -> u64 {
    (mb * 1024.0 * 1024.0) as u64
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use batch_transcribe::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}
