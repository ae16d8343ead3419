use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// 入力音声ファイル
///
/// 1回の実行に投入される音声ファイル1件分のデータ。
/// 投入後は変更されず、ワーカー間では `Arc<InputItem>` として共有される。
///
/// # Examples
///
/// ```
/// # use batch_transcribe::types::InputItem;
/// let item = InputItem::new("meeting.mp3", vec![0u8; 1024]);
/// assert_eq!(item.name, "meeting.mp3");
/// assert_eq!(item.size, 1024);
/// ```
#[derive(Clone)]
pub struct InputItem {
    /// 元のファイル名（実行内で一意）
    pub name: String,

    /// 音声データ（生バイト列）
    pub payload: Vec<u8>,

    /// サイズ（バイト）
    pub size: u64,
}

impl InputItem {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        let size = payload.len() as u64;
        Self {
            name: name.into(),
            payload,
            size,
        }
    }

    /// 出力ファイル名（`{stem}.txt`）
    ///
    /// ファイル名部分を取り出せない識別子の場合は `None` を返す。
    pub fn output_name(&self) -> Option<String> {
        let stem = Path::new(&self.name).file_stem()?.to_str()?;
        Some(format!("{}.txt", stem))
    }

    /// ステージング用ファイル名（ディレクトリ成分を除いたファイル名）
    pub fn staging_name(&self) -> Option<String> {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
    }
}

impl fmt::Debug for InputItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputItem")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

/// 文字起こしオプション
///
/// 1回の実行中は全ワーカーで読み取り専用として共有される。
#[derive(Clone, PartialEq, Eq)]
pub struct TranscriptionOptions {
    /// 言語コード（"en", "ja" など）
    pub language: String,

    /// スマートフォーマット
    pub smart_format: bool,

    /// 句読点の付与
    pub punctuate: bool,

    /// APIキー
    pub credential: String,
}

impl fmt::Debug for TranscriptionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionOptions")
            .field("language", &self.language)
            .field("smart_format", &self.smart_format)
            .field("punctuate", &self.punctuate)
            .field("credential", &"***")
            .finish()
    }
}

/// 1件の処理失敗の分類
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 入力ファイルの検証エラー（拡張子・サイズ）
    InvalidInput,
    /// ステージングへの書き込み・読み込み失敗
    Staging,
    /// 認証エラー（APIキー不正・未設定）
    Authentication,
    /// レート制限
    RateLimit,
    /// タイムアウト
    Timeout,
    /// その他のプロバイダエラー
    Provider,
    /// 文字起こし結果の保存失敗
    Persistence,
    /// 停止要求により未実行
    Cancelled,
    /// ワーカーの異常終了
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInputError",
            ErrorKind::Staging => "StagingError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::RateLimit => "RateLimitError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Provider => "ProviderError",
            ErrorKind::Persistence => "PersistenceError",
            ErrorKind::Cancelled => "CancelledError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

/// 1件の処理結果
///
/// ワーカーが入力1件につき必ず1つだけ生成する。
///
/// # JSON出力例
///
/// ```json
/// { "status": "success", "input_name": "a.mp3", "output_name": "a.txt", "output_location": "outputs/a.txt" }
/// { "status": "failure", "input_name": "b.mp3", "error_kind": "rate_limit", "error_detail": "..." }
/// ```
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        input_name: String,
        output_name: String,
        output_location: PathBuf,
    },
    Failure {
        input_name: String,
        error_kind: ErrorKind,
        error_detail: String,
    },
}

impl Outcome {
    pub fn failure(input_name: impl Into<String>, error_kind: ErrorKind, error_detail: impl Into<String>) -> Self {
        Outcome::Failure {
            input_name: input_name.into(),
            error_kind,
            error_detail: error_detail.into(),
        }
    }

    /// 入力ファイル名を取得
    pub fn input_name(&self) -> &str {
        match self {
            Outcome::Success { input_name, .. } => input_name,
            Outcome::Failure { input_name, .. } => input_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// グループ完了時の進捗通知
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct BatchProgress {
    /// 完了したグループの番号（0始まり）
    pub group_index: usize,

    /// グループ総数
    pub total_groups: usize,

    /// このグループのファイル数
    pub group_len: usize,

    /// このグループの成功数
    pub succeeded: usize,

    /// このグループの失敗数
    pub failed: usize,
}

impl BatchProgress {
    /// 進捗率（0.0〜1.0）
    pub fn fraction(&self) -> f64 {
        if self.total_groups == 0 {
            return 1.0;
        }
        (self.group_index + 1) as f64 / self.total_groups as f64
    }
}
