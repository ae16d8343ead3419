use crate::types::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// バッチ全体を中断する構造的エラー
///
/// 1件ごとの失敗は `Outcome::Failure` として台帳に記録され、このエラーにはならない。
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("文字起こし対象のファイルがありません")]
    EmptyInput,

    #[error("同じファイル名が重複しています: {0}")]
    DuplicateItem(String),

    #[error("パッケージ対象のファイルがありません")]
    NoFilesToPackage,

    #[error("バッチ設定が不正です: {0}")]
    InvalidSettings(String),

    #[error("作業ディレクトリを準備できません: {path:?}: {source}")]
    WorkArea {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ディレクトリが存在しません: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("ファイル操作に失敗: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIPファイルの作成に失敗: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// 文字起こしクライアントのエラー
///
/// 各バリアントは `ErrorKind` に1対1で対応し、メッセージはそのまま失敗詳細になる。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscribeError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Provider(String),
}

impl TranscribeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscribeError::Authentication(_) => ErrorKind::Authentication,
            TranscribeError::RateLimit(_) => ErrorKind::RateLimit,
            TranscribeError::Timeout(_) => ErrorKind::Timeout,
            TranscribeError::Provider(_) => ErrorKind::Provider,
        }
    }
}
