use crate::error::TranscribeError;
use crate::types::TranscriptionOptions;
use async_trait::async_trait;

/// 文字起こしバックエンドの共通トレイト
///
/// バッチエンジンはこのトレイトだけに依存する。
/// 実装は複数のワーカーから同時に呼ばれるため `Send + Sync` が必要。
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// 音声データ1件を文字起こし
    ///
    /// # Returns
    /// 文字起こしテキスト、または分類済みのエラー
    async fn transcribe(
        &self,
        payload: &[u8],
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError>;

    /// バックエンド名（ログ用）
    fn name(&self) -> &str;
}
