//! batch-transcribe - 音声ファイルの一括文字起こしシステム
//!
//! このクレートは、任意の数の音声ファイルを固定サイズのグループに分け、
//! Deepgram APIで並列に文字起こしし、結果をテキストファイルとZIPにまとめる。
//!
//! # 主な機能
//!
//! - **グループ分割**: 入力を先頭から固定サイズ（既定10件）のグループに分割
//! - **並列実行**: グループ内は同時実行数の上限付きで並列処理、グループ間は順次処理
//! - **失敗の分離**: 1件の失敗が他のファイルやバッチ全体を止めない
//! - **結果台帳**: 全ファイルの成否をちょうど1回ずつ記録
//! - **ZIP出力**: 成功したテキストファイルを1つのZIPにまとめる
//!
//! # アーキテクチャ
//!
//! ```text
//! [入力ファイル] → [BatchScheduler] ─ グループ1 → グループ2 → ...
//!                        │
//!                        ↓ (グループ内で並列)
//!                  [ItemWorker (×N)]
//!                   ステージング → [TranscriptionClient] → 保存 → 後片付け
//!                        │
//!                        ↓
//!                  [ResultLedger] → [package] → [ZIP]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use batch_transcribe::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod config;
pub mod deepgram_api;
pub mod error;
pub mod input;
pub mod ledger;
pub mod packaging;
pub mod scheduler;
pub mod transcribe_backend;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;
