use crate::error::BatchError;
use crate::ledger::ResultLedger;
use crate::types::{BatchProgress, ErrorKind, InputItem, Outcome, TranscriptionOptions};
use crate::worker::ItemWorker;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// 1グループあたりのファイル数
pub const DEFAULT_GROUP_SIZE: usize = 10;

/// グループ内の同時実行数の上限
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// バッチ実行パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub group_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// 入力を先頭から `group_size` 件ずつの連続したグループに分割
///
/// 同じ入力と `group_size` に対しては常に同じ分割を返す。
/// `group_size` が 0 の場合は空を返す。
pub fn partition<T>(items: &[T], group_size: usize) -> Vec<&[T]> {
    if group_size == 0 {
        return Vec::new();
    }
    items.chunks(group_size).collect()
}

/// バッチスケジューラ
///
/// グループを1つずつ順番に処理し、グループ内では全ファイルのワーカーを
/// `min(グループサイズ, max_concurrency)` の同時実行数で並列に動かす。
/// あるグループの結果は次のグループを開始する前に必ず台帳へ反映される。
pub struct BatchScheduler {
    worker: Arc<ItemWorker>,
    settings: BatchSettings,
    progress_tx: Option<mpsc::Sender<BatchProgress>>,
    running: Option<Arc<AtomicBool>>,
}

impl BatchScheduler {
    pub fn new(worker: ItemWorker, settings: BatchSettings) -> Self {
        Self {
            worker: Arc::new(worker),
            settings,
            progress_tx: None,
            running: None,
        }
    }

    /// グループ完了ごとの進捗通知先を設定
    pub fn with_progress(mut self, tx: mpsc::Sender<BatchProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// 実行継続フラグを設定
    ///
    /// フラグはグループの境界でのみ確認される。`false` になると残りのグループは
    /// 実行されず、その全ファイルが `Cancelled` として台帳に記録される。
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    /// バッチ全体を実行
    ///
    /// # Errors
    ///
    /// 入力が空、設定が不正、ファイル名が重複、作業ディレクトリを作成できない場合。
    /// 1件ごとの失敗はエラーにならず台帳に記録される。
    pub async fn run(
        &self,
        items: Vec<InputItem>,
        options: TranscriptionOptions,
    ) -> Result<ResultLedger, BatchError> {
        self.validate(&items)?;
        self.worker.work_area().prepare()?;

        let items: Vec<Arc<InputItem>> = items.into_iter().map(Arc::new).collect();
        let options = Arc::new(options);
        let groups = partition(&items, self.settings.group_size);
        let total_groups = groups.len();

        log::info!(
            "{} 件のファイルを {} グループで処理します (グループサイズ {}, 同時実行数 {})",
            items.len(),
            total_groups,
            self.settings.group_size,
            self.settings.max_concurrency
        );

        let mut ledger = ResultLedger::new();

        for (group_index, group) in groups.iter().enumerate() {
            if !self.is_running() {
                log::warn!(
                    "停止要求を受信しました。残り {} グループをスキップします",
                    total_groups - group_index
                );
                let skipped = groups[group_index..].iter().flat_map(|g| g.iter()).map(|item| {
                    Outcome::failure(&item.name, ErrorKind::Cancelled, "停止要求により処理されませんでした")
                });
                ledger.merge(skipped)?;
                break;
            }

            log::info!(
                "グループ {}/{} を処理中 ({} ファイル)",
                group_index + 1,
                total_groups,
                group.len()
            );

            let outcomes = self.run_group(group, &options).await;
            let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
            let failed = outcomes.len() - succeeded;

            ledger.merge(outcomes)?;

            log::info!(
                "グループ {}/{} 完了: 成功 {} 件, 失敗 {} 件",
                group_index + 1,
                total_groups,
                succeeded,
                failed
            );

            self.report_progress(BatchProgress {
                group_index,
                total_groups,
                group_len: group.len(),
                succeeded,
                failed,
            });
        }

        log::info!(
            "バッチ処理完了: 成功 {} 件, 失敗 {} 件",
            ledger.success_count(),
            ledger.failure_count()
        );

        Ok(ledger)
    }

    fn validate(&self, items: &[InputItem]) -> Result<(), BatchError> {
        if items.is_empty() {
            log::error!("文字起こし対象のファイルがありません");
            return Err(BatchError::EmptyInput);
        }
        if self.settings.group_size == 0 {
            return Err(BatchError::InvalidSettings("group_size は1以上が必要です".to_string()));
        }
        if self.settings.max_concurrency == 0 {
            return Err(BatchError::InvalidSettings(
                "max_concurrency は1以上が必要です".to_string(),
            ));
        }

        // 名前が異なっても、ステージング先か出力先が同じなら同時に書き込んでしまう
        let mut names = HashSet::with_capacity(items.len());
        let mut staging_names = HashSet::with_capacity(items.len());
        let mut output_names = HashSet::with_capacity(items.len());
        for item in items {
            if !names.insert(item.name.as_str()) {
                return Err(BatchError::DuplicateItem(item.name.clone()));
            }
            if let Some(staging_name) = item.staging_name() {
                if !staging_names.insert(staging_name.clone()) {
                    log::error!("ステージング先が重複しています: {} → {}", item.name, staging_name);
                    return Err(BatchError::DuplicateItem(item.name.clone()));
                }
            }
            if let Some(output_name) = item.output_name() {
                if !output_names.insert(output_name.clone()) {
                    log::error!("出力先が重複しています: {} → {}", item.name, output_name);
                    return Err(BatchError::DuplicateItem(item.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// 1グループを実行し、完了順に結果を集める
    async fn run_group(
        &self,
        group: &[Arc<InputItem>],
        options: &Arc<TranscriptionOptions>,
    ) -> Vec<Outcome> {
        let pool_size = group.len().min(self.settings.max_concurrency);
        let permits = Arc::new(Semaphore::new(pool_size));
        let mut tasks = JoinSet::new();
        let mut pending: HashSet<String> = HashSet::with_capacity(group.len());

        for item in group {
            pending.insert(item.name.clone());

            let worker = Arc::clone(&self.worker);
            let item = Arc::clone(item);
            let options = Arc::clone(options);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // セマフォはこのグループの間クローズされない
                let _permit = permits.acquire_owned().await.ok();
                worker.process(&item, &options).await
            });
        }

        let mut outcomes = Vec::with_capacity(group.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(outcome.input_name());
                    outcomes.push(outcome);
                }
                Err(e) => {
                    log::error!("ワーカータスクが異常終了しました: {}", e);
                }
            }
        }

        // 異常終了したワーカーの分も1件の失敗として残す
        for item in group.iter().filter(|item| pending.contains(&item.name)) {
            self.worker.discard_staging(item).await;
            outcomes.push(Outcome::failure(
                &item.name,
                ErrorKind::Internal,
                "ワーカーが異常終了しました",
            ));
        }

        outcomes
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(true)
    }

    fn report_progress(&self, progress: BatchProgress) {
        if let Some(tx) = &self.progress_tx {
            if let Err(e) = tx.try_send(progress) {
                log::warn!("進捗通知の送信に失敗: {}", e);
            }
        }
    }
}

/// 既定の同時実行数でバッチを実行
pub async fn run_batch(
    worker: ItemWorker,
    items: Vec<InputItem>,
    options: TranscriptionOptions,
    group_size: usize,
) -> Result<ResultLedger, BatchError> {
    let settings = BatchSettings {
        group_size,
        max_concurrency: DEFAULT_MAX_CONCURRENCY,
    };
    BatchScheduler::new(worker, settings).run(items, options).await
}
