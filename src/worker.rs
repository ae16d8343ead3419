use crate::error::BatchError;
use crate::input::InputPolicy;
use crate::transcribe_backend::TranscriptionClient;
use crate::types::{ErrorKind, InputItem, Outcome, TranscriptionOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// ステージングと出力のディレクトリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkArea {
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkArea {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(staging_dir: P, output_dir: Q) -> Self {
        Self {
            staging_dir: staging_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// ディレクトリが存在しない場合は作成
    pub fn prepare(&self) -> Result<(), BatchError> {
        for dir in [&self.staging_dir, &self.output_dir] {
            std::fs::create_dir_all(dir).map_err(|source| BatchError::WorkArea {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// 1ファイル分の処理パイプライン
///
/// ステージング、文字起こし、保存、後片付けを1つの単位として実行し、
/// どの段階で失敗しても必ず `Outcome` を1つ返す。
pub struct ItemWorker {
    client: Arc<dyn TranscriptionClient>,
    work_area: WorkArea,
    policy: Option<InputPolicy>,
}

impl ItemWorker {
    pub fn new(client: Arc<dyn TranscriptionClient>, work_area: WorkArea) -> Self {
        Self {
            client,
            work_area,
            policy: None,
        }
    }

    /// 入力検証ルールを設定
    pub fn with_input_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn work_area(&self) -> &WorkArea {
        &self.work_area
    }

    /// 1件を処理
    pub async fn process(&self, item: &InputItem, options: &TranscriptionOptions) -> Outcome {
        if let Some(policy) = &self.policy {
            if let Err(reason) = policy.validate(item) {
                log::error!("入力検証エラー: {} - {}", item.name, reason);
                return Outcome::failure(&item.name, ErrorKind::InvalidInput, reason);
            }
        }

        let staging_name = match item.staging_name() {
            Some(name) => name,
            None => {
                log::error!("ステージング先を決定できません: {:?}", item.name);
                return Outcome::failure(
                    &item.name,
                    ErrorKind::Staging,
                    format!("ファイル名を取得できません: {:?}", item.name),
                );
            }
        };
        let staged_path = self.work_area.staging_dir.join(staging_name);

        let outcome = self.run_stages(item, &staged_path, options).await;

        // 成否に関わらずステージングを解放（失敗しても結果は変えない）
        release_staging(&staged_path).await;

        match &outcome {
            Outcome::Success { output_name, .. } => {
                log::info!("文字起こし完了: {} → {}", item.name, output_name);
            }
            Outcome::Failure {
                error_kind,
                error_detail,
                ..
            } => {
                log::error!("文字起こし失敗: {} [{}] {}", item.name, error_kind, error_detail);
            }
        }

        outcome
    }

    /// 処理が完了しなかったファイルのステージングを削除
    pub async fn discard_staging(&self, item: &InputItem) {
        if let Some(staging_name) = item.staging_name() {
            release_staging(&self.work_area.staging_dir.join(staging_name)).await;
        }
    }

    async fn run_stages(
        &self,
        item: &InputItem,
        staged_path: &Path,
        options: &TranscriptionOptions,
    ) -> Outcome {
        // 1. ステージング
        if let Err(e) = tokio::fs::write(staged_path, &item.payload).await {
            return Outcome::failure(
                &item.name,
                ErrorKind::Staging,
                format!("ステージングへの書き込みに失敗: {:?}: {}", staged_path, e),
            );
        }
        log::debug!("ステージング: {} ({} バイト) → {:?}", item.name, item.size, staged_path);

        let staged = match tokio::fs::read(staged_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::failure(
                    &item.name,
                    ErrorKind::Staging,
                    format!("ステージングからの読み込みに失敗: {:?}: {}", staged_path, e),
                );
            }
        };

        // 2. 文字起こし
        log::debug!("{}: {} を文字起こし中", self.client.name(), item.name);
        let transcript = match self.client.transcribe(&staged, options).await {
            Ok(text) => text,
            Err(e) => return Outcome::failure(&item.name, e.kind(), e.to_string()),
        };

        // 3. 保存
        let output_name = match item.output_name() {
            Some(name) => name,
            None => {
                return Outcome::failure(
                    &item.name,
                    ErrorKind::Persistence,
                    format!("出力ファイル名を決定できません: {:?}", item.name),
                );
            }
        };
        let output_location = self.work_area.output_dir.join(&output_name);

        if let Err(e) = tokio::fs::write(&output_location, transcript.as_bytes()).await {
            return Outcome::failure(
                &item.name,
                ErrorKind::Persistence,
                format!("文字起こし結果の保存に失敗: {:?}: {}", output_location, e),
            );
        }

        Outcome::Success {
            input_name: item.name.clone(),
            output_name,
            output_location,
        }
    }
}

async fn release_staging(staged_path: &Path) {
    match tokio::fs::remove_file(staged_path).await {
        Ok(()) => log::debug!("ステージング削除: {:?}", staged_path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("ステージングの削除に失敗: {:?}: {}", staged_path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscribeError;
    use crate::testing::{options, MockClient};
    use std::fs;
    use tempfile::TempDir;

    fn setup(client: Arc<MockClient>) -> (TempDir, ItemWorker) {
        let temp_dir = TempDir::new().unwrap();
        let work_area = WorkArea::new(temp_dir.path().join("staging"), temp_dir.path().join("outputs"));
        work_area.prepare().unwrap();
        (temp_dir, ItemWorker::new(client, work_area))
    }

    fn staging_is_empty(worker: &ItemWorker) -> bool {
        fs::read_dir(&worker.work_area().staging_dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_process_success() {
        let client = Arc::new(MockClient::new());
        let (_temp_dir, worker) = setup(client.clone());

        let item = InputItem::new("talk.mp3", b"talk".to_vec());
        let outcome = worker.process(&item, &options()).await;

        let expected_location = worker.work_area().output_dir.join("talk.txt");
        assert_eq!(
            outcome,
            Outcome::Success {
                input_name: "talk.mp3".to_string(),
                output_name: "talk.txt".to_string(),
                output_location: expected_location.clone(),
            }
        );
        assert_eq!(fs::read_to_string(expected_location).unwrap(), "transcript of talk");
        assert!(staging_is_empty(&worker));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_error_maps_to_failure_and_cleans_up() {
        let client = Arc::new(
            MockClient::new().fail("bad", TranscribeError::Authentication("API authentication failed. Check your API key.".into())),
        );
        let (_temp_dir, worker) = setup(client);

        let outcome = worker.process(&InputItem::new("bad.mp3", b"bad".to_vec()), &options()).await;

        assert_eq!(
            outcome,
            Outcome::failure(
                "bad.mp3",
                ErrorKind::Authentication,
                "API authentication failed. Check your API key."
            )
        );
        assert!(staging_is_empty(&worker));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_removes_staging() {
        let client = Arc::new(MockClient::new());
        let temp_dir = TempDir::new().unwrap();
        let staging_dir = temp_dir.path().join("staging");
        fs::create_dir_all(&staging_dir).unwrap();

        // 出力先ディレクトリは存在しない
        let work_area = WorkArea::new(&staging_dir, temp_dir.path().join("missing").join("outputs"));
        let worker = ItemWorker::new(client.clone(), work_area);

        let outcome = worker.process(&InputItem::new("lost.mp3", b"lost".to_vec()), &options()).await;

        match outcome {
            Outcome::Failure { input_name, error_kind, .. } => {
                assert_eq!(input_name, "lost.mp3");
                assert_eq!(error_kind, ErrorKind::Persistence);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(client.calls(), 1);
        assert!(!staging_dir.join("lost.mp3").exists());
        assert!(fs::read_dir(&staging_dir).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_staging_failure_skips_client() {
        let client = Arc::new(MockClient::new());
        let temp_dir = TempDir::new().unwrap();
        let work_area = WorkArea::new(temp_dir.path().join("no-staging"), temp_dir.path());
        let worker = ItemWorker::new(client.clone(), work_area);

        let outcome = worker.process(&InputItem::new("a.mp3", b"a".to_vec()), &options()).await;

        match outcome {
            Outcome::Failure { error_kind, .. } => assert_eq!(error_kind, ErrorKind::Staging),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_input_policy_rejects_before_staging() {
        let client = Arc::new(MockClient::new());
        let (_temp_dir, worker) = setup(client.clone());
        let worker = worker.with_input_policy(InputPolicy {
            extensions: vec!["mp3".to_string()],
            min_size_bytes: 0,
            max_size_bytes: 1024,
        });

        let outcome = worker.process(&InputItem::new("clip.wav", b"clip".to_vec()), &options()).await;

        match outcome {
            Outcome::Failure { error_kind, .. } => assert_eq!(error_kind, ErrorKind::InvalidInput),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(client.calls(), 0);
        assert!(staging_is_empty(&worker));
    }

    #[tokio::test]
    async fn test_nested_identifier_uses_file_name() {
        let client = Arc::new(MockClient::new());
        let (_temp_dir, worker) = setup(client);

        let outcome = worker
            .process(&InputItem::new("season1/ep.mp3", b"ep".to_vec()), &options())
            .await;

        match outcome {
            Outcome::Success { input_name, output_name, .. } => {
                assert_eq!(input_name, "season1/ep.mp3");
                assert_eq!(output_name, "ep.txt");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_success() {
        let temp_dir = TempDir::new().unwrap();
        let staged_path = temp_dir.path().join("staging").join("stuck.mp3");

        // 文字起こし中にステージングファイルをディレクトリに置き換え、削除できなくする
        let hook_path = staged_path.clone();
        let client = Arc::new(MockClient::new().on_call("stuck", move || {
            fs::remove_file(&hook_path).unwrap();
            fs::create_dir(&hook_path).unwrap();
        }));
        let work_area = WorkArea::new(temp_dir.path().join("staging"), temp_dir.path().join("outputs"));
        work_area.prepare().unwrap();
        let worker = ItemWorker::new(client.clone(), work_area);

        let outcome = worker.process(&InputItem::new("stuck.mp3", b"stuck".to_vec()), &options()).await;

        assert_eq!(
            outcome,
            Outcome::Success {
                input_name: "stuck.mp3".to_string(),
                output_name: "stuck.txt".to_string(),
                output_location: worker.work_area().output_dir.join("stuck.txt"),
            }
        );
        assert!(staged_path.is_dir());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_failure() {
        let client = Arc::new(MockClient::new());
        let (_temp_dir, worker) = setup(client.clone());

        // ステージング先にディレクトリがあると書き込みも削除も失敗する
        let staged_path = worker.work_area().staging_dir.join("blocked.mp3");
        fs::create_dir(&staged_path).unwrap();

        let outcome = worker.process(&InputItem::new("blocked.mp3", b"blocked".to_vec()), &options()).await;

        match outcome {
            Outcome::Failure { input_name, error_kind, .. } => {
                assert_eq!(input_name, "blocked.mp3");
                assert_eq!(error_kind, ErrorKind::Staging);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(staged_path.is_dir());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_discard_staging_removes_leftover() {
        let client = Arc::new(MockClient::new());
        let (_temp_dir, worker) = setup(client);
        let item = InputItem::new("season1/left.mp3", b"left".to_vec());
        fs::write(worker.work_area().staging_dir.join("left.mp3"), b"left").unwrap();

        worker.discard_staging(&item).await;
        assert!(staging_is_empty(&worker));

        // 既に無い場合も何もしない
        worker.discard_staging(&item).await;
    }

    #[test]
    fn test_prepare_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let work_area = WorkArea::new(temp_dir.path().join("a/b"), temp_dir.path().join("c"));
        work_area.prepare().unwrap();
        assert!(work_area.staging_dir.is_dir());
        assert!(work_area.output_dir.is_dir());
    }
}
