use anyhow::{bail, Context, Result};
use batch_transcribe::config::Config;
use batch_transcribe::deepgram_api::DeepgramClient;
use batch_transcribe::input::load_inputs;
use batch_transcribe::packaging::{clear_staging, package};
use batch_transcribe::scheduler::BatchScheduler;
use batch_transcribe::types::BatchProgress;
use batch_transcribe::worker::{ItemWorker, WorkArea};
use env_logger::Env;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const USAGE: &str = "使い方:
  batch-transcribe [--config <PATH>] <FILE|DIR>...
  batch-transcribe --generate-config [PATH]
  batch-transcribe --clear [--config <PATH>]";

/// コマンドライン引数
struct Args {
    config_path: String,
    mode: Mode,
}

enum Mode {
    GenerateConfig(String),
    Clear,
    Run(Vec<PathBuf>),
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config_path = "config.toml".to_string();
    let mut clear = false;
    let mut inputs = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--generate-config" => {
                let path = iter.next().cloned().unwrap_or_else(|| "config.toml".to_string());
                return Ok(Args {
                    config_path,
                    mode: Mode::GenerateConfig(path),
                });
            }
            "--config" => {
                config_path = iter
                    .next()
                    .cloned()
                    .with_context(|| "--config には設定ファイルのパスが必要です")?;
            }
            "--clear" => clear = true,
            "--help" | "-h" => bail!("{}", USAGE),
            other if other.starts_with("--") => bail!("不明なオプション: {}\n{}", other, USAGE),
            other => inputs.push(PathBuf::from(other)),
        }
    }

    let mode = if clear {
        Mode::Clear
    } else if inputs.is_empty() {
        bail!("入力ファイルを指定してください\n{}", USAGE);
    } else {
        Mode::Run(inputs)
    };

    Ok(Args { config_path, mode })
}

/// 進捗表示タスクの終了を待つ（異常終了は警告のみ）
async fn join_progress_task(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("進捗表示タスクが異常終了しました: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // .env からAPIキーなどを読み込み（なければ無視）
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    let inputs = match args.mode {
        Mode::GenerateConfig(path) => {
            Config::write_default(&path)?;
            println!("設定ファイルを生成しました: {}", path);
            return Ok(());
        }
        Mode::Clear => {
            let config = Config::load_or_default(&args.config_path)?;
            for dir in [config.batch.staging_path(), config.batch.output_path()] {
                if dir.is_dir() {
                    clear_staging(&dir)?;
                }
            }
            println!("結果をクリアしました");
            return Ok(());
        }
        Mode::Run(inputs) => inputs,
    };

    let config = Config::load_or_default(&args.config_path)?;

    log::info!("batch-transcribe を起動します");
    log::info!("設定: {:?}", config.batch);

    let items = load_inputs(&inputs, &config.input.extensions)?;
    let total_groups = items.len().div_ceil(config.batch.group_size.max(1));
    log::info!(
        "{} 件のファイルを最大 {} 件ずつ {} グループで文字起こしします",
        items.len(),
        config.batch.group_size,
        total_groups
    );

    // Ctrl+C ハンドラを設定（グループの境界で停止）
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        log::info!("停止シグナルを受信しました。現在のグループの完了後に停止します...");
        running_clone.store(false, Ordering::SeqCst);
    })?;

    let client = DeepgramClient::new(config.deepgram.client_config())
        .context("Deepgram クライアントの初期化に失敗")?;
    let work_area = WorkArea::new(config.batch.staging_path(), config.batch.output_path());
    let worker =
        ItemWorker::new(Arc::new(client), work_area).with_input_policy(config.input.policy());

    // 進捗表示タスク
    let (progress_tx, mut progress_rx) = mpsc::channel::<BatchProgress>(64);
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            log::info!(
                "進捗: {}/{} グループ ({:.0}%)",
                progress.group_index + 1,
                progress.total_groups,
                progress.fraction() * 100.0
            );
        }
    });

    let scheduler = BatchScheduler::new(worker, config.batch.settings())
        .with_progress(progress_tx)
        .with_running_flag(running);

    let options = config.transcription.options();
    let ledger = scheduler.run(items, options).await?;

    // 送信側を閉じて進捗タスクを終了させる
    drop(scheduler);
    join_progress_task(progress_task).await;

    // 台帳をJSON形式で出力
    println!("{}", serde_json::to_string_pretty(&ledger)?);

    if ledger.success_count() == 0 {
        log::error!("文字起こしに成功したファイルはありません");
        return Ok(());
    }

    if ledger.failure_count() > 0 {
        log::warn!("{} 件のファイルの文字起こしに失敗しました", ledger.failure_count());
    }

    let archive_path = package(&ledger.output_locations(), config.batch.archive_path())?;
    log::info!("ZIPファイル: {:?}", archive_path);

    log::info!("batch-transcribe を終了しました");

    Ok(())
}
