use crate::error::BatchError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 文字起こし結果をZIPファイルにまとめる
///
/// ファイル名は `transcriptions_YYYY-mm-dd_HH-MM-SS.zip`。
/// 各エントリはディレクトリを含まないファイル名のみで格納する。
///
/// # Errors
///
/// 対象が空の場合は `NoFilesToPackage`、読み書きに失敗した場合はそのエラーを返す。
pub fn package<P: AsRef<Path>>(output_locations: &[PathBuf], destination: P) -> Result<PathBuf, BatchError> {
    if output_locations.is_empty() {
        log::error!("パッケージ対象のファイルがありません");
        return Err(BatchError::NoFilesToPackage);
    }

    let destination = destination.as_ref();
    fs::create_dir_all(destination)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let archive_path = destination.join(format!("transcriptions_{}.zip", timestamp));

    log::info!(
        "{} 件のファイルをZIPにまとめます: {:?}",
        output_locations.len(),
        archive_path
    );

    let mut zip = ZipWriter::new(File::create(&archive_path)?);

    for location in output_locations {
        let entry_name = location
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("ファイル名を取得できません: {:?}", location),
                )
            })?
            .to_string();

        let mut source = File::open(location)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(entry_name, options)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;

    log::info!("ZIPファイル作成完了: {:?}", archive_path);
    Ok(archive_path)
}

/// ディレクトリ内のファイルをすべて削除
///
/// サブディレクトリは残す。
///
/// # Returns
/// 削除したファイル数
pub fn clear_staging<P: AsRef<Path>>(staging_area: P) -> Result<usize, BatchError> {
    let dir = staging_area.as_ref();
    if !dir.is_dir() {
        return Err(BatchError::MissingDirectory(dir.to_path_buf()));
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }

    log::info!("{:?}: {} 件のファイルを削除しました", dir, removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_package_creates_archive() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let outputs = temp_dir.path().join("outputs");
        fs::create_dir_all(&outputs)?;
        fs::write(outputs.join("a.txt"), "alpha")?;
        fs::write(outputs.join("b.txt"), "bravo")?;

        let archive_path = package(
            &[outputs.join("a.txt"), outputs.join("b.txt")],
            temp_dir.path().join("archive"),
        )?;

        let file_name = archive_path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("transcriptions_"));
        assert!(file_name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(File::open(&archive_path)?)?;
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive.by_name("b.txt")?.read_to_string(&mut content)?;
        assert_eq!(content, "bravo");
        Ok(())
    }

    #[test]
    fn test_package_empty_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = package(&[], temp_dir.path());
        assert!(matches!(result, Err(BatchError::NoFilesToPackage)));
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_package_missing_source_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = package(&[temp_dir.path().join("gone.txt")], temp_dir.path());
        assert!(matches!(result, Err(BatchError::Io(_))));
    }

    #[test]
    fn test_clear_staging_removes_files_only() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("x.mp3"), b"x")?;
        fs::write(temp_dir.path().join("y.txt"), b"y")?;
        fs::create_dir(temp_dir.path().join("nested"))?;

        let removed = clear_staging(temp_dir.path())?;

        assert_eq!(removed, 2);
        assert!(temp_dir.path().join("nested").is_dir());
        assert!(!temp_dir.path().join("x.mp3").exists());
        Ok(())
    }

    #[test]
    fn test_clear_staging_missing_directory() {
        let result = clear_staging("/nonexistent/staging/dir");
        assert!(matches!(result, Err(BatchError::MissingDirectory(_))));
    }
}
