use crate::error::TranscribeError;
use crate::transcribe_backend::TranscriptionClient;
use crate::types::TranscriptionOptions;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Deepgram API設定
#[derive(Debug, Clone)]
pub struct DeepgramConfig {
    pub endpoint: String,     // "https://api.deepgram.com/v1/listen"
    pub model: String,        // "nova-3"
    pub timeout_seconds: u64, // 大きなファイルは数分かかる
}

/// Deepgram API レスポンス（必要な部分のみ）
#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    results: Option<DeepgramResults>,
}

#[derive(Debug, Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    #[serde(default)]
    transcript: String,
}

/// Deepgram 録音済み音声 API バックエンド
pub struct DeepgramClient {
    config: DeepgramConfig,
    client: reqwest::Client,
}

impl DeepgramClient {
    pub fn new(config: DeepgramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Deepgram API HTTPクライアント作成失敗")?;

        Ok(Self { config, client })
    }

    /// HTTPステータスをエラー種別に分類
    fn classify_status(status: StatusCode, body: &str) -> TranscribeError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscribeError::Authentication(
                "API authentication failed. Check your API key.".to_string(),
            ),
            StatusCode::TOO_MANY_REQUESTS => TranscribeError::RateLimit(
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TranscribeError::Timeout(
                "Request timeout. File may be too large or API is busy.".to_string(),
            ),
            other => TranscribeError::Provider(format!("Deepgram API エラー: {} - {}", other, body)),
        }
    }

    /// 通信エラーをエラー種別に分類
    fn classify_request_error(error: reqwest::Error) -> TranscribeError {
        if error.is_timeout() {
            TranscribeError::Timeout(
                "Request timeout. File may be too large or API is busy.".to_string(),
            )
        } else {
            TranscribeError::Provider(format!("Deepgram API リクエスト失敗: {}", error))
        }
    }

    /// レスポンスから最初のチャンネルの第1候補を取り出す
    fn extract_transcript(response: DeepgramResponse) -> Result<String, TranscribeError> {
        response
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .ok_or_else(|| {
                TranscribeError::Provider("No transcription results returned from API".to_string())
            })
    }
}

#[async_trait]
impl TranscriptionClient for DeepgramClient {
    async fn transcribe(
        &self,
        payload: &[u8],
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError> {
        if options.credential.trim().is_empty() {
            return Err(TranscribeError::Authentication(
                "API key is not configured. Set DEEPGRAM_API_KEY or transcription.api_key.".to_string(),
            ));
        }

        log::debug!(
            "Deepgram API: {} バイトを送信 (model={}, language={})",
            payload.len(),
            self.config.model,
            options.language
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[
                ("model", self.config.model.as_str()),
                ("language", options.language.as_str()),
                ("smart_format", bool_param(options.smart_format)),
                ("punctuate", bool_param(options.punctuate)),
            ])
            .header("Authorization", format!("Token {}", options.credential))
            .header("Content-Type", "audio/mpeg")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(Self::classify_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &error_text));
        }

        let deepgram_response: DeepgramResponse = response
            .json::<DeepgramResponse>()
            .await
            .map_err(|e| TranscribeError::Provider(format!("Deepgram API レスポンスパース失敗: {}", e)))?;

        Self::extract_transcript(deepgram_response)
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
