//! テスト用の文字起こしクライアント
//!
//! ペイロードをUTF-8文字列として解釈し、その文字列をキーに応答を切り替える。

use crate::error::TranscribeError;
use crate::transcribe_backend::TranscriptionClient;
use crate::types::TranscriptionOptions;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallEvent {
    Start(String),
    End(String),
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct MockClient {
    failures: HashMap<String, TranscribeError>,
    panics: HashSet<String>,
    hooks: HashMap<String, Hook>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    events: Mutex<Vec<CallEvent>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, key: &str, error: TranscribeError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }

    /// 呼び出し時にパニックさせる
    pub fn panic(mut self, key: &str) -> Self {
        self.panics.insert(key.to_string());
        self
    }

    /// 呼び出し中（応答を返す前）に任意の処理を実行する
    pub fn on_call<F>(mut self, key: &str, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.insert(key.to_string(), Box::new(hook));
        self
    }

    pub fn delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionClient for MockClient {
    async fn transcribe(
        &self,
        payload: &[u8],
        _options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError> {
        let key = String::from_utf8_lossy(payload).to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(CallEvent::Start(key.clone()));

        if self.panics.contains(&key) {
            panic!("mock client panicked on {}", key);
        }
        if let Some(hook) = self.hooks.get(&key) {
            hook();
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&key).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(CallEvent::End(key.clone()));

        match self.failures.get(&key) {
            Some(error) => Err(error.clone()),
            None => Ok(format!("transcript of {}", key)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn options() -> TranscriptionOptions {
    TranscriptionOptions {
        language: "en".to_string(),
        smart_format: true,
        punctuate: true,
        credential: "test-key".to_string(),
    }
}
