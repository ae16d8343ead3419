use crate::error::BatchError;
use crate::types::{ErrorKind, Outcome};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// 成功した1件
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SuccessEntry {
    pub output_name: String,
    pub output_location: PathBuf,
}

/// 失敗した1件
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FailureEntry {
    pub error_kind: ErrorKind,
    pub error_detail: String,
}

/// 1回の実行全体の成功・失敗台帳
///
/// 入力ファイル名をキーとし、1つのファイル名は成功・失敗のどちらか一方に1回だけ現れる。
/// `BTreeMap` なので出力順は常にファイル名順になる。
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ResultLedger {
    successes: BTreeMap<String, SuccessEntry>,
    failures: BTreeMap<String, FailureEntry>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録済みかどうか
    pub fn contains(&self, input_name: &str) -> bool {
        self.successes.contains_key(input_name) || self.failures.contains_key(input_name)
    }

    /// 1件を記録
    ///
    /// # Errors
    ///
    /// 同じファイル名が既に記録されている場合は `DuplicateItem` を返し、台帳は変更しない。
    pub fn record(&mut self, outcome: Outcome) -> Result<(), BatchError> {
        if self.contains(outcome.input_name()) {
            return Err(BatchError::DuplicateItem(outcome.input_name().to_string()));
        }
        self.insert(outcome);
        Ok(())
    }

    /// 1グループ分の結果をまとめて記録
    ///
    /// 全件を先に検査してから挿入するため、重複があれば1件も記録されない。
    pub fn merge<I>(&mut self, outcomes: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = Outcome>,
    {
        let outcomes: Vec<Outcome> = outcomes.into_iter().collect();

        let mut incoming = HashSet::with_capacity(outcomes.len());
        for outcome in &outcomes {
            let name = outcome.input_name();
            if self.contains(name) || !incoming.insert(name) {
                return Err(BatchError::DuplicateItem(name.to_string()));
            }
        }

        for outcome in outcomes {
            self.insert(outcome);
        }
        Ok(())
    }

    fn insert(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success {
                input_name,
                output_name,
                output_location,
            } => {
                self.successes.insert(
                    input_name,
                    SuccessEntry {
                        output_name,
                        output_location,
                    },
                );
            }
            Outcome::Failure {
                input_name,
                error_kind,
                error_detail,
            } => {
                self.failures.insert(
                    input_name,
                    FailureEntry {
                        error_kind,
                        error_detail,
                    },
                );
            }
        }
    }

    pub fn successes(&self) -> &BTreeMap<String, SuccessEntry> {
        &self.successes
    }

    pub fn failures(&self) -> &BTreeMap<String, FailureEntry> {
        &self.failures
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// 記録済みの総件数
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 成功したファイルの出力先一覧（パッケージ用）
    pub fn output_locations(&self) -> Vec<PathBuf> {
        self.successes
            .values()
            .map(|entry| entry.output_location.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(name: &str) -> Outcome {
        Outcome::Success {
            input_name: name.to_string(),
            output_name: name.replace(".mp3", ".txt"),
            output_location: PathBuf::from("outputs").join(name.replace(".mp3", ".txt")),
        }
    }

    #[test]
    fn test_merge_partitions_outcomes() {
        let mut ledger = ResultLedger::new();
        ledger
            .merge(vec![
                success("a.mp3"),
                Outcome::failure("b.mp3", ErrorKind::Provider, "boom"),
                success("c.mp3"),
            ])
            .unwrap();

        assert_eq!(ledger.success_count(), 2);
        assert_eq!(ledger.failure_count(), 1);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.failures()["b.mp3"].error_kind, ErrorKind::Provider);
        assert_eq!(ledger.failures()["b.mp3"].error_detail, "boom");
        assert_eq!(
            ledger.output_locations(),
            vec![PathBuf::from("outputs/a.txt"), PathBuf::from("outputs/c.txt")]
        );
    }

    #[test]
    fn test_duplicate_merge_leaves_ledger_unchanged() {
        let mut ledger = ResultLedger::new();
        ledger.merge(vec![success("a.mp3")]).unwrap();
        let before = ledger.clone();

        // 別の種別で同じファイル名が来ても重複扱い
        let result = ledger.merge(vec![
            success("z.mp3"),
            Outcome::failure("a.mp3", ErrorKind::Timeout, "late"),
        ]);

        assert!(matches!(result, Err(BatchError::DuplicateItem(ref name)) if name == "a.mp3"));
        assert_eq!(ledger, before);
        assert!(!ledger.contains("z.mp3"));
    }

    #[test]
    fn test_duplicate_within_one_merge() {
        let mut ledger = ResultLedger::new();
        let result = ledger.merge(vec![success("x.mp3"), success("x.mp3")]);

        assert!(matches!(result, Err(BatchError::DuplicateItem(_))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_rejects_duplicate() {
        let mut ledger = ResultLedger::new();
        ledger.record(success("a.mp3")).unwrap();
        assert!(ledger.record(success("a.mp3")).is_err());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_ledger_json_serialization() {
        let mut ledger = ResultLedger::new();
        ledger.record(success("a.mp3")).unwrap();
        ledger
            .record(Outcome::failure("b.mp3", ErrorKind::RateLimit, "slow down"))
            .unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["successes"]["a.mp3"]["output_name"], "a.txt");
        assert_eq!(parsed["failures"]["b.mp3"]["error_kind"], "rate_limit");
    }
}
