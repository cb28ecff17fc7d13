// 実行設定
//
// 実行コーディネーターの動作（ロック待ち、タイムアウト、追跡テーブル名、
// 非対応ステートメントやチェックサム不一致の扱い）を定義します。

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 既定の追跡テーブル名
pub const DEFAULT_CHANGELOG_TABLE: &str = "tidemark_changelog";

/// 既定のロックテーブル名
pub const DEFAULT_LOCK_TABLE: &str = "tidemark_changelog_lock";

/// 非対応ステートメントの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedPolicy {
    /// 実行全体を失敗させる
    #[default]
    Fail,
    /// そのチェンジセットをスキップする
    Skip,
}

/// チェックサム不一致の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// 実行を失敗させる
    #[default]
    Fail,
    /// 記録済みチェックサムを現在の値で更新する（明示的なオプトイン）
    Repair,
}

/// ロック取得設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// 最大試行回数
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 初回の待機時間（ミリ秒）
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// 待機時間の上限（ミリ秒）
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// 全体の待機上限（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,

    /// この秒数より古いロックは放棄されたものとみなす
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            wait_timeout_secs: None,
            stale_after_secs: None,
        }
    }
}

impl LockConfig {
    /// n回目（0始まり）の失敗後に待つ時間
    ///
    /// 初回値から2倍ずつ増やし、上限で頭打ちにします。
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// 全体の待機上限
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// 放棄されたロックとみなす経過時間
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lock.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "lock.initial_backoff_ms",
                reason: format!(
                    "{} exceeds lock.max_backoff_ms ({})",
                    self.initial_backoff_ms, self.max_backoff_ms
                ),
            });
        }
        if self.stale_after_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "lock.stale_after_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// 実行設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// ロック取得設定
    #[serde(default)]
    pub lock: LockConfig,

    /// メタデータ・追跡テーブルへのクエリタイムアウト（秒）
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// 追跡テーブル名
    #[serde(default = "default_changelog_table")]
    pub changelog_table: String,

    /// ロックテーブル名
    #[serde(default = "default_lock_table")]
    pub lock_table: String,

    /// 非対応ステートメントの扱い
    #[serde(default)]
    pub unsupported_policy: UnsupportedPolicy,

    /// チェックサム不一致の扱い
    #[serde(default)]
    pub checksum_policy: ChecksumPolicy,

    /// ロック保持者として記録する名前（省略時はホスト名とプロセスIDから生成）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_changelog_table() -> String {
    DEFAULT_CHANGELOG_TABLE.to_string()
}

fn default_lock_table() -> String {
    DEFAULT_LOCK_TABLE.to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            query_timeout_secs: default_query_timeout_secs(),
            changelog_table: default_changelog_table(),
            lock_table: default_lock_table(),
            unsupported_policy: UnsupportedPolicy::default(),
            checksum_policy: ChecksumPolicy::default(),
            holder_id: None,
        }
    }
}

impl ExecutionConfig {
    /// クエリタイムアウト
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lock.validate()?;

        if self.query_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }

        for (field, name) in [
            ("changelog_table", &self.changelog_table),
            ("lock_table", &self.lock_table),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.changelog_table.eq_ignore_ascii_case(&self.lock_table) {
            return Err(ConfigError::TableNameConflict {
                name: self.changelog_table.clone(),
            });
        }

        if matches!(&self.holder_id, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "holder_id",
                reason: "must not be blank".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.changelog_table, "tidemark_changelog");
        assert_eq!(config.lock_table, "tidemark_changelog_lock");
        assert_eq!(config.unsupported_policy, UnsupportedPolicy::Fail);
        assert_eq!(config.checksum_policy, ChecksumPolicy::Fail);
        assert_eq!(config.lock.stale_after(), None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let lock = LockConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            ..LockConfig::default()
        };
        assert_eq!(lock.backoff(0), Duration::from_millis(100));
        assert_eq!(lock.backoff(1), Duration::from_millis(200));
        assert_eq!(lock.backoff(3), Duration::from_millis(800));
        assert_eq!(lock.backoff(4), Duration::from_millis(1_000));
        assert_eq!(lock.backoff(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_table_name_conflict() {
        let config = ExecutionConfig {
            lock_table: "TIDEMARK_CHANGELOG".to_string(),
            ..ExecutionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TableNameConflict {
                name: "tidemark_changelog".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_lock_settings() {
        let config = ExecutionConfig {
            lock: LockConfig {
                max_attempts: 0,
                ..LockConfig::default()
            },
            ..ExecutionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "lock.max_attempts",
                ..
            })
        ));

        let config = ExecutionConfig {
            lock: LockConfig {
                initial_backoff_ms: 5_000,
                max_backoff_ms: 100,
                ..LockConfig::default()
            },
            ..ExecutionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = r#"
query_timeout_secs: 5
checksum_policy: repair
lock:
  max_attempts: 3
"#;
        let config: ExecutionConfig = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.query_timeout_secs, 5);
        assert_eq!(config.checksum_policy, ChecksumPolicy::Repair);
        assert_eq!(config.lock.max_attempts, 3);
        assert_eq!(config.lock.initial_backoff_ms, 100);
        assert_eq!(config.changelog_table, DEFAULT_CHANGELOG_TABLE);
    }
}
