// 設定ファイル読み込みサービス
//
// core::config の純粋性を保つため、ファイルI/Oはこのサービスに集約する。

use anyhow::{Context, Result};
use std::path::Path;
use tidemark_core::core::config::ExecutionConfig;

/// 既定の設定ファイルパス
pub const DEFAULT_CONFIG_PATH: &str = "tidemark.yaml";

/// 設定ファイル読み込みサービス
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// YAMLファイルから設定を読み込む
    pub fn from_file(path: &Path) -> Result<ExecutionConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_str(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// YAML文字列から設定を読み込み、検証する
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<ExecutionConfig> {
        let config: ExecutionConfig =
            serde_saphyr::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate().with_context(|| "Config validation failed")?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    pub fn load_default() -> Result<ExecutionConfig> {
        Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tidemark_core::core::config::{ChecksumPolicy, UnsupportedPolicy};

    #[test]
    fn test_from_str_with_defaults() {
        let config = ConfigLoader::from_str("query_timeout_secs: 5\n").unwrap();
        assert_eq!(config.query_timeout_secs, 5);
        assert_eq!(config.changelog_table, "tidemark_changelog");
        assert_eq!(config.checksum_policy, ChecksumPolicy::Fail);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "lock:\n  max_attempts: 3\n  stale_after_secs: 600\nunsupported_policy: skip\nchecksum_policy: repair\nholder_id: ci-runner"
        )
        .unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.lock.max_attempts, 3);
        assert_eq!(config.lock.stale_after_secs, Some(600));
        assert_eq!(config.unsupported_policy, UnsupportedPolicy::Skip);
        assert_eq!(config.checksum_policy, ChecksumPolicy::Repair);
        assert_eq!(config.holder_id.as_deref(), Some("ci-runner"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ConfigLoader::from_str("query_timeout_secs: 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("query_timeout_secs"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::from_file(Path::new("/nonexistent/tidemark.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
