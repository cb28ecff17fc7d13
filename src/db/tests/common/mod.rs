// テスト共通ヘルパー
//
// テスト全体で共有されるユーティリティ関数を集約する。
// テストファイルから `mod common;` で利用可能。

use std::sync::Once;
use tempfile::TempDir;
use tidemark_core::core::config::ExecutionConfig;
use tidemark_db::SqlxConnection;

static TRACING: Once = Once::new();

/// テスト用のログ出力を初期化（RUST_LOGで制御）
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// 一時ディレクトリ上のSQLiteデータベース
///
/// 複数の接続から同じデータベースを開くためにファイルを使います。
pub struct SqliteDatabase {
    _dir: TempDir,
    url: String,
}

impl SqliteDatabase {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tidemark.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Self { _dir: dir, url }
    }

    #[allow(dead_code)]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> SqlxConnection {
        SqlxConnection::connect(&self.url).await.unwrap()
    }
}

/// 短い待ち時間でロックを諦めるテスト用設定
#[allow(dead_code)]
pub fn fast_config() -> ExecutionConfig {
    let mut config = ExecutionConfig {
        holder_id: Some("test-runner".to_string()),
        ..Default::default()
    };
    config.lock.max_attempts = 3;
    config.lock.initial_backoff_ms = 10;
    config.lock.max_backoff_ms = 20;
    config
}
