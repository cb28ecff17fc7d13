// tidemark-db ライブラリのエントリーポイント
//
// モジュール構造:
// - adapters: 接続インターフェース、SQLxアダプター、方言別SQLジェネレーター、イントロスペクター
// - services: ディスパッチ、スナップショット取得、変更履歴、実行ロック、実行コーディネーター、
//   設定ファイル読み込み、公開ファサード

pub mod adapters;
pub mod services;

pub use crate::adapters::connection::{with_transaction, DatabaseConnection, Row, RowSet, Value};
pub use crate::adapters::sqlx_connection::SqlxConnection;
pub use crate::services::change_engine::ChangeEngine;
pub use crate::services::dispatch::{RenderedSql, SqlDispatcher};
pub use crate::services::execution_coordinator::CancellationFlag;
