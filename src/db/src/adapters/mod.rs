// Adapters
// データベース接続、方言別SQL生成、スキーマ取得を抽象化

pub mod connection;
pub mod database_introspector;
pub mod sql_generator;
pub mod sqlx_connection;
