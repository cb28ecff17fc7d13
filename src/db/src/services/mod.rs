// Services Layer
// ドメインロジックを実行するサービス層

pub mod change_engine;
pub mod changelog_history;
pub mod changeset_checksum;
pub mod config_loader;
pub mod dispatch;
pub mod execution_coordinator;
pub mod lock_service;
pub mod snapshot_service;
