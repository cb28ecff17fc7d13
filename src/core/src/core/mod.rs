// Core Domain
// エンジン特性、変更ステートメント、チェンジセット、スナップショットの純粋なドメインモデル

pub mod capability;
pub mod changeset;
pub mod config;
pub mod data_type;
pub mod engine;
pub mod error;
pub mod operation;
pub mod snapshot;
pub mod snapshot_diff;
pub mod statement;
