// tidemark-core ライブラリのエントリーポイント
//
// モジュール構造:
// - core: エンジン識別子、ケイパビリティマトリクス、変更ステートメント、
//   チェンジセット、スナップショット、実行設定、エラー型

pub mod core;

pub use crate::core::capability::{CapabilityEntry, CapabilityMatrix};
pub use crate::core::changeset::{AppliedSummary, Changeset};
pub use crate::core::engine::{Dialect, EngineId};
pub use crate::core::error::Error;
pub use crate::core::operation::OperationKind;
pub use crate::core::statement::ChangeStatement;
