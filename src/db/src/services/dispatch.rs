// SQLディスパッチサービス
//
// 抽象的な変更ステートメントをエンジン固有のSQLに変換します。
// ケイパビリティ確認 → 検証 → ジェネレーター選択 → 描画 の順に処理し、
// データベース接続は一切使いません。

use crate::adapters::sql_generator::{GeneratorContext, GeneratorRegistry};
use serde::Serialize;
use tidemark_core::core::capability::{CapabilityEntry, CapabilityMatrix};
use tidemark_core::core::engine::EngineId;
use tidemark_core::core::error::DispatchError;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::ChangeStatement;
use tracing::{debug, error};

/// 描画済みSQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSql {
    pub engine: EngineId,
    pub operation: OperationKind,
    /// 実行順に並んだSQL文
    pub statements: Vec<String>,
    /// 機械的に導出できる逆操作
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse: Option<ChangeStatement>,
    /// 逆操作のSQL（逆操作がエンジンで表現できる場合のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Vec<String>>,
}

/// SQLディスパッチャー
///
/// ケイパビリティマトリクスとジェネレーターレジストリを組み合わせて
/// ステートメントを描画します。どちらも読み取り専用で共有されます。
#[derive(Debug, Clone, Copy)]
pub struct SqlDispatcher<'a> {
    matrix: &'a CapabilityMatrix,
    registry: &'a GeneratorRegistry,
}

impl SqlDispatcher<'static> {
    /// 標準のマトリクスとレジストリを使うディスパッチャーを作成
    pub fn new() -> Result<Self, DispatchError> {
        Ok(Self {
            matrix: CapabilityMatrix::global(),
            registry: GeneratorRegistry::global()?,
        })
    }
}

impl<'a> SqlDispatcher<'a> {
    /// 任意のマトリクスとレジストリからディスパッチャーを作成
    pub fn with_parts(matrix: &'a CapabilityMatrix, registry: &'a GeneratorRegistry) -> Self {
        Self { matrix, registry }
    }

    pub fn matrix(&self) -> &'a CapabilityMatrix {
        self.matrix
    }

    /// エンジンがステートメントを表現できるか
    ///
    /// 未登録エンジンは`false`ではなくエラーとして扱います。
    pub fn supports(&self, statement: &ChangeStatement, engine: &EngineId) -> Result<bool, DispatchError> {
        let entry = self.matrix.entry(engine)?;
        Ok(statement.supports_engine(entry))
    }

    /// ステートメントをSQLに変換
    ///
    /// # Arguments
    ///
    /// * `statement` - 変更ステートメント
    /// * `engine` - 対象エンジン
    ///
    /// # Returns
    ///
    /// 描画済みSQL。逆操作があり、かつエンジンが逆操作に対応していれば`rollback`も含みます
    pub fn generate(&self, statement: &ChangeStatement, engine: &EngineId) -> Result<RenderedSql, DispatchError> {
        let entry = self.matrix.entry(engine)?;
        let statements = self.render(statement, entry)?;

        let inverse = statement.inverse();
        let rollback = match &inverse {
            Some(inverse) if inverse.supports_engine(entry) => match self.render(inverse, entry) {
                Ok(sql) => Some(sql),
                Err(e) => {
                    debug!(
                        engine = %engine,
                        operation = %inverse.operation(),
                        error = %e,
                        "Inverse statement could not be rendered"
                    );
                    None
                }
            },
            _ => None,
        };

        Ok(RenderedSql {
            engine: entry.engine.clone(),
            operation: statement.operation(),
            statements,
            inverse,
            rollback,
        })
    }

    fn render(&self, statement: &ChangeStatement, entry: &CapabilityEntry) -> Result<Vec<String>, DispatchError> {
        let operation = statement.operation();
        if !statement.supports_engine(entry) {
            return Err(DispatchError::StatementNotSupportedOnDatabase {
                operation,
                engine: entry.engine.clone(),
            });
        }

        statement.validate()?;
        statement.check_identifier_lengths(entry)?;

        let generator = self
            .registry
            .select(operation, &entry.engine)
            .ok_or_else(|| {
                error!(operation = %operation, engine = %entry.engine, "No SQL generator registered");
                DispatchError::NoGenerator {
                    operation,
                    engine: entry.engine.clone(),
                }
            })?;

        debug!(
            operation = %operation,
            engine = %entry.engine,
            generator = %generator.predicate(),
            "Rendering statement"
        );
        generator.generate(statement, &GeneratorContext::new(entry))
    }
}
