// SQL生成アダプター
//
// 変更ステートメントを各エンジン用のSQL文に変換するジェネレーター群と、
// (操作種別, エンジン述語) をキーに最も具体的なジェネレーターを選ぶレジストリ。

pub mod db2;
pub mod firebird;
pub mod hsqldb;
pub mod informix;
pub mod maxdb;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlite;
pub mod standard;
pub mod sybase;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;
use tidemark_core::core::capability::{AutoIncrementStyle, CapabilityEntry};
use tidemark_core::core::engine::{Dialect, EngineId};
use tidemark_core::core::error::DispatchError;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    ChangeStatement, ColumnDefinition, DefaultValue, StatementVariant, TableRef,
};

/// ジェネレーターの出力
pub type GenerateResult = Result<Vec<String>, DispatchError>;

/// エンジン述語
///
/// 具体性は Engine > Family > Any の順です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePredicate {
    /// すべてのエンジン（既定実装）
    Any,
    /// エンジンの集合
    Family(BTreeSet<EngineId>),
    /// 単一のエンジン
    Engine(EngineId),
}

impl EnginePredicate {
    /// 単一エンジンの述語
    pub fn engine(dialect: Dialect) -> Self {
        EnginePredicate::Engine(dialect.id())
    }

    /// エンジン集合の述語
    pub fn family(dialects: &[Dialect]) -> Self {
        EnginePredicate::Family(dialects.iter().map(Dialect::id).collect())
    }

    /// エンジンが述語に一致するか
    pub fn matches(&self, engine: &EngineId) -> bool {
        match self {
            EnginePredicate::Any => true,
            EnginePredicate::Family(engines) => engines.contains(engine),
            EnginePredicate::Engine(id) => id == engine,
        }
    }

    /// 具体性（大きいほど優先）
    pub fn specificity(&self) -> u8 {
        match self {
            EnginePredicate::Any => 0,
            EnginePredicate::Family(_) => 1,
            EnginePredicate::Engine(_) => 2,
        }
    }

    /// 同じエンジンに一致し得るか
    pub fn overlaps(&self, other: &EnginePredicate) -> bool {
        match (self, other) {
            (EnginePredicate::Any, _) | (_, EnginePredicate::Any) => true,
            (EnginePredicate::Engine(a), EnginePredicate::Engine(b)) => a == b,
            (EnginePredicate::Engine(a), EnginePredicate::Family(set))
            | (EnginePredicate::Family(set), EnginePredicate::Engine(a)) => set.contains(a),
            (EnginePredicate::Family(a), EnginePredicate::Family(b)) => !a.is_disjoint(b),
        }
    }
}

impl fmt::Display for EnginePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePredicate::Any => f.write_str("any"),
            EnginePredicate::Family(engines) => {
                let names: Vec<&str> = engines.iter().map(EngineId::as_str).collect();
                write!(f, "family({})", names.join(", "))
            }
            EnginePredicate::Engine(engine) => write!(f, "engine({})", engine),
        }
    }
}

/// SQLジェネレータートレイト
///
/// 1つの操作種別について、述語に一致するエンジン向けのSQLを生成します。
pub trait SqlGenerator: Send + Sync {
    /// 対象の操作種別
    fn operation(&self) -> OperationKind;

    /// 対象エンジンの述語
    fn predicate(&self) -> &EnginePredicate;

    /// SQL文を生成
    ///
    /// # Arguments
    ///
    /// * `statement` - 変更ステートメント（検証済み）
    /// * `ctx` - 対象エンジンの生成コンテキスト
    ///
    /// # Returns
    ///
    /// 実行順に並んだSQL文
    fn generate(&self, statement: &ChangeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult;
}

/// 具体的なステートメント型に対する関数ベースのジェネレーター
pub struct StatementGenerator<S: StatementVariant> {
    predicate: EnginePredicate,
    render: fn(&S, &GeneratorContext<'_>) -> GenerateResult,
}

impl<S: StatementVariant> StatementGenerator<S> {
    pub fn new(predicate: EnginePredicate, render: fn(&S, &GeneratorContext<'_>) -> GenerateResult) -> Self {
        Self { predicate, render }
    }
}

impl<S: StatementVariant> SqlGenerator for StatementGenerator<S> {
    fn operation(&self) -> OperationKind {
        S::OPERATION
    }

    fn predicate(&self) -> &EnginePredicate {
        &self.predicate
    }

    fn generate(&self, statement: &ChangeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
        let typed = S::extract(statement).ok_or(DispatchError::MalformedStatement {
            expected: S::OPERATION,
            actual: statement.operation(),
        })?;
        (self.render)(typed, ctx)
    }
}

/// ボックス化したジェネレーターを作成
pub fn generator<S: StatementVariant + 'static>(
    predicate: EnginePredicate,
    render: fn(&S, &GeneratorContext<'_>) -> GenerateResult,
) -> Box<dyn SqlGenerator> {
    Box::new(StatementGenerator::new(predicate, render))
}

/// 生成コンテキスト
///
/// 対象エンジンのクォート規則と型マッピングをジェネレーターに提供します。
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    entry: &'a CapabilityEntry,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(entry: &'a CapabilityEntry) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &'a CapabilityEntry {
        self.entry
    }

    pub fn engine(&self) -> &'a EngineId {
        &self.entry.engine
    }

    /// 識別子をクォート
    pub fn quote(&self, name: &str) -> String {
        self.entry.quote_identifier(name)
    }

    /// カラム名リストをクォートしてカンマ区切りで結合
    pub fn quote_columns(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// テーブル（ビュー・シーケンス）の修飾名
    pub fn table(&self, table: &TableRef) -> String {
        self.entry
            .qualify(table.catalog.as_deref(), table.schema.as_deref(), &table.name)
    }

    /// テーブルと同じスキーマに属するオブジェクト（インデックスなど）の修飾名
    pub fn sibling(&self, table: &TableRef, name: &str) -> String {
        self.table(&table.renamed(name))
    }

    /// 抽象型をネイティブ型に変換
    pub fn map_type(&self, abstract_type: &str) -> String {
        self.entry.map_type(abstract_type)
    }

    /// 文字列リテラル
    pub fn literal(&self, value: &str) -> String {
        self.entry.quote_literal(value)
    }

    /// 既定値のSQL表現
    pub fn default_value(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::String(s) => self.literal(s),
            DefaultValue::Numeric(n) => n.clone(),
            DefaultValue::Boolean(b) => self.entry.boolean_literal(*b).to_string(),
            DefaultValue::Computed(expr) => expr.clone(),
            DefaultValue::Null => "NULL".to_string(),
        }
    }

    /// 自動採番カラムの型と付与句
    ///
    /// シリアル型方式では型そのものを置き換え、句形式では型の後ろに句を付けます。
    pub fn auto_increment_type(&self, data_type: &str) -> String {
        match &self.entry.auto_increment {
            AutoIncrementStyle::SerialType { .. } => self
                .entry
                .serial_type(data_type)
                .map(str::to_string)
                .unwrap_or_else(|| self.map_type(data_type)),
            AutoIncrementStyle::Clause(clause) => format!("{} {}", self.map_type(data_type), clause),
            AutoIncrementStyle::None => self.map_type(data_type),
        }
    }

    /// カラム定義のSQL文字列を生成
    ///
    /// `name type [auto increment] [DEFAULT v] [NOT NULL] [PRIMARY KEY] [UNIQUE]`
    pub fn column_definition(&self, column: &ColumnDefinition, inline_primary_key: bool) -> String {
        let mut parts = vec![self.quote(&column.name)];

        if column.auto_increment {
            parts.push(self.auto_increment_type(&column.data_type));
        } else {
            parts.push(self.map_type(&column.data_type));
        }

        if let Some(default_value) = &column.default_value {
            parts.push(format!("DEFAULT {}", self.default_value(default_value)));
        }

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if inline_primary_key && column.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }

        if column.unique && !column.primary_key {
            parts.push("UNIQUE".to_string());
        }

        parts.join(" ")
    }
}

/// ジェネレーターレジストリ
///
/// 操作種別ごとにジェネレーターを保持し、エンジンに一致する中で最も具体的なものを選びます。
/// 構築後は読み取り専用です。
pub struct GeneratorRegistry {
    generators: BTreeMap<OperationKind, Vec<Box<dyn SqlGenerator>>>,
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (operation, generators) in &self.generators {
            let predicates: Vec<String> = generators.iter().map(|g| g.predicate().to_string()).collect();
            map.entry(operation, &predicates);
        }
        map.finish()
    }
}

static GLOBAL: LazyLock<Result<GeneratorRegistry, DispatchError>> =
    LazyLock::new(|| GeneratorRegistryBuilder::with_builtin().build());

impl GeneratorRegistry {
    /// ビルダーを作成
    pub fn builder() -> GeneratorRegistryBuilder {
        GeneratorRegistryBuilder::default()
    }

    /// 組み込みジェネレーターをすべて登録したレジストリ
    pub fn standard() -> Result<Self, DispatchError> {
        GeneratorRegistryBuilder::with_builtin().build()
    }

    /// プロセス全体で共有される標準レジストリ
    pub fn global() -> Result<&'static GeneratorRegistry, DispatchError> {
        GLOBAL.as_ref().map_err(Clone::clone)
    }

    /// 最も具体的なジェネレーターを選択
    pub fn select(&self, operation: OperationKind, engine: &EngineId) -> Option<&dyn SqlGenerator> {
        self.generators
            .get(&operation)?
            .iter()
            .filter(|g| g.predicate().matches(engine))
            .max_by_key(|g| g.predicate().specificity())
            .map(|g| g.as_ref())
    }

    /// 登録済みジェネレーター数
    pub fn len(&self) -> usize {
        self.generators.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ジェネレーターレジストリのビルダー
#[derive(Default)]
pub struct GeneratorRegistryBuilder {
    generators: Vec<Box<dyn SqlGenerator>>,
}

impl GeneratorRegistryBuilder {
    /// 組み込みジェネレーターを登録済みの状態から始める
    pub fn with_builtin() -> Self {
        let mut builder = Self::default();
        for generators in [
            standard::generators(),
            postgres::generators(),
            mysql::generators(),
            sqlite::generators(),
            oracle::generators(),
            mssql::generators(),
            db2::generators(),
            hsqldb::generators(),
            firebird::generators(),
            sybase::generators(),
            maxdb::generators(),
            informix::generators(),
        ] {
            builder.generators.extend(generators);
        }
        builder
    }

    /// ジェネレーターを追加
    pub fn register(mut self, generator: Box<dyn SqlGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// 同じ操作・同じ述語のジェネレーターを置き換える
    pub fn replace(mut self, generator: Box<dyn SqlGenerator>) -> Self {
        self.generators.retain(|g| {
            g.operation() != generator.operation() || g.predicate() != generator.predicate()
        });
        self.generators.push(generator);
        self
    }

    /// レジストリを構築
    ///
    /// # Returns
    ///
    /// 同じ操作で同じ具体性の述語が重なる場合は`AmbiguousGenerator`
    pub fn build(self) -> Result<GeneratorRegistry, DispatchError> {
        let mut generators: BTreeMap<OperationKind, Vec<Box<dyn SqlGenerator>>> = BTreeMap::new();

        for generator in self.generators {
            let slot = generators.entry(generator.operation()).or_default();
            if let Some(existing) = slot.iter().find(|g| {
                g.predicate().specificity() == generator.predicate().specificity()
                    && g.predicate().overlaps(generator.predicate())
            }) {
                return Err(DispatchError::AmbiguousGenerator {
                    operation: generator.operation(),
                    first: existing.predicate().to_string(),
                    second: generator.predicate().to_string(),
                });
            }
            slot.push(generator);
        }

        Ok(GeneratorRegistry { generators })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::{DropTableStatement, RawSqlStatement};

    fn ctx(dialect: Dialect) -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&dialect.id()).unwrap())
    }

    fn fixed_sql(_: &DropTableStatement, _: &GeneratorContext<'_>) -> GenerateResult {
        Ok(vec!["-- custom".to_string()])
    }

    #[test]
    fn test_predicate_specificity_and_overlap() {
        let any = EnginePredicate::Any;
        let family = EnginePredicate::family(&[Dialect::MySQL, Dialect::MSSQL]);
        let mysql = EnginePredicate::engine(Dialect::MySQL);
        let oracle = EnginePredicate::engine(Dialect::Oracle);

        assert!(any.specificity() < family.specificity());
        assert!(family.specificity() < mysql.specificity());
        assert!(family.overlaps(&mysql));
        assert!(!family.overlaps(&oracle));
        assert!(!mysql.overlaps(&oracle));
        assert!(family.matches(&Dialect::MSSQL.id()));
        assert!(!family.matches(&Dialect::Oracle.id()));
        assert_eq!(family.to_string(), "family(mssql, mysql)");
    }

    #[test]
    fn test_builtin_registry_has_no_ties() {
        let registry = GeneratorRegistry::standard().unwrap();
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_every_operation_has_default_generator() {
        let registry = GeneratorRegistry::global().unwrap();
        let unknown = EngineId::new("some-future-engine");
        for operation in OperationKind::ALL {
            assert!(
                registry.select(operation, &unknown).is_some(),
                "no default generator for {}",
                operation
            );
        }
    }

    #[test]
    fn test_most_specific_generator_wins() {
        let registry = GeneratorRegistry::global().unwrap();
        let mysql = registry
            .select(OperationKind::DropIndex, &Dialect::MySQL.id())
            .unwrap();
        assert_ne!(mysql.predicate(), &EnginePredicate::Any);

        let h2 = registry
            .select(OperationKind::DropIndex, &Dialect::H2.id())
            .unwrap();
        assert_eq!(h2.predicate(), &EnginePredicate::Any);
    }

    #[test]
    fn test_ambiguous_registration_rejected() {
        let result = GeneratorRegistryBuilder::with_builtin()
            .register(generator(EnginePredicate::Any, fixed_sql))
            .build();
        assert!(result.unwrap_err().is_ambiguous_generator());

        let result = GeneratorRegistry::builder()
            .register(generator(EnginePredicate::family(&[Dialect::MySQL, Dialect::H2]), fixed_sql))
            .register(generator(EnginePredicate::family(&[Dialect::H2, Dialect::Derby]), fixed_sql))
            .build();
        assert!(result.unwrap_err().is_ambiguous_generator());
    }

    #[test]
    fn test_replace_overrides_builtin() {
        let registry = GeneratorRegistryBuilder::with_builtin()
            .replace(generator(EnginePredicate::Any, fixed_sql))
            .build()
            .unwrap();
        let generator = registry
            .select(OperationKind::DropTable, &Dialect::H2.id())
            .unwrap();
        let statement: ChangeStatement = DropTableStatement::new("t").into();
        assert_eq!(
            generator.generate(&statement, &ctx(Dialect::H2)).unwrap(),
            vec!["-- custom"]
        );
    }

    #[test]
    fn test_malformed_statement() {
        let generator = generator(EnginePredicate::Any, fixed_sql);
        let statement: ChangeStatement = RawSqlStatement::new("SELECT 1").into();
        let err = generator.generate(&statement, &ctx(Dialect::H2)).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MalformedStatement {
                expected: OperationKind::DropTable,
                actual: OperationKind::RawSql,
            }
        );
    }

    #[test]
    fn test_column_definition() {
        let ctx = ctx(Dialect::PostgreSQL);
        let column = ColumnDefinition::new("id", "int").primary_key().auto_increment();
        assert_eq!(ctx.column_definition(&column, false), "\"id\" SERIAL NOT NULL");

        let column = ColumnDefinition::new("active", "boolean")
            .not_null()
            .with_default(DefaultValue::Boolean(true));
        assert_eq!(
            ctx.column_definition(&column, false),
            "\"active\" BOOLEAN DEFAULT TRUE NOT NULL"
        );
    }

    #[test]
    fn test_sibling_uses_table_schema() {
        let ctx = ctx(Dialect::PostgreSQL);
        let table = TableRef::new("users").with_schema("app");
        assert_eq!(ctx.sibling(&table, "idx_users_email"), "\"app\".\"idx_users_email\"");
    }
}
