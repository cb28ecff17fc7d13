// ケイパビリティマトリクス
//
// エンジンごとの静的な特性（対応操作、識別子クォート、型マッピングなど）を保持します。
// 方言ごとの違いは型階層ではなくこのデータテーブルで表現します。

mod builtin;

use crate::core::data_type::AbstractType;
use crate::core::engine::{Dialect, EngineId};
use crate::core::error::CapabilityError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// 識別子クォートの開始・終了文字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierQuote {
    pub open: char,
    pub close: char,
}

impl IdentifierQuote {
    /// ダブルクォート（ANSI）
    pub const DOUBLE: IdentifierQuote = IdentifierQuote {
        open: '"',
        close: '"',
    };
    /// バッククォート（MySQL）
    pub const BACKTICK: IdentifierQuote = IdentifierQuote {
        open: '`',
        close: '`',
    };
    /// 角括弧（SQL Server / Sybase）
    pub const BRACKET: IdentifierQuote = IdentifierQuote {
        open: '[',
        close: ']',
    };

    /// 識別子をクォート
    ///
    /// 識別子内の終了文字は二重にエスケープします。
    pub fn quote(&self, name: &str) -> String {
        let escaped = name.replace(self.close, &format!("{}{}", self.close, self.close));
        format!("{}{}{}", self.open, escaped, self.close)
    }
}

/// 未クォート識別子の大文字小文字の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFolding {
    Upper,
    Lower,
    Preserve,
}

impl CaseFolding {
    /// 識別子を畳み込む
    pub fn apply(&self, name: &str) -> String {
        match self {
            CaseFolding::Upper => name.to_uppercase(),
            CaseFolding::Lower => name.to_lowercase(),
            CaseFolding::Preserve => name.to_string(),
        }
    }
}

/// オブジェクトのアドレッシング方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingStyle {
    /// schema.table
    TwoPart,
    /// catalog.schema.table
    ThreePart,
}

/// メタデータの取得方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStyle {
    Postgres,
    MySql,
    Sqlite,
    SqlServer,
    InformationSchema,
    Unavailable,
}

/// 自動採番の表現方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoIncrementStyle {
    /// カラム定義に付与する句（`AUTO_INCREMENT`、`IDENTITY` など）
    Clause(String),
    /// 専用の型に置き換える（PostgreSQLの`SERIAL`など）
    SerialType { int: String, bigint: String },
    /// 表現できない
    None,
}

impl AutoIncrementStyle {
    /// 自動採番を表現できるかどうか
    pub fn is_available(&self) -> bool {
        !matches!(self, AutoIncrementStyle::None)
    }

    /// 付与句を取得（句形式の場合のみ）
    pub fn clause(&self) -> Option<&str> {
        match self {
            AutoIncrementStyle::Clause(clause) => Some(clause),
            _ => None,
        }
    }
}

/// 操作内の個別構文
///
/// 操作自体には対応していても、一部のオプションを表現できないエンジンがあります。
/// エントリには表現できない構文だけを登録します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxFeature {
    /// 既存テーブルへの自動採番カラムの追加
    AddAutoIncrementColumn,
    /// 自動採番カラムと他のカラムからなる主キー
    AutoIncrementInCompositeKey,
    /// 自動採番の開始値
    IdentityStartValue,
    /// 1以外の自動採番の増分
    IdentityIncrement,
    /// 外部キーのON UPDATE
    ForeignKeyOnUpdate,
    /// 既存ビューの置き換え
    ReplaceView,
    /// シーケンスのMINVALUE・MAXVALUE・CYCLE
    SequenceBounds,
}

/// 型パラメータの扱い
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRule {
    /// 指定されたパラメータをそのまま使う
    Keep,
    /// パラメータを捨てる
    Drop,
    /// 指定がなければ既定値を使う
    DefaultTo(String),
    /// 常に固定値を使う
    Fixed(String),
}

/// ネイティブ型へのマッピング規則
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    pub native: String,
    pub params: ParamRule,
}

impl TypeRule {
    pub fn new(native: impl Into<String>, params: ParamRule) -> Self {
        Self {
            native: native.into(),
            params,
        }
    }

    /// 抽象型をネイティブ型表記に変換
    pub fn render(&self, abstract_type: &AbstractType) -> String {
        let params = match &self.params {
            ParamRule::Keep => abstract_type.params_joined(),
            ParamRule::Drop => None,
            ParamRule::DefaultTo(default) => abstract_type
                .params_joined()
                .or_else(|| Some(default.clone())),
            ParamRule::Fixed(fixed) => Some(fixed.clone()),
        };
        match params {
            Some(params) => format!("{}({})", self.native, params),
            None => self.native.clone(),
        }
    }
}

/// エンジンごとのケイパビリティ
///
/// 登録時に一度だけ作成され、以後は読み取り専用です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub engine: EngineId,
    pub display_name: String,
    pub operations: BTreeSet<OperationKind>,
    /// 表現できない構文
    pub missing_syntax: BTreeSet<SyntaxFeature>,
    pub quote: IdentifierQuote,
    pub case_folding: CaseFolding,
    pub max_identifier_length: usize,
    pub addressing: AddressingStyle,
    pub supports_schemas: bool,
    pub transactional_ddl: bool,
    pub backslash_escapes: bool,
    pub true_literal: String,
    pub false_literal: String,
    pub auto_increment: AutoIncrementStyle,
    pub begin_transaction: String,
    pub metadata: MetadataStyle,
    pub type_table: BTreeMap<String, TypeRule>,
}

impl CapabilityEntry {
    /// ANSI寄りの既定値でエントリを作成
    ///
    /// すべての操作に対応し、ダブルクォート・大文字畳み込み・トランザクショナルDDLなしを前提とします。
    pub fn new(engine: impl Into<EngineId>, display_name: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            display_name: display_name.into(),
            operations: OperationKind::ALL.into_iter().collect(),
            missing_syntax: BTreeSet::new(),
            quote: IdentifierQuote::DOUBLE,
            case_folding: CaseFolding::Upper,
            max_identifier_length: 128,
            addressing: AddressingStyle::TwoPart,
            supports_schemas: true,
            transactional_ddl: false,
            backslash_escapes: false,
            true_literal: "TRUE".to_string(),
            false_literal: "FALSE".to_string(),
            auto_increment: AutoIncrementStyle::None,
            begin_transaction: "BEGIN".to_string(),
            metadata: MetadataStyle::Unavailable,
            type_table: builtin::ansi_type_table(),
        }
    }

    pub fn without_operations(mut self, operations: &[OperationKind]) -> Self {
        for op in operations {
            self.operations.remove(op);
        }
        self
    }

    pub fn with_only_operations(mut self, operations: &[OperationKind]) -> Self {
        self.operations = operations.iter().copied().collect();
        self
    }

    pub fn without_syntax(mut self, features: &[SyntaxFeature]) -> Self {
        self.missing_syntax.extend(features.iter().copied());
        self
    }

    pub fn with_quote(mut self, quote: IdentifierQuote) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_case_folding(mut self, case_folding: CaseFolding) -> Self {
        self.case_folding = case_folding;
        self
    }

    pub fn with_max_identifier_length(mut self, max: usize) -> Self {
        self.max_identifier_length = max;
        self
    }

    pub fn with_addressing(mut self, addressing: AddressingStyle) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_schemas(mut self, supports_schemas: bool) -> Self {
        self.supports_schemas = supports_schemas;
        self
    }

    pub fn with_transactional_ddl(mut self, transactional_ddl: bool) -> Self {
        self.transactional_ddl = transactional_ddl;
        self
    }

    pub fn with_backslash_escapes(mut self, backslash_escapes: bool) -> Self {
        self.backslash_escapes = backslash_escapes;
        self
    }

    pub fn with_boolean_literals(mut self, true_literal: &str, false_literal: &str) -> Self {
        self.true_literal = true_literal.to_string();
        self.false_literal = false_literal.to_string();
        self
    }

    pub fn with_auto_increment(mut self, auto_increment: AutoIncrementStyle) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn with_begin_transaction(mut self, sql: &str) -> Self {
        self.begin_transaction = sql.to_string();
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataStyle) -> Self {
        self.metadata = metadata;
        self
    }

    /// 型マッピングを追加（既存のトークンは上書き）
    pub fn with_types(mut self, rules: &[(&str, &str, ParamRule)]) -> Self {
        for (token, native, params) in rules {
            self.type_table
                .insert(token.to_string(), TypeRule::new(*native, params.clone()));
        }
        self
    }

    /// 操作に対応しているか
    pub fn supports(&self, operation: OperationKind) -> bool {
        self.operations.contains(&operation)
    }

    /// 構文を表現できるか
    pub fn supports_syntax(&self, feature: SyntaxFeature) -> bool {
        !self.missing_syntax.contains(&feature)
    }

    /// 組み込み方言であれば取得
    pub fn dialect(&self) -> Option<Dialect> {
        self.engine.dialect()
    }

    /// 識別子をクォート
    pub fn quote_identifier(&self, name: &str) -> String {
        self.quote.quote(name)
    }

    /// 未クォート識別子の畳み込み
    pub fn fold_identifier(&self, name: &str) -> String {
        self.case_folding.apply(name)
    }

    /// アドレッシング方式に従ってオブジェクト名を修飾
    ///
    /// スキーマを持たないエンジンでは名前のみを返します。
    /// 2部構成ではスキーマ（なければカタログ）で修飾し、
    /// 3部構成でスキーマがない場合は`catalog..name`とします。
    pub fn qualify(&self, catalog: Option<&str>, schema: Option<&str>, name: &str) -> String {
        let name = self.quote_identifier(name);
        if !self.supports_schemas {
            return name;
        }

        match self.addressing {
            AddressingStyle::TwoPart => match schema.or(catalog) {
                Some(prefix) => format!("{}.{}", self.quote_identifier(prefix), name),
                None => name,
            },
            AddressingStyle::ThreePart => match (catalog, schema) {
                (Some(catalog), Some(schema)) => format!(
                    "{}.{}.{}",
                    self.quote_identifier(catalog),
                    self.quote_identifier(schema),
                    name
                ),
                (Some(catalog), None) => format!("{}..{}", self.quote_identifier(catalog), name),
                (None, Some(schema)) => format!("{}.{}", self.quote_identifier(schema), name),
                (None, None) => name,
            },
        }
    }

    /// 文字列リテラルをクォート
    pub fn quote_literal(&self, value: &str) -> String {
        let mut escaped = value.replace('\'', "''");
        if self.backslash_escapes {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }

    /// 真偽値リテラル
    pub fn boolean_literal(&self, value: bool) -> &str {
        if value {
            &self.true_literal
        } else {
            &self.false_literal
        }
    }

    /// 抽象型をネイティブ型に変換
    ///
    /// 型テーブルにないトークンは入力をそのまま返します。
    pub fn map_type(&self, abstract_type: &str) -> String {
        match AbstractType::parse(abstract_type) {
            Some(parsed) => match self.type_table.get(&parsed.token) {
                Some(rule) => rule.render(&parsed),
                None => parsed.raw,
            },
            None => String::new(),
        }
    }

    /// 自動採番カラムの型を取得（シリアル型方式の場合のみ）
    pub fn serial_type(&self, abstract_type: &str) -> Option<&str> {
        let AutoIncrementStyle::SerialType { int, bigint } = &self.auto_increment else {
            return None;
        };
        let parsed = AbstractType::parse(abstract_type)?;
        if matches!(parsed.token.as_str(), "bigint" | "int8") {
            Some(bigint)
        } else {
            Some(int)
        }
    }
}

/// ケイパビリティマトリクス
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatrix {
    entries: BTreeMap<EngineId, CapabilityEntry>,
}

static GLOBAL: LazyLock<CapabilityMatrix> = LazyLock::new(CapabilityMatrix::standard);

impl CapabilityMatrix {
    /// ビルダーを作成
    pub fn builder() -> CapabilityMatrixBuilder {
        CapabilityMatrixBuilder::default()
    }

    /// 組み込みエンジンをすべて登録したマトリクス
    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        for entry in builtin::entries() {
            entries.insert(entry.engine.clone(), entry);
        }
        Self { entries }
    }

    /// プロセス全体で共有される標準マトリクス
    pub fn global() -> &'static CapabilityMatrix {
        &GLOBAL
    }

    /// エントリを取得
    pub fn entry(&self, engine: &EngineId) -> Result<&CapabilityEntry, CapabilityError> {
        self.entries
            .get(engine)
            .ok_or_else(|| CapabilityError::UnknownEngine {
                engine: engine.clone(),
            })
    }

    /// 操作に対応しているか
    pub fn supports(
        &self,
        engine: &EngineId,
        operation: OperationKind,
    ) -> Result<bool, CapabilityError> {
        Ok(self.entry(engine)?.supports(operation))
    }

    /// 識別子をクォート
    pub fn quote_identifier(&self, engine: &EngineId, name: &str) -> Result<String, CapabilityError> {
        Ok(self.entry(engine)?.quote_identifier(name))
    }

    /// 抽象型をネイティブ型に変換
    pub fn map_type(
        &self,
        engine: &EngineId,
        abstract_type: &str,
    ) -> Result<String, CapabilityError> {
        Ok(self.entry(engine)?.map_type(abstract_type))
    }

    /// アドレッシング方式を取得
    pub fn addressing_style(&self, engine: &EngineId) -> Result<AddressingStyle, CapabilityError> {
        Ok(self.entry(engine)?.addressing)
    }

    /// 登録済みエンジン（名前順）
    pub fn engines(&self) -> impl Iterator<Item = &EngineId> {
        self.entries.keys()
    }

    /// 登録済みかどうか
    pub fn contains(&self, engine: &EngineId) -> bool {
        self.entries.contains_key(engine)
    }
}

/// ケイパビリティマトリクスのビルダー
#[derive(Debug, Default)]
pub struct CapabilityMatrixBuilder {
    entries: BTreeMap<EngineId, CapabilityEntry>,
}

impl CapabilityMatrixBuilder {
    /// 組み込みエンジンを登録済みの状態から始める
    pub fn with_builtin() -> Self {
        Self {
            entries: CapabilityMatrix::standard().entries,
        }
    }

    /// エンジンを登録
    ///
    /// # Returns
    ///
    /// 同じエンジンが登録済みの場合は`DuplicateEngine`
    pub fn register(mut self, entry: CapabilityEntry) -> Result<Self, CapabilityError> {
        if self.entries.contains_key(&entry.engine) {
            return Err(CapabilityError::DuplicateEngine {
                engine: entry.engine,
            });
        }
        self.entries.insert(entry.engine.clone(), entry);
        Ok(self)
    }

    pub fn build(self) -> CapabilityMatrix {
        CapabilityMatrix {
            entries: self.entries,
        }
    }
}
