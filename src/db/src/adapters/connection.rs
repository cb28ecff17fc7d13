// データベース接続インターフェース
//
// 実行コーディネーターとスナップショット取得が使う、ドライバー非依存の狭い接続契約。
// 結果セットは小さな値モデル（RowSet / Row / Value）で表現します。

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tidemark_core::core::engine::EngineId;
use tidemark_core::core::error::DriverError;
use tracing::warn;

/// カラム値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 文字列として取得
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 文字列表現（数値や真偽値も文字列化）
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// 整数として取得（数字だけの文字列も受け付ける）
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 真偽値として取得
    ///
    /// 数値は0以外を真、文字列は`YES`/`Y`/`TRUE`/`T`/`1`を真とみなします。
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Text(s) => Some(matches!(
                s.trim().to_ascii_uppercase().as_str(),
                "YES" | "Y" | "TRUE" | "T" | "1"
            )),
            _ => None,
        }
    }
}

/// 結果行
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// 位置で値を取得
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// カラム名で値を取得（大文字小文字を区別しない）
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    pub fn get_text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Value::to_text)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// 結果セット
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// データベース接続
///
/// 1本の物理接続を表します。トランザクションは`begin`から`commit`/`rollback`までの
/// 文がすべてこの接続で実行されることを前提とします。
#[async_trait]
pub trait DatabaseConnection: Send {
    /// 接続先のエンジン
    fn engine(&self) -> &EngineId;

    /// 結果を返さない文を実行し、影響行数を返す
    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError>;

    /// 問い合わせを実行
    async fn query(&mut self, sql: &str) -> Result<RowSet, DriverError>;

    /// トランザクション開始
    async fn begin(&mut self) -> Result<(), DriverError>;

    /// コミット
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// ロールバック
    async fn rollback(&mut self) -> Result<(), DriverError>;
}

/// トランザクション内でクロージャを実行
///
/// `Ok`ならコミット、`Err`ならロールバックします。
/// ロールバック自体の失敗はログに残し、元のエラーを返します。
pub async fn with_transaction<C, T, E, F>(conn: &mut C, f: F) -> Result<T, E>
where
    C: DatabaseConnection + ?Sized,
    E: From<DriverError>,
    F: for<'c> FnOnce(&'c mut C) -> BoxFuture<'c, Result<T, E>>,
{
    conn.begin().await?;
    match f(conn).await {
        Ok(value) => {
            conn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = conn.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(e)
        }
    }
}
