// エンジン識別子
//
// 対応するデータベース製品を一意に表す識別子と、組み込みエンジンの列挙を提供します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// エンジン識別子
///
/// データベース製品名を正規化（前後空白除去・小文字化）した値です。
/// ケイパビリティマトリクスへの登録単位になります。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EngineId(String);

impl EngineId {
    /// 新しいEngineIdを作成
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    /// 文字列表現を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 組み込みエンジンであれば対応するDialectを返す
    pub fn dialect(&self) -> Option<Dialect> {
        self.0.parse().ok()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EngineId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for EngineId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<EngineId> for String {
    fn from(value: EngineId) -> Self {
        value.0
    }
}

impl From<Dialect> for EngineId {
    fn from(value: Dialect) -> Self {
        value.id()
    }
}

/// 組み込みデータベース方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "sqlite")]
    SQLite,
    Oracle,
    #[serde(rename = "mssql")]
    MSSQL,
    #[serde(rename = "db2")]
    DB2,
    Derby,
    H2,
    #[serde(rename = "hsqldb")]
    HSQLDB,
    Firebird,
    Sybase,
    #[serde(rename = "maxdb")]
    MaxDB,
    Informix,
    Cache,
}

impl Dialect {
    /// すべての組み込み方言
    pub const ALL: [Dialect; 14] = [
        Dialect::PostgreSQL,
        Dialect::MySQL,
        Dialect::SQLite,
        Dialect::Oracle,
        Dialect::MSSQL,
        Dialect::DB2,
        Dialect::Derby,
        Dialect::H2,
        Dialect::HSQLDB,
        Dialect::Firebird,
        Dialect::Sybase,
        Dialect::MaxDB,
        Dialect::Informix,
        Dialect::Cache,
    ];

    /// 正規化されたエンジン名
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
            Dialect::SQLite => "sqlite",
            Dialect::Oracle => "oracle",
            Dialect::MSSQL => "mssql",
            Dialect::DB2 => "db2",
            Dialect::Derby => "derby",
            Dialect::H2 => "h2",
            Dialect::HSQLDB => "hsqldb",
            Dialect::Firebird => "firebird",
            Dialect::Sybase => "sybase",
            Dialect::MaxDB => "maxdb",
            Dialect::Informix => "informix",
            Dialect::Cache => "cache",
        }
    }

    /// エンジン識別子を取得
    pub fn id(&self) -> EngineId {
        EngineId::new(self.name())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let dialect = match normalized.as_str() {
            "postgresql" | "postgres" => Dialect::PostgreSQL,
            "mysql" | "mariadb" => Dialect::MySQL,
            "sqlite" => Dialect::SQLite,
            "oracle" => Dialect::Oracle,
            "mssql" | "sqlserver" => Dialect::MSSQL,
            "db2" => Dialect::DB2,
            "derby" => Dialect::Derby,
            "h2" => Dialect::H2,
            "hsqldb" | "hsql" => Dialect::HSQLDB,
            "firebird" => Dialect::Firebird,
            "sybase" => Dialect::Sybase,
            "maxdb" => Dialect::MaxDB,
            "informix" => Dialect::Informix,
            "cache" => Dialect::Cache,
            _ => return Err(format!("unknown dialect '{}'", s)),
        };
        Ok(dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_id_is_normalized() {
        assert_eq!(EngineId::new("  PostgreSQL "), EngineId::new("postgresql"));
        assert_eq!(EngineId::new("MySQL").as_str(), "mysql");
    }

    #[test]
    fn test_dialect_round_trip_through_engine_id() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.id().dialect(), Some(dialect));
        }
    }

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("postgres".parse::<Dialect>(), Ok(Dialect::PostgreSQL));
        assert_eq!("SqlServer".parse::<Dialect>(), Ok(Dialect::MSSQL));
        assert!("access".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_engine_id_serde_normalizes() {
        let id: EngineId = serde_json::from_str("\"ORACLE\"").unwrap();
        assert_eq!(id, Dialect::Oracle.id());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"oracle\"");
    }
}
