// 抽象データ型
//
// `int` や `varchar(50)` のような方言非依存の型表記を、
// トークンとパラメータに分解します。

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_ ]*?)\s*(?:\(\s*([^()]*?)\s*\))?\s*$")
        .expect("type pattern is a valid regex")
});

/// 抽象データ型
///
/// ケイパビリティマトリクスの型テーブルを引くためのキーです。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractType {
    /// 正規化済みトークン（小文字、空白1つ区切り）
    pub token: String,
    /// 括弧内のパラメータ
    pub params: Vec<String>,
    /// 入力そのもの（前後空白除去済み）
    pub raw: String,
}

impl AbstractType {
    /// 型表記をパース
    ///
    /// パターンに一致しない表記（配列型など）は、トークンに入力全体を入れて返します。
    /// 空文字列の場合はNoneを返します。
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }

        let Some(captures) = TYPE_PATTERN.captures(raw) else {
            return Some(Self {
                token: raw.to_ascii_lowercase(),
                params: Vec::new(),
                raw: raw.to_string(),
            });
        };

        let token = captures[1]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        let params = captures
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            token,
            params,
            raw: raw.to_string(),
        })
    }

    /// パラメータをカンマ区切りで結合（括弧なし）
    pub fn params_joined(&self) -> Option<String> {
        if self.params.is_empty() {
            None
        } else {
            Some(self.params.join(", "))
        }
    }

    /// 整数系の型かどうか
    pub fn is_integer(&self) -> bool {
        matches!(
            self.token.as_str(),
            "int" | "integer" | "smallint" | "tinyint" | "bigint" | "int4" | "int8" | "serial"
        )
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_token() {
        let t = AbstractType::parse("int").unwrap();
        assert_eq!(t.token, "int");
        assert!(t.params.is_empty());
        assert!(t.is_integer());
    }

    #[test]
    fn test_parse_with_params() {
        let t = AbstractType::parse(" DECIMAL( 10 , 2 ) ").unwrap();
        assert_eq!(t.token, "decimal");
        assert_eq!(t.params, vec!["10", "2"]);
        assert_eq!(t.params_joined().as_deref(), Some("10, 2"));
        assert_eq!(t.raw, "DECIMAL( 10 , 2 )");
    }

    #[test]
    fn test_parse_multi_word_token() {
        let t = AbstractType::parse("double   precision").unwrap();
        assert_eq!(t.token, "double precision");
    }

    #[test]
    fn test_parse_unrecognized_shape() {
        let t = AbstractType::parse("int[]").unwrap();
        assert_eq!(t.token, "int[]");
        assert!(t.params.is_empty());
    }

    #[test]
    fn test_parse_empty() {
        assert!(AbstractType::parse("   ").is_none());
    }
}
