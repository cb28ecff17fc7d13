// チェンジセットチェックサム計算サービス
//
// チェンジセットの内容（ステートメント列）のSHA-256ハッシュ計算と比較を行うサービス。
// 正規化されたJSON表現からチェックサムを計算します。

use sha2::{Digest, Sha256};
use tidemark_core::core::changeset::Changeset;

/// チェンジセットチェックサムサービス
///
/// IDや作成者はチェックサムに含めません。同じIDで内容が変わったことを検出するためです。
#[derive(Debug, Clone)]
pub struct ChangesetChecksumService {}

impl ChangesetChecksumService {
    /// 新しいChangesetChecksumServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// チェンジセットのチェックサムを計算
    ///
    /// # Returns
    ///
    /// SHA-256ハッシュ（64文字の16進数文字列）
    pub fn calculate_checksum(&self, changeset: &Changeset) -> String {
        let normalized = self.normalize_changeset(changeset);

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let result = hasher.finalize();

        format!("{:x}", result)
    }

    /// チェンジセットを正規化された文字列表現に変換
    ///
    /// serde_json::Valueを経由することでオブジェクトのキーが名前順に並び、
    /// 省略可能なフィールドは空のとき出力されません。
    pub fn normalize_changeset(&self, changeset: &Changeset) -> String {
        let value = serde_json::to_value(&changeset.statements).unwrap_or_default();
        serde_json::to_string(&value).unwrap_or_default()
    }

    /// 2つのチェックサムを比較（大文字小文字を区別しない）
    pub fn compare_checksums(&self, checksum1: &str, checksum2: &str) -> bool {
        checksum1.eq_ignore_ascii_case(checksum2)
    }
}

impl Default for ChangesetChecksumService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::statement::{
        AddColumnStatement, ChangeStatement, ColumnDefinition, CreateTableStatement,
        RawSqlStatement,
    };

    fn changeset() -> Changeset {
        Changeset::new("create-users")
            .with_author("alice")
            .with_statement(
                CreateTableStatement::new("users")
                    .add_primary_key_column("id", "int")
                    .add_column(ColumnDefinition::new("name", "varchar(100)").not_null()),
            )
    }

    #[test]
    fn test_checksum_is_64_hex_chars() {
        let checksum = ChangesetChecksumService::new().calculate_checksum(&changeset());
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_is_stable() {
        let service = ChangesetChecksumService::new();
        assert_eq!(
            service.calculate_checksum(&changeset()),
            service.calculate_checksum(&changeset())
        );
    }

    #[test]
    fn test_checksum_survives_serialization_round_trip() {
        let service = ChangesetChecksumService::new();
        let original = changeset();
        let json = serde_json::to_string(&original).unwrap();
        let restored: Changeset = serde_json::from_str(&json).unwrap();
        assert_eq!(
            service.calculate_checksum(&original),
            service.calculate_checksum(&restored)
        );

        let yaml = serde_saphyr::to_string(&original).unwrap();
        let restored: Changeset = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(
            service.calculate_checksum(&original),
            service.calculate_checksum(&restored)
        );
    }

    #[test]
    fn test_checksum_ignores_metadata() {
        let service = ChangesetChecksumService::new();
        let other = Changeset {
            id: "renamed".to_string(),
            author: None,
            ..changeset()
        }
        .accept_checksum("abc");
        assert_eq!(
            service.calculate_checksum(&changeset()),
            service.calculate_checksum(&other)
        );
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let service = ChangesetChecksumService::new();
        let edited = changeset().with_statement(AddColumnStatement::new(
            "users",
            ColumnDefinition::new("email", "varchar(255)"),
        ));
        assert_ne!(
            service.calculate_checksum(&changeset()),
            service.calculate_checksum(&edited)
        );

        let a = Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 1"));
        let b = Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 2"));
        assert_ne!(service.calculate_checksum(&a), service.calculate_checksum(&b));
    }

    #[test]
    fn test_statement_order_matters() {
        let service = ChangesetChecksumService::new();
        let first: ChangeStatement = RawSqlStatement::new("SELECT 1").into();
        let second: ChangeStatement = RawSqlStatement::new("SELECT 2").into();
        let a = Changeset::new("1")
            .with_statement(first.clone())
            .with_statement(second.clone());
        let b = Changeset::new("1").with_statement(second).with_statement(first);
        assert_ne!(service.calculate_checksum(&a), service.calculate_checksum(&b));
    }

    #[test]
    fn test_compare_checksums() {
        let service = ChangesetChecksumService::new();
        assert!(service.compare_checksums("ABC123", "abc123"));
        assert!(!service.compare_checksums("abc123", "abc124"));
    }
}
