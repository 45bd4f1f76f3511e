//! Naming utilities for contentdb
//!
//! Derived identifier construction for synthesized indexes and constraints.

/// Longest identifier accepted by every supported engine (MySQL's 64-byte
/// limit is the tightest).
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Suffix for foreign keys and their supporting indexes
pub const FK_SUFFIX: &str = "fk";
/// Suffix for unique indexes
pub const UNIQUE_SUFFIX: &str = "unique";
/// Suffix for primary indexes
pub const PRIMARY_SUFFIX: &str = "pk";
/// Suffix for plain secondary indexes
pub const INDEX_SUFFIX: &str = "idx";

/// Build a derived identifier `<table>_<columns>_<suffix>`, compressed to
/// fit the identifier length limit.
pub fn derived_name(table_name: &str, columns: &[&str], suffix: &str) -> String {
    let base = format!("{}_{}", table_name, columns.join("_"));
    compress_identifier(&format!("{}_{}", base, suffix))
}

/// Name shared by a synthesized foreign key and its supporting index
pub fn foreign_key_name(table_name: &str, column_name: &str) -> String {
    derived_name(table_name, &[column_name], FK_SUFFIX)
}

/// Name for a synthesized unique index
pub fn unique_index_name(table_name: &str, column_name: &str) -> String {
    derived_name(table_name, &[column_name], UNIQUE_SUFFIX)
}

/// Name for a synthesized primary index
pub fn primary_index_name(table_name: &str, column_name: &str) -> String {
    derived_name(table_name, &[column_name], PRIMARY_SUFFIX)
}

/// Name for a plain secondary index over the given columns
pub fn index_name(table_name: &str, columns: &[&str]) -> String {
    derived_name(table_name, columns, INDEX_SUFFIX)
}

/// Compress an identifier to `MAX_IDENTIFIER_LENGTH` by replacing the tail
/// with an md5 stub. The suffix after the last `_` is preserved so the
/// identifier still reads as what it is.
fn compress_identifier(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }

    let (base, suffix) = match name.rfind('_') {
        Some(pos) => (&name[..pos], &name[pos..]),
        None => (name, ""),
    };

    let stub = format!("{:x}", md5::compute(base));
    let stub = &stub[..8];

    let keep = MAX_IDENTIFIER_LENGTH - stub.len() - 1 - suffix.len();
    format!("{}_{}{}", &base[..keep], stub, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derived_names_are_deterministic() {
        assert_eq!(foreign_key_name("articles", "author_id"), "articles_author_id_fk");
        assert_eq!(unique_index_name("users", "email"), "users_email_unique");
        assert_eq!(primary_index_name("users", "id"), "users_id_pk");
        assert_eq!(index_name("files", &["related_id", "related_type"]), "files_related_id_related_type_idx");
    }

    #[test]
    fn long_identifiers_are_compressed_with_stable_stub() {
        let table = "a_particularly_long_component_table_name_for_repeatable_fields";
        let name = foreign_key_name(table, "entity_relation_target_id");

        assert!(name.len() <= MAX_IDENTIFIER_LENGTH);
        assert!(name.ends_with("_fk"));
        // Same input compresses to the same identifier.
        assert_eq!(name, foreign_key_name(table, "entity_relation_target_id"));
    }

    #[test]
    fn short_identifiers_are_untouched() {
        assert_eq!(derived_name("t", &["c"], "idx"), "t_c_idx");
    }
}
