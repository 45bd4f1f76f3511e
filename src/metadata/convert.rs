//! Projection of content-type metadata into the logical schema
//!
//! This is a pure mapping: the same metadata always produces the same
//! schema, and the input is never mutated.

use crate::error::{Error, Result};
use crate::metadata::types::{
    Attribute, ContentType, Metadata, MorphAttribute, RelationAttribute, ScalarAttribute,
};
use crate::schema::types::{Column, ColumnType, ForeignKey, Index, IndexType, Schema, Table};
use crate::utils::naming;

/// Project a metadata collection into a logical schema
pub fn create_schema(metadata: &Metadata) -> Result<Schema> {
    let mut schema = Schema::new();

    for content_type in &metadata.content_types {
        schema.add_table(create_table(content_type)?);
    }

    Ok(schema)
}

fn create_table(content_type: &ContentType) -> Result<Table> {
    let mut table = Table::new(&content_type.table_name);

    for (attribute_name, attribute) in &content_type.attributes {
        match attribute {
            Attribute::Scalar(scalar) => {
                add_scalar_attribute(&mut table, content_type, attribute_name, scalar)?;
            }
            Attribute::Relation(relation) => {
                add_relation_attribute(&mut table, relation);
            }
            Attribute::Morph(morph) => {
                add_morph_attribute(&mut table, attribute_name, morph);
            }
        }
    }

    Ok(table)
}

fn add_scalar_attribute(
    table: &mut Table,
    content_type: &ContentType,
    attribute_name: &str,
    attribute: &ScalarAttribute,
) -> Result<()> {
    let column_type = scalar_column_type(&attribute.kind).ok_or_else(|| {
        Error::UnknownAttributeType {
            content_type: content_type.uid.clone(),
            attribute: attribute_name.to_string(),
            kind: attribute.kind.clone(),
        }
    })?;

    let column_name = attribute
        .column_name
        .clone()
        .unwrap_or_else(|| attribute_name.to_string());

    let is_increments = column_type.is_increments();

    let mut column = Column::new(&column_name, column_type);
    column.default_to = attribute.default.clone();
    // Converted columns always carry a definite nullability so a created
    // column introspects back identically; the tri-state only shows up
    // for columns this engine does not manage.
    column.not_nullable = if is_increments {
        Some(true)
    } else {
        Some(attribute.required.unwrap_or(false))
    };
    column.unsigned = Some(is_increments);
    column.unique = attribute.unique;
    column.primary = attribute.primary || is_increments;

    if attribute.unique {
        table.add_index(Index {
            name: naming::unique_index_name(&table.name, &column_name),
            columns: vec![column_name.clone()],
            index_type: Some(IndexType::Unique),
        });
    }

    // Increments columns carry their primary key inline; a separate
    // primary index is only synthesized for explicit primary flags.
    if attribute.primary && !is_increments {
        table.add_index(Index {
            name: naming::primary_index_name(&table.name, &column_name),
            columns: vec![column_name.clone()],
            index_type: Some(IndexType::Primary),
        });
    }

    table.add_column(column);

    Ok(())
}

// Exact logical -> physical mapping. Anything not listed here is an
// unknown type and must fail the conversion.
fn scalar_column_type(kind: &str) -> Option<ColumnType> {
    match kind {
        "increments" => Some(ColumnType::Increments),
        "password" | "email" | "string" | "enumeration" | "uid" => Some(ColumnType::String),
        "richtext" | "text" => Some(ColumnType::Text),
        "blocks" | "json" => Some(ColumnType::Jsonb),
        "integer" => Some(ColumnType::Integer),
        "biginteger" => Some(ColumnType::BigInteger),
        "float" => Some(ColumnType::Double),
        "decimal" => Some(ColumnType::Decimal {
            precision: 10,
            scale: 2,
        }),
        "date" => Some(ColumnType::Date),
        "time" => Some(ColumnType::Time { precision: 3 }),
        "datetime" => Some(ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        }),
        "timestamp" => Some(ColumnType::Timestamp {
            use_tz: false,
            precision: 6,
        }),
        "boolean" => Some(ColumnType::Boolean),
        _ => None,
    }
}

fn add_relation_attribute(table: &mut Table, relation: &RelationAttribute) {
    let column_name = relation.column_name.clone();
    let fk_name = naming::foreign_key_name(&table.name, &column_name);

    let column_type = relation
        .column_type
        .clone()
        .unwrap_or(ColumnType::Integer);
    let mut column = Column::new(&column_name, column_type);
    column.unsigned = Some(true);
    column.not_nullable = Some(false);
    table.add_column(column);

    table.add_foreign_key(ForeignKey {
        name: fk_name.clone(),
        columns: vec![column_name.clone()],
        referenced_table: relation.referenced_table.clone(),
        referenced_columns: vec![relation.referenced_column.clone()],
        on_delete: relation
            .on_delete
            .clone()
            .or_else(|| Some("SET NULL".to_string())),
        on_update: relation.on_update.clone(),
    });

    table.add_index(Index {
        name: fk_name,
        columns: vec![column_name],
        index_type: None,
    });
}

fn add_morph_attribute(table: &mut Table, attribute_name: &str, morph: &MorphAttribute) {
    let base = morph
        .column_base
        .clone()
        .unwrap_or_else(|| attribute_name.to_string());
    let id_column = format!("{}_id", base);
    let type_column = format!("{}_type", base);

    let mut id = Column::new(&id_column, ColumnType::Integer);
    id.unsigned = Some(true);
    id.not_nullable = Some(false);
    table.add_column(id);
    table.add_column(Column::new(&type_column, ColumnType::String).not_nullable(false));

    table.add_index(Index {
        name: naming::derived_name(&table.name, &[&base], "morphs_idx"),
        columns: vec![id_column, type_column],
        index_type: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::DefaultValue;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn content_type_with(attribute_name: &str, attribute: Attribute) -> Metadata {
        let mut content_type = ContentType::new("api::article.article", "articles");
        content_type.set_attribute(attribute_name, attribute);

        let mut metadata = Metadata::new();
        metadata.add(content_type);
        metadata
    }

    #[rstest]
    #[case("increments", ColumnType::Increments)]
    #[case("password", ColumnType::String)]
    #[case("email", ColumnType::String)]
    #[case("string", ColumnType::String)]
    #[case("enumeration", ColumnType::String)]
    #[case("uid", ColumnType::String)]
    #[case("richtext", ColumnType::Text)]
    #[case("text", ColumnType::Text)]
    #[case("blocks", ColumnType::Jsonb)]
    #[case("json", ColumnType::Jsonb)]
    #[case("integer", ColumnType::Integer)]
    #[case("biginteger", ColumnType::BigInteger)]
    #[case("float", ColumnType::Double)]
    #[case("decimal", ColumnType::Decimal { precision: 10, scale: 2 })]
    #[case("date", ColumnType::Date)]
    #[case("time", ColumnType::Time { precision: 3 })]
    #[case("datetime", ColumnType::Datetime { use_tz: false, precision: 6 })]
    #[case("timestamp", ColumnType::Timestamp { use_tz: false, precision: 6 })]
    #[case("boolean", ColumnType::Boolean)]
    fn maps_logical_types(#[case] kind: &str, #[case] expected: ColumnType) {
        let metadata = content_type_with("field", Attribute::Scalar(ScalarAttribute::new(kind)));

        let schema = create_schema(&metadata).unwrap();
        let column = schema.tables[0].get_column("field").unwrap();

        assert_eq!(column.column_type, expected);
    }

    #[test]
    fn unknown_type_is_fatal() {
        let metadata =
            content_type_with("field", Attribute::Scalar(ScalarAttribute::new("geodata")));

        let err = create_schema(&metadata).unwrap_err();

        match err {
            Error::UnknownAttributeType {
                content_type,
                attribute,
                kind,
            } => {
                assert_eq!(content_type, "api::article.article");
                assert_eq!(attribute, "field");
                assert_eq!(kind, "geodata");
            }
            other => panic!("expected UnknownAttributeType, got {other:?}"),
        }
    }

    #[test]
    fn increments_is_primary_and_not_nullable() {
        let metadata = content_type_with("id", Attribute::Scalar(ScalarAttribute::new("increments")));

        let schema = create_schema(&metadata).unwrap();
        let column = schema.tables[0].get_column("id").unwrap();

        assert_eq!(column.not_nullable, Some(true));
        assert!(column.primary);
        // Primary key is inline; no separate index entry.
        assert!(schema.tables[0].indexes.is_empty());
    }

    #[test]
    fn unique_flag_synthesizes_unique_index() {
        let mut attribute = ScalarAttribute::new("email");
        attribute.unique = true;
        let metadata = content_type_with("email", Attribute::Scalar(attribute));

        let schema = create_schema(&metadata).unwrap();
        let index = schema.tables[0].get_index("articles_email_unique").unwrap();

        assert_eq!(index.columns, vec!["email".to_string()]);
        assert_eq!(index.index_type, Some(IndexType::Unique));
    }

    #[test]
    fn relation_synthesizes_column_fk_and_index_with_shared_name() {
        let metadata = content_type_with(
            "author",
            Attribute::Relation(RelationAttribute::new("author_id", "authors", "id")),
        );

        let schema = create_schema(&metadata).unwrap();
        let table = &schema.tables[0];

        let column = table.get_column("author_id").unwrap();
        assert_eq!(column.column_type, ColumnType::Integer);
        assert_eq!(column.unsigned, Some(true));

        let fk = table.get_foreign_key("articles_author_id_fk").unwrap();
        assert_eq!(fk.referenced_table, "authors");
        assert_eq!(fk.referenced_columns, vec!["id".to_string()]);
        assert_eq!(fk.on_delete.as_deref(), Some("SET NULL"));

        let index = table.get_index("articles_author_id_fk").unwrap();
        assert_eq!(index.columns, vec!["author_id".to_string()]);
        assert_eq!(index.index_type, None);
    }

    #[test]
    fn morph_synthesizes_column_pair_without_foreign_key() {
        let metadata = content_type_with("related", Attribute::Morph(MorphAttribute::default()));

        let schema = create_schema(&metadata).unwrap();
        let table = &schema.tables[0];

        let id = table.get_column("related_id").unwrap();
        assert_eq!(id.column_type, ColumnType::Integer);
        assert_eq!(id.unsigned, Some(true));

        let discriminator = table.get_column("related_type").unwrap();
        assert_eq!(discriminator.column_type, ColumnType::String);

        assert!(table.foreign_keys.is_empty());
        let index = table.get_index("articles_related_morphs_idx").unwrap();
        assert_eq!(
            index.columns,
            vec!["related_id".to_string(), "related_type".to_string()]
        );
    }

    #[test]
    fn conversion_is_referentially_transparent() {
        let mut content_type = ContentType::new("api::article.article", "articles");
        content_type.set_attribute("id", Attribute::Scalar(ScalarAttribute::new("increments")));
        content_type.set_attribute("title", Attribute::Scalar(ScalarAttribute::new("string")));
        let mut price = ScalarAttribute::new("decimal");
        price.default = Some(DefaultValue::Literal("0.00".to_string()));
        content_type.set_attribute("price", Attribute::Scalar(price));
        content_type.set_attribute(
            "author",
            Attribute::Relation(RelationAttribute::new("author_id", "authors", "id")),
        );

        let mut metadata = Metadata::new();
        metadata.add(content_type);

        let first = create_schema(&metadata).unwrap();
        let second = create_schema(&metadata).unwrap();

        assert_eq!(first, second);
    }
}
