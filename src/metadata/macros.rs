//! Declarative entity mapping.
//!
//! [`impl_entity!`](crate::impl_entity) writes the [`Entity`](super::Entity)
//! implementation for a plain struct whose mapped fields are `Clone`,
//! convertible into [`SqlValue`](crate::models::SqlValue) and decodable with
//! [`FromSqlValue`](crate::models::FromSqlValue).

/// Map a struct onto a table.
///
/// # Example
///
/// ```ignore
/// impl_entity!(Category,
///     table = "categories",
///     key: id => "id",
///     columns {
///         name => "name",
///         slug => "slug",
///     }
/// );
///
/// // Caller-supplied key
/// impl_entity!(Tag,
///     table = "tags",
///     key(assigned): code => "code",
///     columns { label => "label" }
/// );
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $entity:ty,
        table = $table:literal,
        key $(($assigned:ident))? : $key:ident => $key_col:literal,
        columns { $($field:ident => $col:literal),+ $(,)? } $(,)?
    ) => {
        impl $crate::metadata::Entity for $entity {
            fn describe(schema: &mut $crate::metadata::EntitySchema<Self>) {
                schema.table($table);
                let key = schema
                    .primary_key($key_col)
                    .read(|e: &$entity| {
                        $crate::models::SqlValue::from(::std::clone::Clone::clone(&e.$key))
                    })
                    .write(|e: &mut $entity, v| {
                        e.$key = $crate::models::FromSqlValue::from_sql_value(v)?;
                        Ok(())
                    });
                $(
                    let _ = stringify!($assigned);
                    let key = key.assigned();
                )?
                let _ = key;
                $(
                    schema
                        .column($col)
                        .read(|e: &$entity| {
                            $crate::models::SqlValue::from(::std::clone::Clone::clone(&e.$field))
                        })
                        .write(|e: &mut $entity, v| {
                            e.$field = $crate::models::FromSqlValue::from_sql_value(v)?;
                            Ok(())
                        });
                )+
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::metadata::{KeyGeneration, table_metadata};
    use crate::models::SqlValue;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Tag {
        code: String,
        label: Option<String>,
        weight: i32,
    }

    crate::impl_entity!(Tag,
        table = "tags",
        key(assigned): code => "code",
        columns {
            label => "label",
            weight => "weight",
        }
    );

    #[derive(Debug, Default)]
    struct Counter {
        id: i64,
        hits: i64,
    }

    crate::impl_entity!(Counter, table = "counters", key: id => "id", columns { hits => "hits" });

    #[test]
    fn test_macro_generates_accessors() {
        let meta = table_metadata::<Tag>().unwrap();
        assert_eq!(meta.table_name(), "tags");
        assert_eq!(meta.key_generation(), KeyGeneration::Assigned);

        let tag = Tag {
            code: "rust".to_string(),
            label: None,
            weight: 3,
        };
        assert_eq!(
            meta.primary_key().read(&tag),
            SqlValue::Text("rust".to_string())
        );
        assert!(meta.resolve_field("label").unwrap().read(&tag).is_null());

        let mut copy = Tag::default();
        for column in meta.all_columns() {
            column.write(&mut copy, column.read(&tag)).unwrap();
        }
        assert_eq!(copy, tag);
    }

    #[test]
    fn test_macro_default_key_is_identity() {
        let meta = table_metadata::<Counter>().unwrap();
        assert_eq!(meta.key_generation(), KeyGeneration::Identity);
        assert_eq!(meta.columns().len(), 1);

        let counter = Counter { id: 9, hits: 2 };
        assert_eq!(meta.resolve_field("hits").unwrap().read(&counter), SqlValue::Int(2));
    }
}
