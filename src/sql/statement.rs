//! SQL text with named parameters.
//!
//! Statements are written with `@name` placeholders regardless of backend and
//! compiled to the driver's positional form right before execution.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, SqlValue};

/// Named parameter values in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, SqlValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, replacing any earlier value with the same name.
    ///
    /// A leading `@` on the name is ignored.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        let name = name.into();
        let name = match name.strip_prefix('@') {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Build a [`Params`] from `"name" => value` pairs.
///
/// ```ignore
/// let params = params! { "min_price" => 10.0, "active" => true };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::sql::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::sql::Params::new();
        $( params.bind($name, $value); )+
        params
    }};
}

/// SQL with `@name` placeholders and the values to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

/// Backend-ready SQL with positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Rewrite placeholders for `db_type` and collect values in bind order.
    pub fn compile(&self, db_type: DatabaseType) -> DbResult<CompiledStatement> {
        let (sql, names) = rewrite_placeholders(&self.sql, db_type);
        let values = names
            .iter()
            .map(|name| {
                self.params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DbError::missing_parameter(name.as_str()))
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(CompiledStatement { sql, values })
    }
}

/// Replace `@name` placeholders with the backend's positional form.
///
/// Returns the rewritten SQL and the parameter name for each bind position.
/// PostgreSQL reuses `$n` for a repeated name; `?` backends repeat the name.
pub(crate) fn rewrite_placeholders(sql: &str, db_type: DatabaseType) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                // MySQL strings also take backslash escapes; identifiers do not
                let backslash_escapes = db_type == DatabaseType::MySQL && c != '`';
                let mut escaped = false;
                // Doubled quotes close and reopen, which leaves us inside
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if escaped {
                        escaped = false;
                    } else if backslash_escapes && next == '\\' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
            }
            '-' if sql[i + 1..].starts_with('-') => {
                out.push(c);
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if sql[i + 1..].starts_with('*') => {
                out.push(c);
                let mut prev = '\0';
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '@' => {
                if sql[i + 1..].starts_with('@') {
                    out.push_str("@@");
                    chars.next();
                    while let Some(&(_, next)) = chars.peek() {
                        if !is_ident_char(next) {
                            break;
                        }
                        out.push(next);
                        chars.next();
                    }
                    continue;
                }
                match chars.peek() {
                    Some(&(_, next)) if next.is_ascii_alphabetic() || next == '_' => {
                        let mut name = String::new();
                        while let Some(&(_, next)) = chars.peek() {
                            if !is_ident_char(next) {
                                break;
                            }
                            name.push(next);
                            chars.next();
                        }
                        match db_type {
                            DatabaseType::PostgreSQL => {
                                let index = match names.iter().position(|n| *n == name) {
                                    Some(pos) => pos + 1,
                                    None => {
                                        names.push(name);
                                        names.len()
                                    }
                                };
                                out.push('$');
                                out.push_str(&index.to_string());
                            }
                            DatabaseType::MySQL | DatabaseType::SQLite => {
                                names.push(name);
                                out.push('?');
                            }
                        }
                    }
                    _ => out.push('@'),
                }
            }
            _ => out.push(c),
        }
    }

    (out, names)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_replaces_and_strips_prefix() {
        let mut params = Params::new();
        params.bind("@id", 1).bind("id", 2);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some(&SqlValue::Int(2)));
        assert_eq!(params.get("@id"), Some(&SqlValue::Int(2)));
    }

    #[test]
    fn test_params_macro() {
        let params = crate::params! { "name" => "kettle", "price" => 12.5 };
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("name"), Some(&SqlValue::Text("kettle".into())));
        assert!(crate::params!().is_empty());
    }

    #[test]
    fn test_compile_postgres_reuses_index() {
        let stmt = Statement::new(
            "SELECT * FROM t WHERE a = @x OR b = @y OR c = @x",
            crate::params! { "x" => 1, "y" => 2 },
        );
        let compiled = stmt.compile(DatabaseType::PostgreSQL).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM t WHERE a = $1 OR b = $2 OR c = $1");
        assert_eq!(compiled.values, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_compile_question_mark_repeats_values() {
        let stmt = Statement::new(
            "SELECT * FROM t WHERE a = @x OR b = @y OR c = @x",
            crate::params! { "x" => 1, "y" => 2 },
        );
        let compiled = stmt.compile(DatabaseType::SQLite).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM t WHERE a = ? OR b = ? OR c = ?");
        assert_eq!(
            compiled.values,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(1)]
        );
    }

    #[test]
    fn test_compile_missing_parameter() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = @missing", Params::new());
        let err = stmt.compile(DatabaseType::MySQL).unwrap_err();
        assert!(matches!(err, DbError::MissingParameter { ref name } if name == "missing"));
    }

    #[test]
    fn test_unused_parameters_are_ignored() {
        let stmt = Statement::new("SELECT 1", crate::params! { "extra" => 1 });
        let compiled = stmt.compile(DatabaseType::SQLite).unwrap();
        assert!(compiled.values.is_empty());
    }

    #[test]
    fn test_placeholders_in_literals_and_comments_are_kept() {
        let sql = "SELECT '@a', \"@b\", `@c` -- @d\n, /* @e */ @@version, x@ FROM t WHERE y = @f";
        let (out, names) = rewrite_placeholders(sql, DatabaseType::MySQL);
        assert_eq!(
            out,
            "SELECT '@a', \"@b\", `@c` -- @d\n, /* @e */ @@version, x@ FROM t WHERE y = ?"
        );
        assert_eq!(names, vec!["f".to_string()]);
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let (out, names) =
            rewrite_placeholders("SELECT 'it''s @x' WHERE a = @y", DatabaseType::PostgreSQL);
        assert_eq!(out, "SELECT 'it''s @x' WHERE a = $1");
        assert_eq!(names, vec!["y".to_string()]);
    }

    #[test]
    fn test_mysql_backslash_escape_inside_literal() {
        let compiled = Statement::new(
            r"SELECT * FROM t WHERE note = 'it\'s @x' AND id = @id",
            params! { "id" => 1i64 },
        )
        .compile(DatabaseType::MySQL)
        .unwrap();
        assert_eq!(compiled.sql, r"SELECT * FROM t WHERE note = 'it\'s @x' AND id = ?");
        assert_eq!(compiled.values, vec![SqlValue::Int(1)]);

        let (out, names) =
            rewrite_placeholders(r#"SELECT "a\"@b" FROM t WHERE c = @c"#, DatabaseType::MySQL);
        assert_eq!(out, r#"SELECT "a\"@b" FROM t WHERE c = ?"#);
        assert_eq!(names, vec!["c".to_string()]);
    }

    #[test]
    fn test_backslash_is_literal_outside_mysql() {
        let (out, names) =
            rewrite_placeholders(r"SELECT 'C:\' || @path AS p", DatabaseType::PostgreSQL);
        assert_eq!(out, r"SELECT 'C:\' || $1 AS p");
        assert_eq!(names, vec!["path".to_string()]);
    }
}
