//! SQL helper functions shared by the `SQLite` backends.

use crate::Error;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Escapes SQL LIKE wildcards (`%`, `_`, `\`) so they match literally.
///
/// Pair the resulting pattern with `ESCAPE '\'`.
///
/// # Examples
///
/// ```
/// use agentlore::storage::sqlite::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("add_user"), "add\\_user");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// Builds `count` numbered placeholders starting at `?start`, comma separated.
///
/// # Examples
///
/// ```
/// use agentlore::storage::sqlite::numbered_placeholders;
///
/// assert_eq!(numbered_placeholders(3, 2), "?3, ?4");
/// assert_eq!(numbered_placeholders(1, 0), "");
/// ```
#[must_use]
pub fn numbered_placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Returns a closure wrapping a `rusqlite` error as [`Error::OperationFailed`].
pub fn sql_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// Decodes a JSON text column, failing the row on malformed content.
///
/// `column` is the index reported in the conversion error.
///
/// # Errors
///
/// Returns [`rusqlite::Error::FromSqlConversionFailure`] if `raw` is not
/// valid JSON for `T`.
pub fn json_column<T: DeserializeOwned>(raw: &str, column: usize) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_wildcards_plain() {
        assert_eq!(escape_like_wildcards("addloginhandler"), "addloginhandler");
        assert_eq!(escape_like_wildcards(""), "");
    }

    #[test]
    fn test_escape_like_wildcards_backslash() {
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(numbered_placeholders(1, 3), "?1, ?2, ?3");
    }

    #[test]
    fn test_json_column() {
        let files: Vec<String> = json_column(r#"["a.rs","b.rs"]"#, 14).unwrap();
        assert_eq!(files, vec!["a.rs", "b.rs"]);

        let err = json_column::<Vec<String>>("[\"a.rs\"", 14).unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(14, Type::Text, _)));
    }

    #[test]
    fn test_sql_error_wraps_operation() {
        let err = sql_error("get_node")(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "get_node"));
    }
}
