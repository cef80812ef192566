//! Placeholder rewriting.
//!
//! Callers write SQL with named placeholders (`@id`, `:id` or `$id`) or numbered
//! ones (`?1`, `$1`). Before execution the text is rewritten into the numbered
//! style of the bound driver and the parameters are reordered to match:
//!
//! ```rust
//! use sql_helper::prelude::*;
//!
//! let params = vec![Parameter::new("id", 1), Parameter::new("x", 5)];
//! let rewritten = rewrite(
//!     "UPDATE t SET x = @x WHERE id = @id OR parent = @id",
//!     &params,
//!     PlaceholderStyle::Postgres,
//! )?;
//! assert_eq!(rewritten.sql, "UPDATE t SET x = $1 WHERE id = $2 OR parent = $2");
//! assert_eq!(rewritten.bound[0].name, "x");
//! # Ok::<(), SqlHelperError>(())
//! ```
//!
//! The scanner skips quoted strings, comments, dollar-quoted blocks, `::` casts and
//! `@@` variables. It does not parse SQL; placeholders that look like something else
//! in dialect-specific syntax may still be picked up.

mod parsers;
mod scanner;

use std::borrow::Cow;

use scanner::{Placeholder, Token, scan};

use crate::error::SqlHelperError;
use crate::params::Parameter;

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    fn marker(self) -> char {
        match self {
            PlaceholderStyle::Postgres => '$',
            PlaceholderStyle::Sqlite => '?',
        }
    }

    fn accepts_anonymous(self) -> bool {
        matches!(self, PlaceholderStyle::Sqlite)
    }
}

/// SQL text ready for the driver plus the parameters in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenSql {
    pub sql: String,
    /// `bound[i]` binds placeholder number `i + 1`.
    pub bound: Vec<Parameter>,
}

/// Distinct named placeholders in first-occurrence order, without their marker.
#[must_use]
pub fn named_placeholders(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in scan(sql, false) {
        if let Placeholder::Named(name) = token.placeholder
            && !names.iter().any(|n| n.eq_ignore_ascii_case(&name))
        {
            names.push(name);
        }
    }
    names
}

/// Rewrite `sql` into the numbered placeholder style of `style`.
///
/// Named placeholders are numbered by first occurrence (a repeated name reuses its
/// number) and matched to parameters by name, ignoring ASCII case. Numbered
/// placeholders bind parameters in list order. Parameters the text never
/// references are not bound.
///
/// # Errors
/// - `MissingParameterBinding` when a placeholder has no parameter.
/// - `ParameterError` when named and numbered placeholders are mixed.
pub fn rewrite(
    sql: &str,
    params: &[Parameter],
    style: PlaceholderStyle,
) -> Result<RewrittenSql, SqlHelperError> {
    let tokens = scan(sql, style.accepts_anonymous());
    let named = tokens
        .iter()
        .any(|t| matches!(t.placeholder, Placeholder::Named(_)));
    let positional = tokens
        .iter()
        .any(|t| !matches!(t.placeholder, Placeholder::Named(_)));

    let rewritten = match (named, positional) {
        (true, true) => {
            return Err(SqlHelperError::ParameterError(
                "named and positional placeholders cannot be mixed in one command".into(),
            ));
        }
        (true, false) => rewrite_named(sql, &tokens, params, style)?,
        (false, true) => rewrite_positional(sql, &tokens, params, style)?,
        (false, false) => RewrittenSql {
            sql: sql.to_string(),
            bound: Vec::new(),
        },
    };

    if rewritten.bound.len() < params.len() {
        tracing::debug!(
            supplied = params.len(),
            bound = rewritten.bound.len(),
            "parameters without a placeholder were not bound"
        );
    }
    Ok(rewritten)
}

fn rewrite_named(
    sql: &str,
    tokens: &[Token],
    params: &[Parameter],
    style: PlaceholderStyle,
) -> Result<RewrittenSql, SqlHelperError> {
    let mut out = String::with_capacity(sql.len());
    let mut bound: Vec<Parameter> = Vec::new();
    let mut last = 0;

    for token in tokens {
        let Placeholder::Named(name) = &token.placeholder else {
            continue;
        };
        let number = match bound.iter().position(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(pos) => pos + 1,
            None => {
                let param = find_parameter(params, name).ok_or_else(|| {
                    SqlHelperError::MissingParameterBinding { name: name.clone() }
                })?;
                bound.push(param.clone());
                bound.len()
            }
        };
        out.push_str(&sql[last..token.start]);
        out.push(style.marker());
        out.push_str(&number.to_string());
        last = token.end;
    }
    out.push_str(&sql[last..]);

    Ok(RewrittenSql { sql: out, bound })
}

/// Numbers anonymous `?` markers, then hands the marker switch to
/// [`translate_placeholders`].
fn rewrite_positional(
    sql: &str,
    tokens: &[Token],
    params: &[Parameter],
    style: PlaceholderStyle,
) -> Result<RewrittenSql, SqlHelperError> {
    let mut numbered = String::with_capacity(sql.len());
    let mut last = 0;
    let mut next_anonymous = 0;
    let mut highest = 0;

    for token in tokens {
        let number = match token.placeholder {
            Placeholder::Numbered(n) => {
                next_anonymous = n;
                n
            }
            Placeholder::Anonymous => {
                next_anonymous += 1;
                numbered.push_str(&sql[last..token.start]);
                numbered.push('?');
                numbered.push_str(&next_anonymous.to_string());
                last = token.end;
                next_anonymous
            }
            Placeholder::Named(_) => continue,
        };
        if number == 0 || number > params.len() {
            return Err(SqlHelperError::MissingParameterBinding {
                name: format!("{}{number}", style.marker()),
            });
        }
        highest = highest.max(number);
    }
    numbered.push_str(&sql[last..]);

    Ok(RewrittenSql {
        sql: translate_placeholders(&numbered, style).into_owned(),
        bound: params[..highest].to_vec(),
    })
}

fn find_parameter<'p>(params: &'p [Parameter], name: &str) -> Option<&'p Parameter> {
    params
        .iter()
        .find(|p| p.name == name)
        .or_else(|| params.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
}

/// Translate numbered placeholders between Postgres-style `$N` and SQLite-style `?N`.
///
/// Named placeholders are left alone. Returns a borrowed `Cow` when no changes are
/// needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let tokens: Vec<Token> = scan(sql, false)
        .into_iter()
        .filter(|t| matches!(t.placeholder, Placeholder::Numbered(_)))
        .filter(|t| !sql[t.start..].starts_with(target.marker()))
        .collect();
    if tokens.is_empty() {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for token in &tokens {
        out.push_str(&sql[last..token.start]);
        out.push(target.marker());
        out.push_str(&sql[token.start + 1..token.end]);
        last = token.end;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    fn p(name: &str, value: i64) -> Parameter {
        Parameter::new(name, value)
    }

    #[test]
    fn translates_sqlite_to_postgres() {
        let sql = "select * from t where a = ?1 and b = ?2";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn translates_postgres_to_sqlite() {
        let sql = "insert into t values($1, $2)";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?1', $1 -- $2\n/* ?3 */ from t where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "select '?1', ?1 -- $2\n/* ?3 */ from t where a = ?1");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select $1 from t $foo$ where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "$foo$ select $1 from t $foo$ where a = ?1");
    }

    #[test]
    fn untouched_text_is_borrowed() {
        let sql = "select * from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert!(matches!(res, Cow::Borrowed(_)));
    }

    #[test]
    fn rewrites_named_for_sqlite_in_first_occurrence_order() {
        let params = vec![p("id", 1), p("x", 5)];
        let res = rewrite(
            "UPDATE t SET x=@x WHERE id=:id AND x <> $x",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(res.sql, "UPDATE t SET x=?1 WHERE id=?2 AND x <> ?1");
        let names: Vec<&str> = res.bound.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "id"]);
    }

    #[test]
    fn binding_is_case_insensitive() {
        let res = rewrite("select @ID", &[p("id", 9)], PlaceholderStyle::Postgres).unwrap();
        assert_eq!(res.sql, "select $1");
        assert_eq!(res.bound[0].value, RowValues::Int(9));
    }

    #[test]
    fn missing_binding_is_reported() {
        let err = rewrite(
            "select * from t where a = @a and b = @b",
            &[p("a", 1)],
            PlaceholderStyle::Sqlite,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SqlHelperError::MissingParameterBinding { ref name } if name == "b"
        ));
    }

    #[test]
    fn unreferenced_parameters_are_dropped() {
        let res = rewrite("select @a", &[p("z", 0), p("a", 1)], PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(res.bound.len(), 1);
        assert_eq!(res.bound[0].name, "a");
    }

    #[test]
    fn positional_binds_in_list_order() {
        let params = vec![p("p0", 1), p("p1", 2), p("p2", 3)];
        let res = rewrite("select ?, ?", &params, PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(res.sql, "select ?1, ?2");
        assert_eq!(res.bound.len(), 2);

        let res = rewrite("select ?2, ?1", &params, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(res.sql, "select $2, $1");

        let err = rewrite("select $4", &params, PlaceholderStyle::Postgres).unwrap_err();
        assert!(matches!(err, SqlHelperError::MissingParameterBinding { .. }));
    }

    #[test]
    fn anonymous_markers_continue_after_numbered_ones() {
        let params = vec![p("p0", 1), p("p1", 2), p("p2", 3)];
        let res = rewrite("select $2, ?", &params, PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(res.sql, "select ?2, ?3");
        assert_eq!(res.bound.len(), 3);
    }

    #[test]
    fn mixing_styles_is_rejected() {
        let err = rewrite("select @a, ?1", &[p("a", 1)], PlaceholderStyle::Sqlite).unwrap_err();
        assert!(matches!(err, SqlHelperError::ParameterError(_)));
    }

    #[test]
    fn no_placeholders_binds_nothing() {
        let res = rewrite("select 1", &[p("a", 1)], PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(res.sql, "select 1");
        assert!(res.bound.is_empty());
    }

    #[test]
    fn lists_named_placeholders_once() {
        assert_eq!(
            named_placeholders("select @a, :b, @A, $c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn keeps_non_ascii_text_intact() {
        let res = rewrite("select 'héllo', @名", &[], PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(res.sql, "select 'héllo', @名");
    }
}
