//! Alias naming for query sources.

use crate::query::{Query, Source};
use crate::{Error, Result, quote_table};

/// The derived name of one query source.
#[derive(Debug, Clone)]
pub struct SourceName {
    /// Pre-rendered `"prefix"."table"` for real tables; `None` for
    /// subqueries and fragments, which render at the call site.
    pub rendered: Option<String>,
    /// The alias the source is referred to by, e.g. `u0`, `s1`, `f2`.
    pub alias: String,
    /// The schema of a table source, when it has one.
    pub schema: Option<String>,
}

/// Positional alias table for a query's sources, built once per rendering.
///
/// Aliases are stable within one rendering: the first ASCII letter of the
/// table name (or `t`) followed by the source's position; subqueries and
/// fragments use `s` and `f`.
#[derive(Debug, Clone)]
pub struct SourceTable {
    entries: Vec<SourceName>,
}

impl SourceTable {
    pub fn build(query: &Query) -> Result<Self> {
        let entries = query
            .sources
            .iter()
            .enumerate()
            .map(|(ix, source)| {
                Ok(match source {
                    Source::Table {
                        name,
                        schema,
                        prefix,
                    } => SourceName {
                        rendered: Some(quote_table(prefix.as_deref(), name)?),
                        alias: format!("{}{ix}", create_alias(name)),
                        schema: schema.clone(),
                    },
                    Source::Subquery(_) => SourceName {
                        rendered: None,
                        alias: format!("s{ix}"),
                        schema: None,
                    },
                    Source::Fragment(_) => SourceName {
                        rendered: None,
                        alias: format!("f{ix}"),
                        schema: None,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Look up a source by position.
    pub fn get(&self, ix: usize) -> Result<&SourceName> {
        self.entries.get(ix).ok_or(Error::BadSourceRef(ix))
    }
}

fn create_alias(table: &str) -> char {
    match table.bytes().next() {
        Some(b) if b.is_ascii_alphabetic() => b as char,
        _ => 't',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::FragmentPart;

    #[test]
    fn test_alias_derivation() {
        let query = Query {
            sources: vec![
                Source::table("users"),
                Source::Subquery(Query::default()),
                Source::Fragment(vec![FragmentPart::Raw("generate_series(1, 10)".into())]),
                Source::table("1users"),
            ],
            ..Default::default()
        };
        let sources = SourceTable::build(&query).unwrap();
        assert_eq!(sources.get(0).unwrap().alias, "u0");
        assert_eq!(sources.get(1).unwrap().alias, "s1");
        assert_eq!(sources.get(2).unwrap().alias, "f2");
        assert_eq!(sources.get(3).unwrap().alias, "t3");
    }

    #[test]
    fn test_rendered_table() {
        let query = Query::new(Source::Table {
            name: "users".into(),
            schema: None,
            prefix: Some("audit".into()),
        });
        let sources = SourceTable::build(&query).unwrap();
        assert_eq!(
            sources.get(0).unwrap().rendered.as_deref(),
            Some("\"audit\".\"users\"")
        );
    }

    #[test]
    fn test_out_of_range() {
        let sources = SourceTable::build(&Query::new(Source::table("users"))).unwrap();
        assert!(sources.get(1).is_err());
    }
}
