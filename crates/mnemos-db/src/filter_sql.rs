//! SQL WHERE clause generation for [`DocumentFilter`].
//!
//! Produces parameterized fragments over the `vector_document` table (alias
//! `d`) so the same predicate drives both candidate fetches and the pgvector
//! similarity query.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use mnemos_core::DocumentFilter;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    String(String),
    StringArray(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl QueryParam {
    /// Bind this parameter onto a query.
    pub fn bind<'q>(
        &'q self,
        q: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            QueryParam::String(s) => q.bind(s),
            QueryParam::StringArray(v) => q.bind(v),
            QueryParam::Timestamp(t) => q.bind(t),
        }
    }
}

/// Converts a [`DocumentFilter`] into a WHERE clause with positional parameters.
pub struct DocumentFilterQueryBuilder<'a> {
    filter: &'a DocumentFilter,
    param_offset: usize,
}

impl<'a> DocumentFilterQueryBuilder<'a> {
    /// `param_offset` is the number of parameters already bound before the
    /// clause; the first generated placeholder is `$param_offset + 1`.
    pub fn new(filter: &'a DocumentFilter, param_offset: usize) -> Self {
        Self {
            filter,
            param_offset,
        }
    }

    /// Build the clause (never empty; `TRUE` when unconstrained) and its parameters.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<QueryParam> = Vec::new();
        let next = |params: &mut Vec<QueryParam>, p: QueryParam| {
            params.push(p);
            format!("${}", self.param_offset + params.len())
        };

        if let Some(ref org) = self.filter.organization_id {
            let ph = next(&mut params, QueryParam::String(org.clone()));
            clauses.push(format!("d.organization_id = {}", ph));
        }
        if !self.filter.types.is_empty() {
            let types = self.filter.types.iter().map(|t| t.to_string()).collect();
            let ph = next(&mut params, QueryParam::StringArray(types));
            clauses.push(format!("d.doc_type = ANY({})", ph));
        }
        if !self.filter.sources.is_empty() {
            let ph = next(&mut params, QueryParam::StringArray(self.filter.sources.clone()));
            clauses.push(format!("d.source = ANY({})", ph));
        }
        if !self.filter.include_external {
            clauses.push("d.doc_type <> 'external'".to_string());
        }
        if let Some(ref user) = self.filter.user_id {
            let ph = next(&mut params, QueryParam::String(user.clone()));
            clauses.push(format!(
                "(d.owner_user_id = {} OR d.doc_type = 'knowledge')",
                ph
            ));
        }
        if let Some(range) = self.filter.date_range {
            let from = next(&mut params, QueryParam::Timestamp(range.from));
            let to = next(&mut params, QueryParam::Timestamp(range.to));
            clauses.push(format!("d.created_at BETWEEN {} AND {}", from, to));
        }
        if !self.filter.exclude_ids.is_empty() {
            let ph = next(&mut params, QueryParam::StringArray(self.filter.exclude_ids.clone()));
            clauses.push(format!("NOT (d.id = ANY({}))", ph));
        }

        if clauses.is_empty() {
            ("TRUE".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }
}
