//! Item query builder
//!
//! Turns a URL-style query string into parameterized SQL over the items table.

use crate::query::order::{parse_order_list, Direction, OrderTerm, SortColumn, SortExpr};
use crate::query::QueryError;
use crate::storage::LookupKind;
use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::BTreeSet;

/// Largest page a single query may return
pub const MAX_LIMIT: u32 = 20;

/// Comparison operators for scalar predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn from_token(token: &str) -> Result<Self, QueryError> {
        match token {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            "gt" => Ok(Self::Gt),
            "ge" => Ok(Self::Ge),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Splits `op:value`
fn split_predicate<'a>(key: &str, value: &'a str) -> Result<(Comparison, &'a str), QueryError> {
    let (op, operand) = value
        .split_once(':')
        .ok_or_else(|| QueryError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
    Ok((Comparison::from_token(op)?, operand))
}

fn parse_ids(value: &str) -> Result<Vec<i64>, QueryError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| QueryError::InvalidId(token.to_string()))
        })
        .collect()
}

/// Compact row returned by item queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummary {
    pub id: i64,
    pub name: String,
    pub price: Option<i64>,
    pub release_date: Option<String>,
    pub coming_soon: bool,
    pub rating: Option<u8>,
    pub owner_count: i64,
}

/// SQL text plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Structured read-side query
#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    pub tags: Vec<i64>,
    pub genres: Vec<i64>,
    pub categories: Vec<i64>,
    pub order_by: Vec<OrderTerm>,
    pub limit: u32,
    pub offset: u32,
    pub coming_soon: Option<bool>,
    pub release_date: Option<(Comparison, NaiveDate)>,
    pub rating: Option<(Comparison, u8)>,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            genres: Vec::new(),
            categories: Vec::new(),
            order_by: Vec::new(),
            limit: MAX_LIMIT,
            offset: 0,
            coming_soon: None,
            release_date: None,
            rating: None,
        }
    }
}

impl ItemQuery {
    /// Parses a query string such as
    /// `tags=1,2&order_by=rating:desc&limit=10&release_date=gt:2020-01-01`
    pub fn from_query_string(query: &str) -> Result<Self, QueryError> {
        let query = query.trim_start_matches('?');
        let mut parsed = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let invalid = || QueryError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };

            match key.as_ref() {
                "tags" => parsed.tags = parse_ids(&value)?,
                "genres" => parsed.genres = parse_ids(&value)?,
                "categories" => parsed.categories = parse_ids(&value)?,
                "order_by" => parsed.order_by = parse_order_list(&value)?,
                "limit" => parsed.limit = value.parse().map_err(|_| invalid())?,
                "offset" => parsed.offset = value.parse().map_err(|_| invalid())?,
                "coming_soon" => parsed.coming_soon = Some(value.parse().map_err(|_| invalid())?),
                "release_date" => {
                    let (op, date) = split_predicate(&key, &value)?;
                    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .map_err(|_| invalid())?;
                    parsed.release_date = Some((op, date));
                }
                "rating" => {
                    let (op, rating) = split_predicate(&key, &value)?;
                    let rating: u8 = rating.parse().map_err(|_| invalid())?;
                    if rating > 100 {
                        return Err(invalid());
                    }
                    parsed.rating = Some((op, rating));
                }
                other => return Err(QueryError::UnknownParameter(other.to_string())),
            }
        }

        Ok(parsed)
    }

    /// Builds the parameterized SQL for this query
    pub fn build(&self) -> Result<BuiltQuery, QueryError> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(QueryError::LimitOutOfRange(self.limit));
        }

        let mut sql = String::from(
            "SELECT items.id, items.name, items.price, items.release_date, \
             items.coming_soon, items.rating, items.owner_count FROM items",
        );
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (kind, ids) in [
            (LookupKind::Tag, &self.tags),
            (LookupKind::Genre, &self.genres),
            (LookupKind::Category, &self.categories),
        ] {
            let ids: BTreeSet<i64> = ids.iter().copied().collect();
            if ids.is_empty() {
                continue;
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!(
                "items.id IN (SELECT item_id FROM {rel} WHERE {col} IN ({placeholders}) \
                 GROUP BY item_id HAVING COUNT(DISTINCT {col}) = ?)",
                rel = kind.relation_table(),
                col = kind.relation_column(),
            ));
            params.extend(ids.iter().map(|id| Value::Integer(*id)));
            params.push(Value::Integer(ids.len() as i64));
        }

        if let Some(coming_soon) = self.coming_soon {
            clauses.push("items.coming_soon = ?".to_string());
            params.push(Value::Integer(i64::from(coming_soon)));
        }
        if let Some((op, date)) = self.release_date {
            clauses.push(format!("items.release_date {} ?", op.as_sql()));
            params.push(Value::Text(date.format("%Y-%m-%d").to_string()));
        }
        if let Some((op, rating)) = self.rating {
            clauses.push(format!("items.rating {} ?", op.as_sql()));
            params.push(Value::Integer(i64::from(rating)));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // Newest releases first unless told otherwise; id keeps pages stable
        let mut order: Vec<String> = if self.order_by.is_empty() {
            vec![OrderTerm {
                expr: SortExpr::Column(SortColumn::ReleaseDate),
                direction: Direction::Desc,
            }
            .to_sql()]
        } else {
            self.order_by.iter().map(OrderTerm::to_sql).collect()
        };
        order.push("items.id ASC".to_string());
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(i64::from(self.limit)));
        params.push(Value::Integer(i64::from(self.offset)));

        Ok(BuiltQuery { sql, params })
    }
}
