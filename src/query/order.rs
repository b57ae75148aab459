//! Ordering tokens for item queries
//!
//! Everything that ends up in an `ORDER BY` clause is built from the enums in
//! this module, never from caller text.

use crate::query::QueryError;
use std::fmt;

/// Sortable item columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Name,
    Price,
    ReleaseDate,
    OwnerCount,
    PositiveReviews,
    NegativeReviews,
    Rating,
}

impl SortColumn {
    pub fn from_token(token: &str) -> Result<Self, QueryError> {
        match token {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "release_date" => Ok(Self::ReleaseDate),
            "owner_count" => Ok(Self::OwnerCount),
            "positive_reviews" => Ok(Self::PositiveReviews),
            "negative_reviews" => Ok(Self::NegativeReviews),
            "rating" => Ok(Self::Rating),
            other => Err(QueryError::UnknownColumn(other.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Id => "items.id",
            Self::Name => "items.name",
            Self::Price => "items.price",
            Self::ReleaseDate => "items.release_date",
            Self::OwnerCount => "items.owner_count",
            Self::PositiveReviews => "items.positive_reviews",
            Self::NegativeReviews => "items.negative_reviews",
            Self::Rating => "items.rating",
        }
    }
}

/// Arithmetic between two columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }
}

/// A column, or exactly two columns combined with one operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortExpr {
    Column(SortColumn),
    Binary {
        left: SortColumn,
        op: ArithOp,
        right: SortColumn,
    },
}

impl SortExpr {
    /// Parses `column` or `column<op>column`
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        let token = token.trim();
        let Some((position, op)) = token
            .char_indices()
            .find_map(|(i, c)| ArithOp::from_char(c).map(|op| (i, op)))
        else {
            return Ok(Self::Column(SortColumn::from_token(token)?));
        };

        let left = SortColumn::from_token(token[..position].trim())?;
        let right = SortColumn::from_token(token[position + 1..].trim())?;
        Ok(Self::Binary { left, op, right })
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::Column(column) => column.as_sql().to_string(),
            Self::Binary { left, op, right } => match op {
                ArithOp::Add => format!("({} + {})", left.as_sql(), right.as_sql()),
                ArithOp::Sub => format!("({} - {})", left.as_sql(), right.as_sql()),
                ArithOp::Mul => format!("({} * {})", left.as_sql(), right.as_sql()),
                // Real division; NULL instead of a division by zero
                ArithOp::Div => format!(
                    "(CAST({} AS REAL) / NULLIF({}, 0))",
                    left.as_sql(),
                    right.as_sql()
                ),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn from_token(token: &str) -> Result<Self, QueryError> {
        match token {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(QueryError::UnknownDirection(other.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// One `expr:direction` entry of an ordering list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub expr: SortExpr,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        let (expr, direction) = match token.rsplit_once(':') {
            Some((expr, direction)) => (expr, Direction::from_token(direction.trim())?),
            None => (token, Direction::default()),
        };
        Ok(Self {
            expr: SortExpr::parse(expr)?,
            direction,
        })
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.expr.to_sql(), self.direction)
    }
}

/// Parses a comma separated ordering list
pub fn parse_order_list(value: &str) -> Result<Vec<OrderTerm>, QueryError> {
    value
        .split(',')
        .filter(|term| !term.trim().is_empty())
        .map(OrderTerm::parse)
        .collect()
}
