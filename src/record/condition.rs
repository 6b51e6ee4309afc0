use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{RecordError, RecordResult};
use super::record::Record;
use super::schema::TableSchema;
use super::value::Value;

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl CompareOp {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
        }
    }
}

impl FromStr for CompareOp {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(CompareOp::Eq),
            "<>" | "!=" => Ok(CompareOp::NotEq),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::GtEq),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::LtEq),
            other => Err(RecordError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
        };
        write!(f, "{}", symbol)
    }
}

/// `column <op> literal`, with the literal converted to the column's type
/// at evaluation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: usize,
    pub op: CompareOp,
    pub literal: String,
}

impl Condition {
    pub fn new(column: usize, op: CompareOp, literal: impl Into<String>) -> Self {
        Self {
            column,
            op,
            literal: literal.into(),
        }
    }

    /// Build a condition addressing a column by name
    pub fn by_name(
        schema: &TableSchema,
        column: &str,
        op: CompareOp,
        literal: impl Into<String>,
    ) -> RecordResult<Self> {
        let index = schema
            .find_column(column)
            .ok_or_else(|| RecordError::UnknownColumn(column.to_string()))?;
        Ok(Self::new(index, op, literal))
    }

    /// Evaluate against a record.
    ///
    /// A missing column or a literal that does not convert to the value's
    /// type makes the condition false.
    pub fn evaluate(&self, record: &Record) -> bool {
        let Some(value) = record.get(self.column) else {
            return false;
        };

        let ordering = match value {
            Value::Int(v) => self
                .literal
                .trim()
                .parse::<i32>()
                .ok()
                .map(|lit| v.cmp(&lit)),
            Value::Float(v) => self
                .literal
                .trim()
                .parse::<f32>()
                .ok()
                .and_then(|lit| v.partial_cmp(&lit)),
            Value::Text(s) => Some(s.trim().cmp(self.literal.trim())),
        };

        ordering.is_some_and(|o| self.op.accepts(o))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.column, self.op, self.literal)
    }
}

/// True when every condition holds; an empty list matches everything
pub fn matches_all(conditions: &[Condition], record: &Record) -> bool {
    conditions.iter().all(|c| c.evaluate(record))
}
