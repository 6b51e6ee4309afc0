use std::fmt;
use std::str::FromStr;

use super::error::{RecordError, RecordResult};

/// Bytes per stored character (one UTF-16 code unit)
pub const CHAR_WIDTH: usize = 2;

/// Represents a column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,            // 4 bytes
    Float,          // 4 bytes
    Char(usize),    // n characters, space padded
    Varchar(usize), // 4-byte length + up to n characters
}

impl DataType {
    /// Largest number of bytes a value of this type occupies in a slot
    pub fn max_encoded_size(&self) -> usize {
        match self {
            DataType::Int | DataType::Float => 4,
            DataType::Char(n) => n * CHAR_WIDTH,
            DataType::Varchar(n) => 4 + n * CHAR_WIDTH,
        }
    }

    /// Convert a literal to a value of this type, `None` if it doesn't parse
    pub fn parse_literal(&self, literal: &str) -> Option<Value> {
        match self {
            DataType::Int => literal.trim().parse().ok().map(Value::Int),
            DataType::Float => literal.trim().parse().ok().map(Value::Float),
            DataType::Char(_) | DataType::Varchar(_) => Some(Value::Text(literal.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
        }
    }
}

/// Parses `INT`, `FLOAT`, `CHAR(n)` and `VARCHAR(n)`, ignoring case
impl FromStr for DataType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_uppercase();
        match text.as_str() {
            "INT" | "INTEGER" => return Ok(DataType::Int),
            "FLOAT" | "REAL" => return Ok(DataType::Float),
            _ => {}
        }

        let unknown = || RecordError::UnknownType(s.to_string());
        let (kind, rest) = text.split_once('(').ok_or_else(unknown)?;
        let length: usize = rest
            .strip_suffix(')')
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(unknown)?;
        match kind.trim() {
            "CHAR" => Ok(DataType::Char(length)),
            "VARCHAR" => Ok(DataType::Varchar(length)),
            _ => Err(unknown()),
        }
    }
}

/// Represents a single column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Text(String),
}

impl Value {
    /// Check whether this value can be stored in a column of `data_type`
    pub fn matches(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Int(_), DataType::Int)
                | (Value::Float(_), DataType::Float)
                | (Value::Text(_), DataType::Char(_) | DataType::Varchar(_))
        )
    }

    /// Get the text of a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Length in stored characters, for text values
    pub fn char_len(&self) -> Option<usize> {
        self.as_text().map(|s| s.encode_utf16().count())
    }

    /// Encode this value at `offset` as `data_type`, returning the offset
    /// just past the written bytes.
    ///
    /// CHAR values are truncated or space padded to their width; VARCHAR
    /// values are written with their actual length.
    pub fn encode(&self, data_type: &DataType, buf: &mut [u8], offset: usize) -> RecordResult<usize> {
        match (self, data_type) {
            (Value::Int(i), DataType::Int) => {
                let end = check_bounds(buf.len(), offset, 4)?;
                buf[offset..end].copy_from_slice(&i.to_be_bytes());
                Ok(end)
            }
            (Value::Float(f), DataType::Float) => {
                let end = check_bounds(buf.len(), offset, 4)?;
                buf[offset..end].copy_from_slice(&f.to_be_bytes());
                Ok(end)
            }
            (Value::Text(s), DataType::Char(n)) => {
                let end = check_bounds(buf.len(), offset, n * CHAR_WIDTH)?;
                // Truncate on a character boundary so no surrogate pair is split
                let mut width = 0;
                let kept = s.chars().take_while(|c| {
                    width += c.len_utf16();
                    width <= *n
                });
                let units = kept
                    .flat_map(|c| {
                        let mut pair = [0u16; 2];
                        let len = c.encode_utf16(&mut pair).len();
                        pair.into_iter().take(len)
                    })
                    .chain(std::iter::repeat(u16::from(b' ')));
                for (chunk, unit) in buf[offset..end].chunks_exact_mut(CHAR_WIDTH).zip(units) {
                    chunk.copy_from_slice(&unit.to_be_bytes());
                }
                Ok(end)
            }
            (Value::Text(s), DataType::Varchar(_)) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                let end = check_bounds(buf.len(), offset, 4 + units.len() * CHAR_WIDTH)?;
                buf[offset..offset + 4].copy_from_slice(&(units.len() as i32).to_be_bytes());
                for (chunk, unit) in buf[offset + 4..end]
                    .chunks_exact_mut(CHAR_WIDTH)
                    .zip(units)
                {
                    chunk.copy_from_slice(&unit.to_be_bytes());
                }
                Ok(end)
            }
            _ => Err(RecordError::TypeMismatch {
                expected: data_type.to_string(),
                actual: format!("{:?}", self),
            }),
        }
    }

    /// Decode a value of `data_type` at `offset`, returning it with the
    /// offset just past the consumed bytes
    pub fn decode(data_type: &DataType, buf: &[u8], offset: usize) -> RecordResult<(Self, usize)> {
        match data_type {
            DataType::Int => {
                let end = check_bounds(buf.len(), offset, 4)?;
                let value = i32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
                Ok((Value::Int(value), end))
            }
            DataType::Float => {
                let end = check_bounds(buf.len(), offset, 4)?;
                let value = f32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
                Ok((Value::Float(value), end))
            }
            DataType::Char(n) => {
                let end = check_bounds(buf.len(), offset, n * CHAR_WIDTH)?;
                let text = decode_units(&buf[offset..end]);
                Ok((Value::Text(text.trim_end_matches(' ').to_string()), end))
            }
            DataType::Varchar(n) => {
                let start = check_bounds(buf.len(), offset, 4)?;
                let len = i32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
                if len < 0 || len as usize > *n {
                    return Err(RecordError::Deserialization(format!(
                        "VARCHAR({}) length prefix {} at offset {}",
                        n, len, offset
                    )));
                }
                let end = check_bounds(buf.len(), start, len as usize * CHAR_WIDTH)?;
                Ok((Value::Text(decode_units(&buf[start..end])), end))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

fn check_bounds(buf_len: usize, offset: usize, size: usize) -> RecordResult<usize> {
    let end = offset + size;
    if end > buf_len {
        return Err(RecordError::Deserialization(format!(
            "{} bytes at offset {} exceed buffer of {} bytes",
            size, offset, buf_len
        )));
    }
    Ok(end)
}

fn decode_units(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(CHAR_WIDTH)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_encoded_size() {
        assert_eq!(DataType::Int.max_encoded_size(), 4);
        assert_eq!(DataType::Float.max_encoded_size(), 4);
        assert_eq!(DataType::Char(10).max_encoded_size(), 20);
        assert_eq!(DataType::Varchar(10).max_encoded_size(), 24);
    }

    #[test]
    fn test_int_and_float_layout() {
        let mut buf = [0u8; 8];
        assert_eq!(Value::Int(258).encode(&DataType::Int, &mut buf, 0).unwrap(), 4);
        assert_eq!(&buf[..4], &[0, 0, 1, 2]);
        assert_eq!(Value::Float(1.5).encode(&DataType::Float, &mut buf, 4).unwrap(), 8);

        assert_eq!(Value::decode(&DataType::Int, &buf, 0).unwrap(), (Value::Int(258), 4));
        assert_eq!(Value::decode(&DataType::Float, &buf, 4).unwrap(), (Value::Float(1.5), 8));
    }

    #[test]
    fn test_char_pads_and_trims() {
        let dt = DataType::Char(5);
        let mut buf = [0u8; 10];
        let end = Value::Text("ab".to_string()).encode(&dt, &mut buf, 0).unwrap();
        assert_eq!(end, 10);
        assert_eq!(&buf, &[0, b'a', 0, b'b', 0, b' ', 0, b' ', 0, b' ']);

        let (value, end) = Value::decode(&dt, &buf, 0).unwrap();
        assert_eq!(value, Value::Text("ab".to_string()));
        assert_eq!(end, 10);
    }

    #[test]
    fn test_char_truncates() {
        let dt = DataType::Char(3);
        let mut buf = [0u8; 6];
        Value::Text("abcdef".to_string()).encode(&dt, &mut buf, 0).unwrap();
        let (value, _) = Value::decode(&dt, &buf, 0).unwrap();
        assert_eq!(value, Value::Text("abc".to_string()));
    }

    #[test]
    fn test_char_truncation_keeps_surrogate_pairs() {
        let dt = DataType::Char(3);
        let mut buf = [0u8; 6];
        // "ab" then a character outside the BMP, two units wide
        Value::Text("ab\u{1F600}".to_string()).encode(&dt, &mut buf, 0).unwrap();
        assert_eq!(&buf[4..], &[0, b' ']);
        let (value, _) = Value::decode(&dt, &buf, 0).unwrap();
        assert_eq!(value, Value::Text("ab".to_string()));

        let mut buf = [0u8; 8];
        Value::Text("a\u{1F600}b".to_string()).encode(&DataType::Char(4), &mut buf, 0).unwrap();
        let (value, _) = Value::decode(&DataType::Char(4), &buf, 0).unwrap();
        assert_eq!(value, Value::Text("a\u{1F600}b".to_string()));
    }

    #[test]
    fn test_varchar_keeps_exact_length() {
        let dt = DataType::Varchar(10);
        let mut buf = [0u8; 24];
        let end = Value::Text("hé ".to_string()).encode(&dt, &mut buf, 0).unwrap();
        assert_eq!(end, 4 + 3 * CHAR_WIDTH);
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);

        let (value, end) = Value::decode(&dt, &buf, 0).unwrap();
        assert_eq!(value, Value::Text("hé ".to_string()));
        assert_eq!(end, 10);
    }

    #[test]
    fn test_varchar_corrupt_length() {
        let dt = DataType::Varchar(4);
        let mut buf = [0u8; 20];
        buf[..4].copy_from_slice(&9i32.to_be_bytes());
        assert!(matches!(
            Value::decode(&dt, &buf, 0),
            Err(RecordError::Deserialization(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let mut buf = [0u8; 8];
        let result = Value::Int(42).encode(&DataType::Float, &mut buf, 0);
        assert!(matches!(result, Err(RecordError::TypeMismatch { .. })));
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 3];
        assert!(Value::Int(1).encode(&DataType::Int, &mut buf, 0).is_err());
        assert!(Value::decode(&DataType::Char(2), &buf, 0).is_err());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(DataType::Int.parse_literal(" 15 "), Some(Value::Int(15)));
        assert_eq!(DataType::Int.parse_literal("1.5"), None);
        assert_eq!(DataType::Float.parse_literal("2.5"), Some(Value::Float(2.5)));
        assert_eq!(DataType::Float.parse_literal("abc"), None);
        assert_eq!(
            DataType::Varchar(4).parse_literal("Toto"),
            Some(Value::Text("Toto".to_string()))
        );
    }

    #[test]
    fn test_matches() {
        assert!(Value::Int(1).matches(&DataType::Int));
        assert!(Value::Text("a".to_string()).matches(&DataType::Char(1)));
        assert!(Value::Text("a".to_string()).matches(&DataType::Varchar(1)));
        assert!(!Value::Float(1.0).matches(&DataType::Int));
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Int);
        assert_eq!("float".parse::<DataType>().unwrap(), DataType::Float);
        assert_eq!("CHAR(5)".parse::<DataType>().unwrap(), DataType::Char(5));
        assert_eq!(" varchar( 12 ) ".parse::<DataType>().unwrap(), DataType::Varchar(12));
        assert_eq!(
            DataType::Varchar(20).to_string().parse::<DataType>().unwrap(),
            DataType::Varchar(20)
        );
        assert!(matches!("TEXT".parse::<DataType>(), Err(RecordError::UnknownType(_))));
        assert!("VARCHAR(x)".parse::<DataType>().is_err());
        assert!("BLOB(3)".parse::<DataType>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Varchar(20).to_string(), "VARCHAR(20)");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("x".to_string()).to_string(), "x");
    }
}
