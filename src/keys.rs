//! Record keys and numeric argument checks

use crate::error::{CrudError, CrudResult};
use crate::types::CellValue;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of fresh record keys.
///
/// No collision check against stored keys is made; generators must draw
/// from a space large enough that collisions do not happen in practice.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 keys
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeys;

impl KeyGenerator for UuidKeys {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix1`, `prefix2`, ... keys for tests and fixtures
#[derive(Debug)]
pub struct SequentialKeys {
    prefix: String,
    next: AtomicU64,
}

impl SequentialKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl KeyGenerator for SequentialKeys {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}

/// True when the value is an integral number, or text that parses as one
pub fn is_int(value: &CellValue) -> bool {
    let number = match value {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return false,
        },
        _ => return false,
    };
    number.is_finite() && number.fract() == 0.0
}

/// Validate a row count argument: a non-negative integer
pub fn row_count(value: &CellValue) -> CrudResult<usize> {
    if !is_int(value) {
        return Err(CrudError::invalid(format!(
            "row count must be an integer, got {} '{}'",
            value.type_name(),
            value
        )));
    }
    let n = match value {
        CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(-1.0),
        other => other.as_number().unwrap_or(-1.0),
    };
    if n < 0.0 {
        return Err(CrudError::invalid(format!(
            "row count must not be negative, got {}",
            n
        )));
    }
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_keys_are_unique() {
        let keys: HashSet<String> = (0..100).map(|_| UuidKeys.generate()).collect();
        assert_eq!(keys.len(), 100);
        assert!(keys.iter().all(|k| k.len() == 36));
    }

    #[test]
    fn test_sequential_keys() {
        let keys = SequentialKeys::new("k");
        assert_eq!(keys.generate(), "k1");
        assert_eq!(keys.generate(), "k2");
    }

    #[test]
    fn test_is_int() {
        assert!(is_int(&CellValue::Number(2.0)));
        assert!(is_int(&CellValue::from("2")));
        assert!(is_int(&CellValue::from(" 10 ")));
        assert!(!is_int(&CellValue::Number(2.5)));
        assert!(!is_int(&CellValue::Number(f64::NAN)));
        assert!(!is_int(&CellValue::from("two")));
        assert!(!is_int(&CellValue::from("")));
        assert!(!is_int(&CellValue::Bool(true)));
        assert!(!is_int(&CellValue::Empty));
    }

    #[test]
    fn test_row_count() {
        assert_eq!(row_count(&CellValue::from("3")).unwrap(), 3);
        assert_eq!(row_count(&CellValue::Number(0.0)).unwrap(), 0);
        assert!(matches!(
            row_count(&CellValue::Number(-1.0)),
            Err(CrudError::InvalidArgument(_))
        ));
        assert!(matches!(
            row_count(&CellValue::Number(1.5)),
            Err(CrudError::InvalidArgument(_))
        ));
    }
}
