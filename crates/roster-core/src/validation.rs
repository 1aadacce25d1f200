//! Argument validation helpers shared by the services.

use crate::error::{Error, Result};

/// Reject `value` when it exceeds `limit` characters. `None` limit means
/// unbounded.
pub(crate) fn max_length(value: Option<&str>, name: &str, limit: Option<usize>) -> Result<()> {
    if let (Some(value), Some(limit)) = (value, limit) {
        if value.chars().count() > limit {
            return Err(Error::IllegalArgument(format!(
                "the length of \"{name}\" must be less than or equal to {limit}"
            )));
        }
    }
    Ok(())
}

/// A user cannot hold a relationship with themselves.
pub(crate) fn not_self_relation(requester_id: i64, recipient_id: i64) -> Result<()> {
    if requester_id == recipient_id {
        return Err(Error::IllegalArgument(
            "the requester ID must not equal the recipient ID".to_string(),
        ));
    }
    Ok(())
}

/// Reject a date lying in the future.
pub(crate) fn past_or_present(date: Option<i64>, name: &str, now: i64) -> Result<()> {
    if let Some(date) = date {
        if date > now {
            return Err(Error::IllegalArgument(format!(
                "\"{name}\" must be a date in the past or present"
            )));
        }
    }
    Ok(())
}

/// Reject an empty key set.
pub(crate) fn not_empty<T>(values: &[T], name: &str) -> Result<()> {
    if values.is_empty() {
        return Err(Error::IllegalArgument(format!("\"{name}\" must not be empty")));
    }
    Ok(())
}

/// Group indexes are 31-bit non-negative integers.
pub(crate) fn valid_group_index(index: i32) -> Result<()> {
    if index < 0 {
        return Err(Error::IllegalArgument(
            "the group index must be a non-negative integer".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_length() {
        assert!(max_length(Some("abc"), "content", Some(3)).is_ok());
        assert!(max_length(Some("abcd"), "content", Some(3)).is_err());
        assert!(max_length(Some("abcd"), "content", None).is_ok());
        assert!(max_length(None, "content", Some(1)).is_ok());
    }

    #[test]
    fn test_not_self_relation() {
        assert!(not_self_relation(1, 2).is_ok());
        assert!(not_self_relation(7, 7).is_err());
    }

    #[test]
    fn test_past_or_present() {
        assert!(past_or_present(Some(100), "date", 100).is_ok());
        assert!(past_or_present(Some(101), "date", 100).is_err());
        assert!(past_or_present(None, "date", 100).is_ok());
    }
}
