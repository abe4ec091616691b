use super::{StoreError, StoreOp};

/// Split a path into segments. Leading and trailing slashes are ignored;
/// an empty path addresses the root. Empty inner segments are rejected.
pub fn segments(op: StoreOp, path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segs: Vec<&str> = trimmed.split('/').collect();
    if segs.iter().any(|s| s.is_empty() || s.trim() != *s) {
        return Err(StoreError::new(op, path, "invalid path segment"));
    }
    Ok(segs)
}

pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// True if one path is an ancestor of (or equal to) the other.
pub fn related(a: &[&str], b: &[&str]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_normalizes() {
        assert_eq!(segments(StoreOp::Read, "/bookings/b1/").unwrap(), vec!["bookings", "b1"]);
        assert!(segments(StoreOp::Read, "").unwrap().is_empty());
        assert!(segments(StoreOp::Read, "/").unwrap().is_empty());
    }

    #[test]
    fn rejects_empty_segments() {
        let err = segments(StoreOp::Write, "bookings//guests").unwrap_err();
        assert_eq!(err.operation, StoreOp::Write);
        assert!(segments(StoreOp::Write, "bookings/ /x").is_err());
    }

    #[test]
    fn relation_is_prefix_either_way() {
        assert!(related(&["bookings"], &["bookings", "b1", "guests"]));
        assert!(related(&["bookings", "b1", "guests"], &["bookings"]));
        assert!(related(&[], &["bookings"]));
        assert!(!related(&["bookings", "b1"], &["bookings", "b2"]));
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("", "x"), "x");
        assert_eq!(join("bookings/", "b1"), "bookings/b1");
    }
}
