//! Leaf predicates.

use std::cmp::Ordering;

use nufeed_core::source::keep_latest;
use nufeed_core::{Package, PackageSource, Version};

use crate::error::QueryError;
use crate::expr::Expression;

/// Id equality, case-insensitive.
///
/// Executes as an indexed by-id lookup, which is cheaper than filtering a
/// broad candidate set, so it never claims filter priority.
#[derive(Debug, Clone)]
pub struct IdIs {
    id: String,
}

impl IdIs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Expression for IdIs {
    fn execute(&self, source: &dyn PackageSource) -> Result<Vec<Package>, QueryError> {
        Ok(source.list_by_id(&self.id)?)
    }

    fn filter(&self, mut candidates: Vec<Package>) -> Result<Vec<Package>, QueryError> {
        candidates.retain(|p| p.id().eq_ignore_ascii_case(&self.id));
        Ok(candidates)
    }

    fn has_filter_priority(&self) -> bool {
        false
    }
}

/// Comparison operator of a version predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CmpOp {
    fn matches(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Gt => ordering == Ordering::Greater,
        }
    }
}

/// Version comparison against a fixed operand.
///
/// Executing alone means a full source scan, so this node prefers to filter
/// someone else's narrower result.
#[derive(Debug, Clone)]
pub struct VersionMatches {
    op: CmpOp,
    operand: Version,
}

impl VersionMatches {
    pub fn new(op: CmpOp, operand: Version) -> Self {
        Self { op, operand }
    }
}

impl Expression for VersionMatches {
    fn execute(&self, source: &dyn PackageSource) -> Result<Vec<Package>, QueryError> {
        self.filter(source.list_all()?)
    }

    fn filter(&self, mut candidates: Vec<Package>) -> Result<Vec<Package>, QueryError> {
        candidates.retain(|p| self.op.matches(p.version().cmp(&self.operand)));
        Ok(candidates)
    }

    fn has_filter_priority(&self) -> bool {
        true
    }
}

/// Keeps only the highest version per id.
///
/// Like id equality, the source can answer this directly, so executing is
/// the cheap path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latest;

impl Expression for Latest {
    fn execute(&self, source: &dyn PackageSource) -> Result<Vec<Package>, QueryError> {
        Ok(source.list_latest_all()?)
    }

    fn filter(&self, candidates: Vec<Package>) -> Result<Vec<Package>, QueryError> {
        Ok(keep_latest(candidates))
    }

    fn has_filter_priority(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{packages, RecordingSource};

    #[test]
    fn id_is_matches_case_insensitively() {
        let source = RecordingSource::new(packages(&[("NUnit", "1.0"), ("Other", "1.0")]));
        let hits = IdIs::new("nunit").execute(&source).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "NUnit");

        let filtered = IdIs::new("NUNIT")
            .filter(packages(&[("NUnit", "1.0"), ("Other", "1.0")]))
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn version_comparisons_follow_the_operator() {
        let candidates = packages(&[("A", "1.0"), ("A", "2.0"), ("A", "3.0")]);
        let two: Version = "2.0".parse().unwrap();

        let count = |op: CmpOp| {
            VersionMatches::new(op, two.clone())
                .filter(candidates.clone())
                .unwrap()
                .len()
        };
        assert_eq!(count(CmpOp::Lt), 1);
        assert_eq!(count(CmpOp::Le), 2);
        assert_eq!(count(CmpOp::Eq), 1);
        assert_eq!(count(CmpOp::Ne), 2);
        assert_eq!(count(CmpOp::Ge), 2);
        assert_eq!(count(CmpOp::Gt), 1);
    }

    #[test]
    fn latest_reduces_to_one_package_per_id() {
        let source = RecordingSource::new(packages(&[
            ("A", "1.0"),
            ("A", "2.0"),
            ("B", "1.0"),
        ]));
        let hits = Latest.execute(&source).unwrap();
        assert_eq!(hits.len(), 2);

        let filtered = Latest
            .filter(packages(&[("A", "1.0"), ("A", "2.0")]))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].version(), &"2.0".parse().unwrap());
    }
}
