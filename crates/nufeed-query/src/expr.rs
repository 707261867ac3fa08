//! The expression capability and boolean composition.

use std::collections::HashSet;
use std::fmt;

use nufeed_core::{Package, PackageSource};

use crate::error::QueryError;

/// One node of a predicate tree.
///
/// Every node can run against a source (`execute`) or prune an already
/// materialized collection (`filter`). `has_filter_priority` is the cost
/// signal: true means this node's `execute` amounts to a full source scan,
/// so filtering someone else's result is the cheaper plan.
pub trait Expression: Send + Sync + fmt::Debug {
    /// Evaluates against a source and returns the matching packages.
    fn execute(&self, source: &dyn PackageSource) -> Result<Vec<Package>, QueryError>;

    /// Applies this node's predicate to candidates without touching the
    /// source.
    fn filter(&self, candidates: Vec<Package>) -> Result<Vec<Package>, QueryError>;

    /// Whether filtering a candidate set is cheaper than executing this node
    /// against the source.
    fn has_filter_priority(&self) -> bool;
}

/// Boolean AND over two child expressions.
///
/// Evaluation is cost-driven: when exactly one child prefers filtering, the
/// other child runs against the source and the filtering child prunes its
/// result, avoiding one full scan. Otherwise both children execute and the
/// result sets intersect under package equality.
#[derive(Debug)]
pub struct And {
    left: Box<dyn Expression>,
    right: Box<dyn Expression>,
}

impl And {
    pub fn new(left: impl Expression + 'static, right: impl Expression + 'static) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl Expression for And {
    fn execute(&self, source: &dyn PackageSource) -> Result<Vec<Package>, QueryError> {
        match (
            self.left.has_filter_priority(),
            self.right.has_filter_priority(),
        ) {
            (true, false) => self.left.filter(self.right.execute(source)?),
            (false, true) => self.right.filter(self.left.execute(source)?),
            _ => Ok(intersect(
                self.left.execute(source)?,
                self.right.execute(source)?,
            )),
        }
    }

    /// AND is only composed at the root of the current grammar; running it in
    /// filter position is a fixed limitation.
    fn filter(&self, _candidates: Vec<Package>) -> Result<Vec<Package>, QueryError> {
        Err(QueryError::UnsupportedFilter("and"))
    }

    /// Never claims filter priority: its own `filter` is unsupported, so a
    /// parent must not route candidates into it.
    fn has_filter_priority(&self) -> bool {
        false
    }
}

/// Order-independent intersection under the package equality contract;
/// duplicates collapse.
fn intersect(left: Vec<Package>, right: Vec<Package>) -> Vec<Package> {
    let keep: HashSet<Package> = right.into_iter().collect();
    let mut seen = HashSet::new();
    left.into_iter()
        .filter(|package| keep.contains(package) && seen.insert(package.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::{CmpOp, IdIs, VersionMatches};
    use crate::test_support::{packages, RecordingSource};

    #[test]
    fn and_prefers_filtering_over_a_second_scan() {
        let source = RecordingSource::new(packages(&[("A", "1.0"), ("A", "2.0"), ("B", "1.0")]));

        let expr = And::new(
            IdIs::new("A"),
            VersionMatches::new(CmpOp::Gt, "1.0".parse().unwrap()),
        );
        let result = expr.execute(&source).unwrap();

        let hits: Vec<_> = result.iter().map(|p| format!("{p}")).collect();
        assert_eq!(hits, ["A:2.0"]);
        // The id lookup ran against the source; the version predicate only
        // filtered its result.
        assert_eq!(source.list_by_id_calls(), 1);
        assert_eq!(source.list_all_calls(), 0);
    }

    #[test]
    fn and_results_do_not_depend_on_child_order() {
        let source = RecordingSource::new(packages(&[("A", "1.0"), ("A", "2.0"), ("B", "1.0")]));

        let left_first = And::new(
            IdIs::new("A"),
            VersionMatches::new(CmpOp::Gt, "1.0".parse().unwrap()),
        )
        .execute(&source)
        .unwrap();
        let right_first = And::new(
            VersionMatches::new(CmpOp::Gt, "1.0".parse().unwrap()),
            IdIs::new("A"),
        )
        .execute(&source)
        .unwrap();

        assert_eq!(left_first, right_first);
        assert_eq!(left_first.len(), 1);
    }

    #[test]
    fn and_intersects_when_neither_child_prefers_filtering() {
        let source = RecordingSource::new(packages(&[("A", "1.0"), ("A", "2.0"), ("B", "1.0")]));

        let expr = And::new(IdIs::new("A"), IdIs::new("a"));
        let result = expr.execute(&source).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(source.list_by_id_calls(), 2);

        let disjoint = And::new(IdIs::new("A"), IdIs::new("B"));
        assert!(disjoint.execute(&source).unwrap().is_empty());
    }

    #[test]
    fn and_intersects_when_both_children_prefer_filtering() {
        let source = RecordingSource::new(packages(&[("A", "1.0"), ("A", "2.0"), ("A", "3.0")]));

        let expr = And::new(
            VersionMatches::new(CmpOp::Gt, "1.0".parse().unwrap()),
            VersionMatches::new(CmpOp::Lt, "3.0".parse().unwrap()),
        );
        let result = expr.execute(&source).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].version(), &"2.0".parse().unwrap());
        assert_eq!(source.list_all_calls(), 2);
    }

    #[test]
    fn and_refuses_filter_position() {
        let expr = And::new(IdIs::new("A"), IdIs::new("B"));
        assert!(matches!(
            expr.filter(Vec::new()),
            Err(QueryError::UnsupportedFilter("and"))
        ));
        assert!(!expr.has_filter_priority());
    }
}
