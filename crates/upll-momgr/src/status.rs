//! Config-status consolidation.

use upll_types::ConfigStatus;

/// Combines two per-controller statuses into one.
///
/// `INVALID` dominates, then `UNKNOWN`. Two `APPLIED` stay `APPLIED`, two
/// `NOT_SUPPORTED` stay `NOT_SUPPORTED`, and any mix of `NOT_APPLIED` and
/// `NOT_SUPPORTED` is `NOT_APPLIED`. Every other pair is
/// `PARTIALLY_APPLIED`.
///
/// The function is commutative and associative, so folding it over an
/// unordered set of controller rows gives one answer.
pub fn compute_status(a: ConfigStatus, b: ConfigStatus) -> ConfigStatus {
    use ConfigStatus::*;
    match (a, b) {
        (Invalid, _) | (_, Invalid) => Invalid,
        (Unknown, _) | (_, Unknown) => Unknown,
        (Applied, Applied) => Applied,
        (NotSupported, NotSupported) => NotSupported,
        (NotApplied | NotSupported, NotApplied | NotSupported) => NotApplied,
        _ => PartiallyApplied,
    }
}

/// Folds the statuses of every controller row of one key.
///
/// An empty set yields `UNKNOWN`.
pub fn consolidated_status<I>(statuses: I) -> ConfigStatus
where
    I: IntoIterator<Item = ConfigStatus>,
{
    statuses
        .into_iter()
        .reduce(compute_status)
        .unwrap_or(ConfigStatus::Unknown)
}

/// Folds per-attribute statuses index by index. Attributes missing from a
/// shorter row are skipped.
pub fn consolidated_attr_status<'a, I>(rows: I) -> Vec<ConfigStatus>
where
    I: IntoIterator<Item = &'a [ConfigStatus]>,
{
    let mut out: Vec<Option<ConfigStatus>> = Vec::new();
    for attrs in rows {
        if out.len() < attrs.len() {
            out.resize(attrs.len(), None);
        }
        for (slot, s) in out.iter_mut().zip(attrs.iter()) {
            *slot = Some(match slot {
                Some(prev) => compute_status(*prev, *s),
                None => *s,
            });
        }
    }
    out.into_iter()
        .map(|s| s.unwrap_or(ConfigStatus::Unknown))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ConfigStatus::*;

    const ALL: [ConfigStatus; 6] = [
        Applied,
        NotApplied,
        PartiallyApplied,
        Invalid,
        NotSupported,
        Unknown,
    ];

    #[test]
    fn test_invalid_dominates() {
        for x in ALL {
            assert_eq!(compute_status(Invalid, x), Invalid);
            assert_eq!(compute_status(x, Invalid), Invalid);
        }
    }

    #[test]
    fn test_table() {
        assert_eq!(compute_status(Applied, Applied), Applied);
        assert_eq!(compute_status(NotApplied, NotApplied), NotApplied);
        assert_eq!(compute_status(NotApplied, NotSupported), NotApplied);
        assert_eq!(compute_status(NotSupported, NotSupported), NotSupported);
        assert_eq!(compute_status(Applied, NotApplied), PartiallyApplied);
        assert_eq!(compute_status(Applied, NotSupported), PartiallyApplied);
        assert_eq!(compute_status(PartiallyApplied, Applied), PartiallyApplied);
        assert_eq!(compute_status(Unknown, Applied), Unknown);
    }

    #[test]
    fn test_commutative_and_associative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(compute_status(a, b), compute_status(b, a), "{a} {b}");
                for c in ALL {
                    assert_eq!(
                        compute_status(compute_status(a, b), c),
                        compute_status(a, compute_status(b, c)),
                        "{a} {b} {c}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_consolidation() {
        assert_eq!(consolidated_status([]), Unknown);
        assert_eq!(consolidated_status([Applied, Applied, Applied]), Applied);
        assert_eq!(consolidated_status([Applied, NotApplied, Applied]), PartiallyApplied);
        assert_eq!(consolidated_status([NotApplied, NotSupported]), NotApplied);
    }

    #[test]
    fn test_attr_consolidation() {
        let a = [Applied, NotApplied];
        let b = [Applied, Applied, Invalid];
        assert_eq!(
            consolidated_attr_status([&a[..], &b[..]]),
            vec![Applied, PartiallyApplied, Invalid]
        );
    }
}
