//! Partition of layer indices into contiguous groups.
//!
//! A boundary list `[s0, s1, ..., sk]` describes `k` half-open groups
//! `[s_i, s_{i+1})`. The union of the groups must be exactly
//! `0..num_layers`. A pair with `s_i >= s_{i+1}` yields an empty group and an
//! index claimed by two groups belongs to the later one; both are accepted
//! with a warning.

use std::ops::Range;

use crate::error::ConfigurationError;

/// Validated boundary list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPartition {
    boundaries: Vec<usize>,
    num_layers: usize,
}

impl LayerPartition {
    /// Checks that `boundaries` covers `0..num_layers` without gaps.
    pub fn new(boundaries: &[usize], num_layers: usize) -> Result<Self, ConfigurationError> {
        // `num_layers = 0` with `[0]` is a well-formed empty pass-through
        // network. It is still refused: nothing downstream has a first or
        // last layer to wire.
        if num_layers == 0 {
            return Err(ConfigurationError::invalid(
                "num_layers",
                "must be greater than zero",
            ));
        }

        let mut intervals = Vec::with_capacity(boundaries.len().saturating_sub(1));
        for (group, window) in boundaries.windows(2).enumerate() {
            let (start, end) = (window[0], window[1]);
            if start >= end {
                log::warn!(
                    "layers_slice group {group} is empty ({start}..{end}); no layers assigned"
                );
                continue;
            }
            intervals.push((start, end));
        }

        let claimed = intervals
            .iter()
            .fold(0usize, |total, (start, end)| total.saturating_add(end - start));
        let (covered, first, last) = union_extent(&mut intervals);

        if covered != num_layers {
            return Err(ConfigurationError::LayerCoverage {
                covered,
                expected: num_layers,
            });
        }
        if claimed > covered {
            log::warn!(
                "layers_slice groups overlap on {} indices; later groups take precedence",
                claimed - covered
            );
        }

        if first != 0 || last + 1 != num_layers {
            return Err(ConfigurationError::LayerRange {
                first,
                last,
                expected: num_layers,
            });
        }

        Ok(Self {
            boundaries: boundaries.to_vec(),
            num_layers,
        })
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Number of groups, including empty ones.
    pub fn num_groups(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Total number of distinct layers.
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Lowest layer index.
    pub fn first(&self) -> usize {
        0
    }

    /// Highest layer index.
    pub fn last(&self) -> usize {
        self.num_layers - 1
    }

    /// Groups in declaration order as `(group, index range)`.
    pub fn groups(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        self.boundaries
            .windows(2)
            .enumerate()
            .map(|(group, window)| (group, window[0]..window[1]))
    }

    /// Group owning `index`; the last matching group wins on overlap.
    pub fn group_of(&self, index: usize) -> Option<usize> {
        self.groups()
            .filter(|(_, range)| range.contains(&index))
            .map(|(group, _)| group)
            .last()
    }
}

/// Size, lowest and highest index of the union of non-empty half-open
/// intervals. Works on the bounds only, so huge bounds cost nothing.
fn union_extent(intervals: &mut [(usize, usize)]) -> (usize, usize, usize) {
    intervals.sort_unstable();
    let mut covered = 0usize;
    let mut current: Option<(usize, usize)> = None;
    for &(start, end) in intervals.iter() {
        current = match current {
            Some((run_start, run_end)) if start <= run_end => Some((run_start, run_end.max(end))),
            Some((run_start, run_end)) => {
                covered = covered.saturating_add(run_end - run_start);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((run_start, run_end)) = current {
        covered = covered.saturating_add(run_end - run_start);
    }
    let first = intervals.first().map(|(start, _)| *start).unwrap_or_default();
    let last = intervals
        .iter()
        .map(|(_, end)| end - 1)
        .max()
        .unwrap_or_default();
    (covered, first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_partition() -> Result<(), ConfigurationError> {
        let partition = LayerPartition::new(&[0, 2, 5], 5)?;
        assert_eq!(partition.num_groups(), 2);
        assert_eq!(partition.first(), 0);
        assert_eq!(partition.last(), 4);
        let groups: Vec<_> = partition.groups().collect();
        assert_eq!(groups, vec![(0, 0..2), (1, 2..5)]);
        assert_eq!(partition.group_of(1), Some(0));
        assert_eq!(partition.group_of(2), Some(1));
        assert_eq!(partition.group_of(5), None);
        Ok(())
    }

    #[test]
    fn rejects_missing_layers() {
        let err = LayerPartition::new(&[0, 2, 4], 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LayerCoverage {
                covered: 4,
                expected: 5
            }
        ));
    }

    #[test]
    fn rejects_extra_layers() {
        let err = LayerPartition::new(&[0, 3, 7], 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LayerCoverage {
                covered: 7,
                expected: 5
            }
        ));
    }

    #[test]
    fn rejects_shifted_range_with_matching_count() {
        let err = LayerPartition::new(&[1, 3, 6], 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LayerRange {
                first: 1,
                last: 5,
                expected: 5
            }
        ));
    }

    #[test]
    fn tolerates_empty_group() -> Result<(), ConfigurationError> {
        let partition = LayerPartition::new(&[0, 3, 3, 5], 5)?;
        assert_eq!(partition.num_groups(), 3);
        assert_eq!(partition.group_of(3), Some(2));
        Ok(())
    }

    #[test]
    fn overlapping_index_belongs_to_later_group() -> Result<(), ConfigurationError> {
        let partition = LayerPartition::new(&[0, 3, 2, 5], 5)?;
        assert_eq!(partition.group_of(2), Some(2));
        assert_eq!(partition.group_of(1), Some(0));
        Ok(())
    }

    #[test]
    fn huge_bound_fails_without_enumerating_indices() {
        let started = std::time::Instant::now();
        let err = LayerPartition::new(&[0, usize::MAX / 2], 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LayerCoverage { expected: 5, .. }
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let err = LayerPartition::new(&[0, 2, 5_000_000_000, 3], 5).unwrap_err();
        assert!(matches!(err, ConfigurationError::LayerCoverage { .. }));
    }

    #[test]
    fn union_extent_merges_overlaps_and_keeps_gaps() {
        let mut intervals = vec![(5, 7), (0, 2), (4, 6)];
        assert_eq!(union_extent(&mut intervals), (5, 0, 6));

        let mut nested = vec![(0, 10), (2, 3)];
        assert_eq!(union_extent(&mut nested), (10, 0, 9));
    }

    #[test]
    fn rejects_zero_layers_and_degenerate_lists() {
        assert!(matches!(
            LayerPartition::new(&[0], 0),
            Err(ConfigurationError::Invalid { .. })
        ));
        assert!(matches!(
            LayerPartition::new(&[0], 3),
            Err(ConfigurationError::LayerCoverage { covered: 0, .. })
        ));
    }
}
