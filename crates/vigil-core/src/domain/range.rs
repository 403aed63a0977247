//! MemberRange - コレクション観測の範囲指定
//!
//! # 設計
//! 範囲 → 位置集合の正規化ルールはここに 1 つの純関数として集約します
//! （registration 側と removal 側で別々に実装しない）。
//!
//! # 正規化ルール
//! - 半開区間 `[first, last)`: `last >= 0` なら length = `last - first`
//! - 負の終端は末尾から数える: `last < 0` なら length = `len - first + last`
//!   （つまり `-k` は `len - k` と等価）
//! - 閉区間 `[first, last]` は length に 1 を足す
//! - `Full` は呼び出し時点のコレクション全体 `{0, …, len-1}`
//! - 解決結果が空になる区間は合法（何も観測しない登録になる）

use serde::{Deserialize, Serialize};
use std::ops::{Range, RangeFull, RangeInclusive, RangeTo};

/// Which member positions of a collection an observation applies to.
///
/// Resolution against a concrete length happens at call time, so `Full`
/// tracks the collection extent as of the registration/removal call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRange {
    /// The whole collection at call time.
    Full,

    /// An interval with an optionally negative end (counted from the end of
    /// the collection) and an inclusive/exclusive flag.
    Interval {
        first: usize,
        last: i64,
        inclusive: bool,
    },
}

impl MemberRange {
    /// Resolve this range into concrete member positions for a collection of
    /// `len` elements.
    pub fn resolve(&self, len: usize) -> Vec<usize> {
        match *self {
            MemberRange::Full => (0..len).collect(),
            MemberRange::Interval {
                first,
                last,
                inclusive,
            } => {
                let mut length: i64 = if last >= 0 {
                    last - first as i64
                } else {
                    len as i64 - first as i64 + last
                };
                if inclusive {
                    length += 1;
                }
                if length <= 0 {
                    return Vec::new();
                }
                (first..first + length as usize).collect()
            }
        }
    }
}

impl Default for MemberRange {
    fn default() -> Self {
        MemberRange::Full
    }
}

impl From<RangeFull> for MemberRange {
    fn from(_: RangeFull) -> Self {
        MemberRange::Full
    }
}

impl From<Range<usize>> for MemberRange {
    fn from(r: Range<usize>) -> Self {
        MemberRange::Interval {
            first: r.start,
            last: r.end as i64,
            inclusive: false,
        }
    }
}

impl From<RangeInclusive<usize>> for MemberRange {
    fn from(r: RangeInclusive<usize>) -> Self {
        MemberRange::Interval {
            first: *r.start(),
            last: *r.end() as i64,
            inclusive: true,
        }
    }
}

/// `..-1` style: start at 0, end counted from the end of the collection.
impl From<RangeTo<i64>> for MemberRange {
    fn from(r: RangeTo<i64>) -> Self {
        MemberRange::Interval {
            first: 0,
            last: r.end,
            inclusive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::half_open(MemberRange::from(1..4), 10, vec![1, 2, 3])]
    #[case::inclusive(MemberRange::from(1..=4), 10, vec![1, 2, 3, 4])]
    #[case::full(MemberRange::Full, 4, vec![0, 1, 2, 3])]
    #[case::negative_end(MemberRange::from(..-1), 5, vec![0, 1, 2, 3])]
    #[case::negative_end_with_first(
        MemberRange::Interval { first: 2, last: -1, inclusive: false },
        5,
        vec![2, 3]
    )]
    #[case::negative_end_inclusive(
        MemberRange::Interval { first: 0, last: -1, inclusive: true },
        3,
        vec![0, 1, 2]
    )]
    #[case::empty_half_open(MemberRange::from(3..3), 10, vec![])]
    #[case::degenerate_inclusive(MemberRange::from(3..=3), 10, vec![3])]
    #[case::full_of_empty_collection(MemberRange::Full, 0, vec![])]
    #[case::interval_collapsing_below_zero(
        MemberRange::Interval { first: 4, last: -3, inclusive: false },
        5,
        vec![]
    )]
    fn resolves_to_expected_positions(
        #[case] range: MemberRange,
        #[case] len: usize,
        #[case] expected: Vec<usize>,
    ) {
        assert_eq!(range.resolve(len), expected);
    }

    #[test]
    fn negative_end_matches_len_minus_k() {
        // -k is equivalent to len - k, so [0, -2) on len 6 equals [0, 4).
        let negative = MemberRange::Interval {
            first: 0,
            last: -2,
            inclusive: false,
        };
        let explicit = MemberRange::from(0..4);
        assert_eq!(negative.resolve(6), explicit.resolve(6));
    }

    #[test]
    fn default_is_full() {
        assert_eq!(MemberRange::default(), MemberRange::Full);
    }
}
