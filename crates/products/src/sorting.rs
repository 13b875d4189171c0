//! Manual product ordering.
//!
//! Moving a product from one position to another is a splice: close the gap
//! it leaves, then open a gap where it goes. Stores apply both steps in one
//! transaction.

use serde::{Deserialize, Serialize};

/// Two-step sorting shift for a reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortShift {
    /// Decrement every sorting strictly greater than this position.
    pub close_gap_after: Option<i64>,
    /// Then increment every sorting greater than or equal to this position.
    pub open_gap_at: i64,
}

impl SortShift {
    /// Plan a move to `new_sorting`. Returns `None` (no writes) when the
    /// position does not change.
    pub fn plan(new_sorting: i64, old_sorting: Option<i64>) -> Option<Self> {
        if old_sorting == Some(new_sorting) {
            return None;
        }
        Some(Self {
            close_gap_after: old_sorting,
            open_gap_at: new_sorting,
        })
    }

    /// Resulting sorting for a row currently at `sorting`.
    pub fn apply(&self, sorting: i64) -> i64 {
        let closed = match self.close_gap_after {
            Some(old) if sorting > old => sorting - 1,
            _ => sorting,
        };
        if closed >= self.open_gap_at {
            closed + 1
        } else {
            closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_positions_plan_nothing() {
        assert_eq!(SortShift::plan(4, Some(4)), None);
    }

    #[test]
    fn insert_without_old_position_opens_a_gap() {
        let shift = SortShift::plan(2, None).unwrap();
        let after: Vec<i64> = [1, 2, 3].iter().map(|s| shift.apply(*s)).collect();
        assert_eq!(after, vec![1, 3, 4]);
    }

    #[test]
    fn moving_down_shifts_neighbours_up() {
        // rows at 1..=5, the row at 2 moves to 4
        let shift = SortShift::plan(4, Some(2)).unwrap();
        let others: Vec<i64> = [1, 3, 4, 5].iter().map(|s| shift.apply(*s)).collect();
        assert_eq!(others, vec![1, 2, 3, 5]);
    }

    #[test]
    fn moving_up_shifts_neighbours_down() {
        // rows at 1..=5, the row at 4 moves to 2
        let shift = SortShift::plan(2, Some(4)).unwrap();
        let others: Vec<i64> = [1, 2, 3, 5].iter().map(|s| shift.apply(*s)).collect();
        assert_eq!(others, vec![1, 3, 4, 5]);
    }
}
