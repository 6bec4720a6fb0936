use std::collections::HashMap;

/// Grade label of members without a formal rank yet.
///
/// The sentinel has no position in the numeric ordering and is skipped by
/// handicap distance math, but it drives the half-win branch of the result
/// codec during first-time assessment matches.
pub const UNRANKED: &str = "未認定";

pub fn is_unranked(grade: &str) -> bool {
    grade.trim() == UNRANKED
}

/// Total ordering over the club's grade labels.
///
/// The order values come from the roster service (each row carries its
/// grade's position); the map grows as rows are observed. Unknown labels and
/// the unranked sentinel have no order.
#[derive(Debug, Default, Clone)]
pub struct GradeOrder {
    orders: HashMap<String, i32>,
}

impl GradeOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the numeric position of a grade label.
    pub fn learn(&mut self, grade: &str, order: i32) {
        if is_unranked(grade) || grade.trim().is_empty() {
            return;
        }
        self.orders.insert(grade.trim().to_string(), order);
    }

    pub fn order(&self, grade: &str) -> Option<i32> {
        if is_unranked(grade) {
            return None;
        }
        self.orders.get(grade.trim()).copied()
    }

    /// Absolute distance between two grades, `None` when either side has no
    /// numeric order (no handicap rule can apply).
    pub fn distance(&self, grade1: &str, grade2: &str) -> Option<i32> {
        Some((self.order(grade1)? - self.order(grade2)?).abs())
    }
}
