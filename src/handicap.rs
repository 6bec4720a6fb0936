use crate::api::models::HandicapRule;
use crate::card::MatchCategory;

/// Fallback when no rule matches the grade distance.
pub const EVEN: &str = "平手";
/// Fixed label for coaching matches.
pub const COACHING: &str = "指導";
/// Fixed label for first-time assessment matches.
pub const CERTIFICATION: &str = "認定";

/// Maps a grade distance and match category to a handicap label.
///
/// The rule table comes from the club server and is ordered; the first rule
/// whose `grade_diff` equals the distance wins.
#[derive(Debug, Default, Clone)]
pub struct HandicapResolver {
    rules: Vec<HandicapRule>,
}

impl HandicapResolver {
    pub fn new(rules: Vec<HandicapRule>) -> Self {
        Self { rules }
    }

    /// Resolve the handicap for a pair of grade orders.
    ///
    /// Coaching and first-time assessment bypass the table entirely. A
    /// missing order on either side means no rule can apply and the match is
    /// played even.
    pub fn resolve(
        &self,
        order1: Option<i32>,
        order2: Option<i32>,
        category: MatchCategory,
    ) -> String {
        match category {
            MatchCategory::Coaching => COACHING.to_string(),
            MatchCategory::FirstCertification => CERTIFICATION.to_string(),
            _ => {
                let diff = match (order1, order2) {
                    (Some(a), Some(b)) => Some((a - b).abs()),
                    _ => None,
                };
                diff.and_then(|d| self.rules.iter().find(|r| r.grade_diff == d))
                    .map(|r| r.handicap.clone())
                    .unwrap_or_else(|| EVEN.to_string())
            }
        }
    }

    /// Labels the operator may pick from, in rule-table order.
    ///
    /// Coaching matches get the coaching label first.
    pub fn options(&self, category: MatchCategory) -> Vec<String> {
        let mut seen = Vec::new();
        if category == MatchCategory::Coaching {
            seen.push(COACHING.to_string());
        }
        for rule in &self.rules {
            if !seen.contains(&rule.handicap) {
                seen.push(rule.handicap.clone());
            }
        }
        seen
    }
}
