use serde::{Deserialize, Serialize};

use crate::card::MatchCategory;
use crate::grade;

/// One checked-in participant as served by the roster endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kana: String,
    #[serde(default)]
    pub member_code: Option<String>,
    pub grade: String,
    #[serde(default)]
    pub member_type: String,
    /// Numeric position of `grade` in the club's strength table; absent for
    /// the unranked.
    #[serde(default)]
    pub grade_order: Option<i32>,
}

impl Participant {
    /// Instructors stay in the unassigned pool even while seated at a card.
    pub fn is_instructor(&self) -> bool {
        self.member_type == "指導員"
    }

    pub fn is_unranked(&self) -> bool {
        grade::is_unranked(&self.grade)
    }

    /// The roster-row rendering captured into a slot so the row can be
    /// restored when the participant returns to the pool.
    pub fn roster_label(&self) -> String {
        format!(
            "{}（{}）{}・{}",
            self.name, self.kana, self.grade, self.member_type
        )
    }
}

/// One row of the club's handicap rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandicapRule {
    pub grade_diff: i32,
    pub handicap: String,
}

/// Persisted state of one match card.
///
/// Empty strings mean "unset" on the wire; the load endpoint labels the
/// index `card_index` while the save payload calls it `index`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CardStateRecord {
    #[serde(alias = "card_index")]
    pub index: u32,
    #[serde(default)]
    pub match_type: MatchCategory,
    #[serde(default)]
    pub p1_id: String,
    #[serde(default)]
    pub p2_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub info_html: String,
    #[serde(default)]
    pub original_html1: String,
    #[serde(default)]
    pub original_html2: String,
}

/// Body of the card-state save endpoint.
#[derive(Debug, Serialize)]
pub struct SaveCardsPayload<'a> {
    pub date: &'a str,
    pub cards: &'a [CardStateRecord],
}

/// Envelope for the card-state load endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct LoadCardsResponse {
    #[serde(default)]
    pub cards: Vec<CardStateRecord>,
}

/// Generic acknowledgement most mutation endpoints answer with.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Set on roster-removal conflicts: the participant is on a live card.
    #[serde(default)]
    pub in_match: Option<bool>,
}

/// Answer of the repeat-pairing authority.
#[derive(Debug, Deserialize, Default)]
pub struct PairCountResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: u32,
}

/// Answer of the promotion authority's eligibility check.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PromotionCheck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub promote: bool,
    #[serde(default)]
    pub next_grade: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Everything the match-result authority needs to archive one match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResultPayload {
    pub player1_id: String,
    pub player2_id: String,
    pub result1: String,
    pub result2: String,
    pub match_type: MatchCategory,
    pub handicap: String,
    /// Both players' grades as of match start, not as of submission.
    pub grade_at_time1: String,
    pub grade_at_time2: String,
    pub card_index: u32,
    pub p1_opponent_grade: String,
    pub p2_opponent_grade: String,
}
