use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::api::models::CardStateRecord;
use crate::grade;
use crate::result_codec::{propagate, CodecContext, ResultPair, ResultSymbol, Side};
use crate::utils::error::MatchError;

/// First informational line of a card: the resolved handicap. The prefix
/// lets the label survive the persistence round trip.
pub const HANDICAP_NOTE_PREFIX: &str = "Handicap: ";

/// What kind of match a card hosts. The wire format uses the club's
/// Japanese labels.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter,
)]
pub enum MatchCategory {
    #[default]
    #[serde(rename = "認定戦")]
    #[strum(to_string = "認定戦")]
    Certification,
    #[serde(rename = "初回認定")]
    #[strum(to_string = "初回認定")]
    FirstCertification,
    #[serde(rename = "指導")]
    #[strum(to_string = "指導")]
    Coaching,
    #[serde(rename = "フリー")]
    #[strum(to_string = "フリー")]
    Free,
}

impl MatchCategory {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "認定戦" | "certification" => Some(MatchCategory::Certification),
            "初回認定" | "first" => Some(MatchCategory::FirstCertification),
            "指導" | "coaching" => Some(MatchCategory::Coaching),
            "フリー" | "free" => Some(MatchCategory::Free),
            _ => None,
        }
    }

    /// Certification-type matches count toward the daily repeat warning.
    pub fn repeat_checked(self) -> bool {
        matches!(
            self,
            MatchCategory::Certification | MatchCategory::FirstCertification
        )
    }

    /// Coaching and first-time assessments pin their handicap label.
    pub fn handicap_fixed(self) -> bool {
        matches!(
            self,
            MatchCategory::Coaching | MatchCategory::FirstCertification
        )
    }

    /// Reason string recorded when the operator certifies a grade by hand
    /// from this card; `None` for categories without that action.
    pub fn certification_reason(self) -> Option<&'static str> {
        match self {
            MatchCategory::Coaching => Some("指導"),
            MatchCategory::FirstCertification => Some("初回認定"),
            _ => None,
        }
    }
}

/// Lifecycle position of a card. Archived and released matches have no
/// stored status; the card simply resets to an empty pending one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum CardStatus {
    #[default]
    #[strum(to_string = "pending")]
    Pending,
    #[strum(to_string = "ongoing")]
    Ongoing,
}

/// An occupied player slot.
#[derive(Debug, Clone)]
pub struct Slot {
    pub participant_id: String,
    /// Roster-row rendering captured at assignment, restored when the
    /// participant returns to the pool.
    pub roster_row: String,
}

/// One match card: a pairing slot-pair and its lifecycle.
///
/// The card is pure state; every server round-trip and every cross-card
/// rule lives in the board.
#[derive(Debug, Default, Clone)]
pub struct MatchCard {
    pub index: u32,
    pub status: CardStatus,
    pub category: MatchCategory,
    slot1: Option<Slot>,
    slot2: Option<Slot>,
    pub handicap: Option<String>,
    grade_at_start1: Option<String>,
    grade_at_start2: Option<String>,
    pub result1: Option<ResultSymbol>,
    pub result2: Option<ResultSymbol>,
    /// Informational lines for the operator (handicap, promotion previews).
    pub notes: Vec<String>,
}

impl MatchCard {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn slot(&self, side: Side) -> Option<&Slot> {
        match side {
            Side::P1 => self.slot1.as_ref(),
            Side::P2 => self.slot2.as_ref(),
        }
    }

    pub fn participant_id(&self, side: Side) -> Option<&str> {
        self.slot(side).map(|s| s.participant_id.as_str())
    }

    pub fn grade_at_start(&self, side: Side) -> Option<&str> {
        match side {
            Side::P1 => self.grade_at_start1.as_deref(),
            Side::P2 => self.grade_at_start2.as_deref(),
        }
    }

    pub fn result(&self, side: Side) -> Option<ResultSymbol> {
        match side {
            Side::P1 => self.result1,
            Side::P2 => self.result2,
        }
    }

    pub fn both_assigned(&self) -> bool {
        self.slot1.is_some() && self.slot2.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slot1.is_none() && self.slot2.is_none()
    }

    /// Seat a participant. Fails while the slot is taken.
    pub fn assign(&mut self, side: Side, slot: Slot) -> Result<(), MatchError> {
        let target = match side {
            Side::P1 => &mut self.slot1,
            Side::P2 => &mut self.slot2,
        };
        if target.is_some() {
            return Err(MatchError::SlotOccupied(self.index, side));
        }
        *target = Some(slot);
        Ok(())
    }

    pub fn clear_slot(&mut self, side: Side) -> Option<Slot> {
        match side {
            Side::P1 => self.slot1.take(),
            Side::P2 => self.slot2.take(),
        }
    }

    /// Record the start-of-match grades. Only unset snapshots are written:
    /// restarts and reloads must not move an existing snapshot, and neither
    /// do later promotions.
    pub fn snapshot_grades(&mut self, grade1: &str, grade2: &str) {
        if self.grade_at_start1.is_none() {
            self.grade_at_start1 = Some(grade1.to_string());
        }
        if self.grade_at_start2.is_none() {
            self.grade_at_start2 = Some(grade2.to_string());
        }
    }

    /// Codec facts derived from the grade snapshots.
    pub fn codec_context(&self) -> CodecContext {
        CodecContext {
            first_certification: self.category == MatchCategory::FirstCertification,
            p1_unranked: self
                .grade_at_start1
                .as_deref()
                .is_some_and(grade::is_unranked),
            p2_unranked: self
                .grade_at_start2
                .as_deref()
                .is_some_and(grade::is_unranked),
        }
    }

    /// Enter one side's result and let the codec rewrite the pair.
    pub fn set_result(
        &mut self,
        side: Side,
        value: Option<ResultSymbol>,
    ) -> Result<ResultPair, MatchError> {
        if self.status != CardStatus::Ongoing {
            return Err(MatchError::NotOngoing(self.index));
        }
        let pair = propagate(side, value, self.codec_context());
        self.result1 = pair.p1;
        self.result2 = pair.p2;
        Ok(pair)
    }

    pub fn results_complete(&self) -> bool {
        self.result1.is_some() && self.result2.is_some()
    }

    /// Sides whose entered result is a (half) win.
    pub fn winners(&self) -> Vec<Side> {
        [Side::P1, Side::P2]
            .into_iter()
            .filter(|side| self.result(*side).is_some_and(|r| r.is_win()))
            .collect()
    }

    /// Category changes are only legal before the match starts.
    pub fn set_category(&mut self, category: MatchCategory) -> Result<(), MatchError> {
        if self.status != CardStatus::Pending {
            return Err(MatchError::NotPending(self.index));
        }
        self.category = category;
        Ok(())
    }

    /// Back to an empty pending certification card; the index survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.index);
    }

    /// Wire projection for the card-state persistence contract.
    pub fn to_record(&self) -> CardStateRecord {
        CardStateRecord {
            index: self.index,
            match_type: self.category,
            p1_id: self
                .participant_id(Side::P1)
                .unwrap_or_default()
                .to_string(),
            p2_id: self
                .participant_id(Side::P2)
                .unwrap_or_default()
                .to_string(),
            status: self.status.to_string(),
            info_html: self.notes.join("\n"),
            original_html1: self
                .slot(Side::P1)
                .map(|s| s.roster_row.clone())
                .unwrap_or_default(),
            original_html2: self
                .slot(Side::P2)
                .map(|s| s.roster_row.clone())
                .unwrap_or_default(),
        }
    }

    /// Rebuild a card from its persisted record. Results and grade
    /// snapshots are not persisted; the board refills snapshots for ongoing
    /// cards from the current roster.
    pub fn from_record(record: &CardStateRecord) -> Self {
        let slot_from = |id: &str, row: &str| {
            if id.is_empty() {
                None
            } else {
                Some(Slot {
                    participant_id: id.to_string(),
                    roster_row: row.to_string(),
                })
            }
        };
        let notes: Vec<String> = record
            .info_html
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect();
        let handicap = notes
            .first()
            .and_then(|line| line.strip_prefix(HANDICAP_NOTE_PREFIX))
            .map(str::to_string);
        Self {
            index: record.index,
            status: if record.status == "ongoing" {
                CardStatus::Ongoing
            } else {
                CardStatus::Pending
            },
            category: record.match_type,
            slot1: slot_from(&record.p1_id, &record.original_html1),
            slot2: slot_from(&record.p2_id, &record.original_html2),
            handicap,
            grade_at_start1: None,
            grade_at_start2: None,
            result1: None,
            result2: None,
            notes,
        }
    }
}
