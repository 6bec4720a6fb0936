use serde::{Deserialize, Serialize};
use strum::Display;

/// A match result symbol as recorded by the club.
///
/// `HalfWin` and `NoCountLoss` exist only for the ranked side of a
/// first-time assessment match against an unranked opponent: that side's win
/// counts half and its loss is voided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ResultSymbol {
    #[serde(rename = "○")]
    #[strum(to_string = "○")]
    Win,
    #[serde(rename = "●")]
    #[strum(to_string = "●")]
    Loss,
    #[serde(rename = "△")]
    #[strum(to_string = "△")]
    Draw,
    #[serde(rename = "◇")]
    #[strum(to_string = "◇")]
    HalfWin,
    #[serde(rename = "◆")]
    #[strum(to_string = "◆")]
    NoCountLoss,
}

impl ResultSymbol {
    /// Wins are what trigger promotion checks.
    pub fn is_win(self) -> bool {
        matches!(self, ResultSymbol::Win | ResultSymbol::HalfWin)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "○" => Some(ResultSymbol::Win),
            "●" => Some(ResultSymbol::Loss),
            "△" => Some(ResultSymbol::Draw),
            "◇" => Some(ResultSymbol::HalfWin),
            "◆" => Some(ResultSymbol::NoCountLoss),
            _ => None,
        }
    }
}

/// One of the two player slots of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Side {
    #[strum(to_string = "player1")]
    P1,
    #[strum(to_string = "player2")]
    P2,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

/// Start-of-match facts the codec needs to pick the legal symbols.
///
/// The unranked flags are taken from the grade snapshots recorded when the
/// match started, never from the current roster grades.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecContext {
    pub first_certification: bool,
    pub p1_unranked: bool,
    pub p2_unranked: bool,
}

impl CodecContext {
    fn unranked(&self, side: Side) -> bool {
        match side {
            Side::P1 => self.p1_unranked,
            Side::P2 => self.p2_unranked,
        }
    }

    /// Whether a side records half-credit symbols: the ranked side of a
    /// first-time assessment against an unranked opponent.
    pub fn uses_half_symbols(&self, side: Side) -> bool {
        self.first_certification && !self.unranked(side) && self.unranked(side.other())
    }

    /// The symbols a side may legally select.
    pub fn options(&self, side: Side) -> [ResultSymbol; 3] {
        if self.uses_half_symbols(side) {
            [
                ResultSymbol::HalfWin,
                ResultSymbol::NoCountLoss,
                ResultSymbol::Draw,
            ]
        } else {
            [ResultSymbol::Win, ResultSymbol::Loss, ResultSymbol::Draw]
        }
    }
}

/// Both sides' symbols after a change to one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPair {
    pub p1: Option<ResultSymbol>,
    pub p2: Option<ResultSymbol>,
}

/// Propagate one side's selection to the pair.
///
/// A change to either selector always rewrites both: the opposite side gets
/// the complementary symbol, and an impossible entry on the changed side
/// (a plain loss from the ranked side of a first-time assessment) is
/// corrected to the voided loss.
pub fn propagate(changed: Side, value: Option<ResultSymbol>, ctx: CodecContext) -> ResultPair {
    use ResultSymbol::*;

    let (own, other) = match value {
        None => (None, None),
        Some(Draw) => (Some(Draw), Some(Draw)),
        Some(sym @ (Win | HalfWin)) => {
            if ctx.first_certification && ctx.unranked(changed) && !ctx.unranked(changed.other()) {
                // An unranked player's win voids the ranked opponent's loss.
                (Some(sym), Some(NoCountLoss))
            } else {
                (Some(sym), Some(Loss))
            }
        }
        Some(NoCountLoss) => (Some(NoCountLoss), Some(Win)),
        Some(Loss) => {
            if ctx.first_certification && ctx.unranked(changed) {
                // The ranked opponent's win over an unranked player counts half.
                (Some(Loss), Some(HalfWin))
            } else if ctx.first_certification
                && !ctx.unranked(changed)
                && ctx.unranked(changed.other())
            {
                (Some(NoCountLoss), Some(Win))
            } else {
                (Some(Loss), Some(Win))
            }
        }
    };

    match changed {
        Side::P1 => ResultPair { p1: own, p2: other },
        Side::P2 => ResultPair { p1: other, p2: own },
    }
}
