use crate::result_codec::Side;

/// Domain rule violations surfaced to the operator.
///
/// Every variant except `ParticipantInMatch` is raised before any server
/// call is made and is recovered by leaving the board untouched.
/// `ParticipantInMatch` is the server's conflict answer to a roster removal;
/// it carries the server's message and also leaves local state unchanged.
#[derive(Debug)]
pub enum MatchError {
    SlotOccupied(u32, Side),
    AlreadyAssigned(String),
    CardNotExists(u32),
    ParticipantNotExists(String),
    InvalidFirstCertificationPairing,
    PairingIncomplete(u32),
    ResultsIncomplete(u32),
    NotOngoing(u32),
    NotPending(u32),
    HandicapFixed(u32),
    ParticipantInMatch(String),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use MatchError::*;
        match self {
            SlotOccupied(index, side) => {
                write!(f, "Card {}: {} is already occupied.", index, side)
            }
            AlreadyAssigned(id) => {
                write!(f, "Participant {} is already assigned to a card.", id)
            }
            CardNotExists(index) => write!(f, "Card {} does not exist.", index),
            ParticipantNotExists(id) => write!(f, "Participant {} is not checked in.", id),
            InvalidFirstCertificationPairing => write!(
                f,
                "A first-time assessment needs exactly one unranked player."
            ),
            PairingIncomplete(index) => write!(f, "Card {} needs two players.", index),
            ResultsIncomplete(index) => {
                write!(f, "Card {}: both results must be entered first.", index)
            }
            NotOngoing(index) => write!(f, "Card {} has no match in progress.", index),
            NotPending(index) => write!(f, "Card {} already has a match in progress.", index),
            HandicapFixed(index) => {
                write!(f, "Card {}: the handicap is fixed for this match type.", index)
            }
            ParticipantInMatch(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for MatchError {}
