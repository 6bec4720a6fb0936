//! Same-day registration and live match tracking for a go/shogi club.
//!
//! The crate owns the board state for one club day: the roster of checked-in
//! participants, a set of match cards cycling through pairing, play and
//! result entry, handicap calculation from the club's rule table, and the
//! client half of grade promotion. Everything the club server owns
//! (persistence, the authoritative promotion rules, the match archive) is
//! reached through the [`api::ClubApi`] contract.

/// Client for the club server's JSON endpoints.
pub mod api;
/// The registry of match cards and the unassigned participant pool.
pub mod board;
#[cfg(test)]
mod board_tests;
/// One match card and its lifecycle.
pub mod card;
/// Grade labels, their ordering, and the unranked sentinel.
pub mod grade;
/// Handicap lookup from grade distance and match category.
pub mod handicap;
/// Promotion eligibility checks and their operator confirmation flow.
pub mod promotion;
/// Result symbols and the pairwise propagation rules.
pub mod result_codec;

pub mod utils;

/// A thread-safe Error type used for transport and plumbing failures.
///
/// Domain rule violations use [`utils::error::MatchError`] instead.
pub type ClubError = anyhow::Error;
