use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::anyhow;

use crate::api::models::{
    Ack, CardStateRecord, HandicapRule, MatchResultPayload, Participant, PromotionCheck,
};
use crate::api::{ApiResult, ClubApi};
use crate::board::{Board, BoardConfig, FinishOutcome, PairingOutcome};
use crate::card::{CardStatus, MatchCategory};
use crate::grade::UNRANKED;
use crate::result_codec::{ResultSymbol, Side};
use crate::utils::error::MatchError;
use crate::utils::prompt::{CoachingOutcome, Decision, OperatorPrompt};
use crate::ClubError;

#[derive(Default)]
struct MockState {
    participants: RefCell<Vec<Participant>>,
    rules: RefCell<Vec<HandicapRule>>,
    records: RefCell<Vec<CardStateRecord>>,
    saved_results: RefCell<Vec<MatchResultPayload>>,
    deleted_cards: RefCell<Vec<u32>>,
    promoted: RefCell<Vec<(String, String, String)>>,
    promotion_checks: RefCell<HashMap<String, PromotionCheck>>,
    check_calls: RefCell<Vec<(String, bool)>>,
    pair_count: Cell<u32>,
    pair_count_fails: Cell<bool>,
    save_result_fails: Cell<bool>,
    removal_conflict: Cell<bool>,
}

/// In-memory stand-in for the club server.
#[derive(Default, Clone)]
struct MockApi {
    state: Rc<MockState>,
}

impl ClubApi for MockApi {
    type Error = ClubError;

    async fn list_participants(
        &self,
        _date: &str,
        _sort: &str,
        _order: &str,
    ) -> Result<Vec<Participant>, Self::Error> {
        Ok(self.state.participants.borrow().clone())
    }

    async fn add_participants(&self, _date: &str, _ids: &[String]) -> Result<Ack, Self::Error> {
        Ok(Ack {
            success: true,
            ..Ack::default()
        })
    }

    async fn remove_participant(
        &self,
        id: &str,
        _date: &str,
    ) -> Result<ApiResult<Ack>, Self::Error> {
        if self.state.removal_conflict.get() {
            return Ok(ApiResult::Conflict(format!("{} is in a match", id)));
        }
        let mut participants = self.state.participants.borrow_mut();
        let before = participants.len();
        participants.retain(|p| p.id != id);
        if participants.len() == before {
            return Ok(ApiResult::NotFound);
        }
        Ok(ApiResult::Ok(Ack {
            success: true,
            ..Ack::default()
        }))
    }

    async fn list_handicap_rules(&self) -> Result<Vec<HandicapRule>, Self::Error> {
        Ok(self.state.rules.borrow().clone())
    }

    async fn save_card_states(
        &self,
        _date: &str,
        cards: &[CardStateRecord],
    ) -> Result<(), Self::Error> {
        self.state.records.replace(cards.to_vec());
        Ok(())
    }

    async fn load_card_states(&self, _date: &str) -> Result<Vec<CardStateRecord>, Self::Error> {
        Ok(self.state.records.borrow().clone())
    }

    async fn delete_card_state(&self, _date: &str, index: u32) -> Result<(), Self::Error> {
        self.state.deleted_cards.borrow_mut().push(index);
        Ok(())
    }

    async fn today_pair_count(&self, _p1: &str, _p2: &str) -> Result<u32, Self::Error> {
        if self.state.pair_count_fails.get() {
            return Err(anyhow!("pair count unavailable"));
        }
        Ok(self.state.pair_count.get())
    }

    async fn check_promotion(
        &self,
        player_id: &str,
        next_win_half: bool,
    ) -> Result<PromotionCheck, Self::Error> {
        self.state
            .check_calls
            .borrow_mut()
            .push((player_id.to_string(), next_win_half));
        Ok(self
            .state
            .promotion_checks
            .borrow()
            .get(player_id)
            .cloned()
            .unwrap_or(PromotionCheck {
                success: true,
                ..PromotionCheck::default()
            }))
    }

    async fn promote_player(
        &self,
        participant_id: &str,
        new_grade: &str,
        reason: &str,
    ) -> Result<Ack, Self::Error> {
        self.state.promoted.borrow_mut().push((
            participant_id.to_string(),
            new_grade.to_string(),
            reason.to_string(),
        ));
        if let Some(p) = self
            .state
            .participants
            .borrow_mut()
            .iter_mut()
            .find(|p| p.id == participant_id)
        {
            p.grade = new_grade.to_string();
        }
        Ok(Ack {
            success: true,
            ..Ack::default()
        })
    }

    async fn save_match_result(&self, payload: &MatchResultPayload) -> Result<Ack, Self::Error> {
        if self.state.save_result_fails.get() {
            return Err(anyhow!("archive unavailable"));
        }
        self.state.saved_results.borrow_mut().push(payload.clone());
        Ok(Ack {
            success: true,
            message: Some("recorded".to_string()),
            in_match: None,
        })
    }

    async fn end_today(&self, _date: &str) -> Result<Ack, Self::Error> {
        self.state.participants.borrow_mut().clear();
        self.state.records.borrow_mut().clear();
        Ok(Ack {
            success: true,
            ..Ack::default()
        })
    }
}

struct PromptState {
    repeat: Cell<Decision>,
    repeat_asked: Cell<u32>,
    promotion: Cell<Decision>,
    coaching: Cell<CoachingOutcome>,
}

impl Default for PromptState {
    fn default() -> Self {
        Self {
            repeat: Cell::new(Decision::Proceed),
            repeat_asked: Cell::new(0),
            promotion: Cell::new(Decision::Proceed),
            coaching: Cell::new(CoachingOutcome::Record),
        }
    }
}

#[derive(Default, Clone)]
struct MockPrompt {
    state: Rc<PromptState>,
}

impl OperatorPrompt for MockPrompt {
    async fn confirm_repeat_pairing(&self, nth: u32, _name1: &str, _name2: &str) -> Decision {
        self.state.repeat_asked.set(nth);
        self.state.repeat.get()
    }

    async fn confirm_promotion(
        &self,
        _name: &str,
        _next_grade: &str,
        _reason: Option<&str>,
    ) -> Decision {
        self.state.promotion.get()
    }

    async fn coaching_outcome(&self, _name1: &str, _name2: &str) -> CoachingOutcome {
        self.state.coaching.get()
    }
}

fn member(id: &str, grade: &str, order: Option<i32>) -> Participant {
    Participant {
        id: id.to_string(),
        name: format!("Member {}", id),
        kana: "かな".to_string(),
        member_code: Some(id.to_string()),
        grade: grade.to_string(),
        member_type: "正会員".to_string(),
        grade_order: order,
    }
}

fn instructor(id: &str, grade: &str, order: Option<i32>) -> Participant {
    Participant {
        member_type: "指導員".to_string(),
        ..member(id, grade, order)
    }
}

fn default_rules() -> Vec<HandicapRule> {
    vec![
        HandicapRule {
            grade_diff: 1,
            handicap: "香落ち".to_string(),
        },
        HandicapRule {
            grade_diff: 2,
            handicap: "角落ち".to_string(),
        },
    ]
}

async fn board_with(
    participants: Vec<Participant>,
) -> (Board<MockApi, MockPrompt>, MockApi, MockPrompt) {
    let api = MockApi::default();
    api.state.participants.replace(participants);
    api.state.rules.replace(default_rules());
    let prompt = MockPrompt::default();
    let board = Board::bootstrap(api.clone(), prompt.clone(), BoardConfig::new("2025-08-01"))
        .await
        .expect("bootstrap");
    (board, api, prompt)
}

/// No non-instructor may sit at a card and stand in the pool at once.
fn assert_pool_exclusive(board: &Board<MockApi, MockPrompt>) {
    for participant in board.unassigned() {
        if participant.is_instructor() {
            continue;
        }
        for card in board.cards() {
            for side in [Side::P1, Side::P2] {
                assert_ne!(
                    card.participant_id(side),
                    Some(participant.id.as_str()),
                    "{} is both pooled and seated on card {}",
                    participant.id,
                    card.index
                );
            }
        }
    }
}

#[tokio::test]
async fn assignment_moves_participants_out_of_the_pool() {
    let (mut board, _api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
        member("c", "3級", Some(13)),
        instructor("i", "三段", Some(7)),
    ])
    .await;

    assert_eq!(board.assign(0, Side::P1, "a").await.unwrap(), PairingOutcome::Waiting);
    let outcome = board.assign(0, Side::P2, "b").await.unwrap();
    assert_eq!(
        outcome,
        PairingOutcome::Paired {
            handicap: "角落ち".to_string()
        }
    );

    let pool: Vec<&str> = board.unassigned().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(pool, vec!["c", "i"]);
    assert_pool_exclusive(&board);

    // Instructors stay in the pool while seated.
    board.assign(1, Side::P1, "i").await.unwrap();
    assert!(board.unassigned().iter().any(|p| p.id == "i"));
    assert_pool_exclusive(&board);

    // Seated participants cannot be seated twice.
    let err = board.assign(1, Side::P2, "a").await.unwrap_err();
    assert!(matches!(err, MatchError::AlreadyAssigned(_)));
    // Occupied seats stay occupied.
    let err = board.assign(0, Side::P1, "c").await.unwrap_err();
    assert!(matches!(err, MatchError::SlotOccupied(0, Side::P1)));
}

#[tokio::test]
async fn cancel_returns_both_players_to_the_pool() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();

    board.cancel(0).await.unwrap();
    let card = board.card(0).unwrap();
    assert!(card.is_empty());
    assert_eq!(card.status, CardStatus::Pending);
    assert_eq!(card.category, MatchCategory::Certification);
    assert_eq!(board.unassigned().len(), 2);
    assert_eq!(api.state.deleted_cards.borrow().as_slice(), &[0]);
    assert_pool_exclusive(&board);
}

#[tokio::test]
async fn start_is_idempotent_for_grade_snapshots() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
        member("c", "3級", Some(13)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    assert_eq!(board.card(0).unwrap().grade_at_start(Side::P1), Some("初段"));

    // The roster moves under the ongoing card...
    if let Some(p) = api
        .state
        .participants
        .borrow_mut()
        .iter_mut()
        .find(|p| p.id == "a")
    {
        p.grade = "二段".to_string();
    }
    board.cancel(1).await.unwrap(); // triggers a roster re-sync
    assert_eq!(board.participant("a").unwrap().grade, "二段");

    // ...but a second start leaves the snapshots where they were.
    board.start(0).await.unwrap();
    let card = board.card(0).unwrap();
    assert_eq!(card.status, CardStatus::Ongoing);
    assert_eq!(card.grade_at_start(Side::P1), Some("初段"));
    assert_eq!(card.grade_at_start(Side::P2), Some("2級"));
}

#[tokio::test]
async fn finish_records_once_and_releases_the_card() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::Win))
        .unwrap();

    let outcome = board.finish(0).await.unwrap();
    assert_eq!(outcome, FinishOutcome::Recorded(Some("recorded".to_string())));

    let saved = api.state.saved_results.borrow();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].result1, "○");
    assert_eq!(saved[0].result2, "●");
    assert_eq!(saved[0].grade_at_time1, "初段");
    assert_eq!(saved[0].handicap, "角落ち");
    assert_eq!(saved[0].p2_opponent_grade, "初段");
    drop(saved);

    let card = board.card(0).unwrap();
    assert!(card.is_empty());
    assert_eq!(card.status, CardStatus::Pending);
    assert_eq!(board.unassigned().len(), 2);
    assert_pool_exclusive(&board);
}

#[tokio::test]
async fn concurrent_finish_persists_exactly_one_record() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::Win))
        .unwrap();

    // A first finish for the card is still awaiting its round trip.
    board.in_flight.insert(0);
    assert_eq!(
        board.finish(0).await.unwrap(),
        FinishOutcome::AlreadyInFlight
    );
    assert!(api.state.saved_results.borrow().is_empty());

    board.in_flight.remove(&0);
    assert!(matches!(
        board.finish(0).await.unwrap(),
        FinishOutcome::Recorded(_)
    ));
    assert_eq!(api.state.saved_results.borrow().len(), 1);
}

#[tokio::test]
async fn finish_failure_releases_the_marker_and_keeps_the_card() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P2, Some(ResultSymbol::Win))
        .unwrap();

    api.state.save_result_fails.set(true);
    assert!(board.finish(0).await.is_err());
    // Pre-call state: the card is still ongoing with its results.
    let card = board.card(0).unwrap();
    assert_eq!(card.status, CardStatus::Ongoing);
    assert_eq!(card.result(Side::P1), Some(ResultSymbol::Loss));
    assert!(board.in_flight.is_empty());

    api.state.save_result_fails.set(false);
    assert!(matches!(
        board.finish(0).await.unwrap(),
        FinishOutcome::Recorded(_)
    ));
    assert_eq!(api.state.saved_results.borrow().len(), 1);
}

#[tokio::test]
async fn finish_requires_both_results() {
    let (mut board, _api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();

    let err = board.finish(0).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchError>(),
        Some(MatchError::ResultsIncomplete(0))
    ));
    assert!(board.in_flight.is_empty());
}

#[tokio::test]
async fn first_certification_needs_exactly_one_unranked_player() {
    let (mut board, _api, _prompt) = board_with(vec![
        member("p", UNRANKED, None),
        member("q", "5級", Some(15)),
        member("r", UNRANKED, None),
    ])
    .await;

    board
        .change_category(0, MatchCategory::FirstCertification)
        .unwrap();
    board.assign(0, Side::P1, "p").await.unwrap();
    let outcome = board.assign(0, Side::P2, "q").await.unwrap();
    assert_eq!(
        outcome,
        PairingOutcome::Paired {
            handicap: "認定".to_string()
        }
    );

    board.cancel(0).await.unwrap();

    // Two unranked players: the pairing aborts and both seats clear.
    board
        .change_category(0, MatchCategory::FirstCertification)
        .unwrap();
    board.assign(0, Side::P1, "p").await.unwrap();
    let err = board.assign(0, Side::P2, "r").await.unwrap_err();
    assert!(matches!(err, MatchError::InvalidFirstCertificationPairing));
    assert!(board.card(0).unwrap().is_empty());
    assert_eq!(board.unassigned().len(), 3);
    assert_pool_exclusive(&board);
}

#[tokio::test]
async fn first_certification_results_use_the_half_symbols() {
    let (mut board, api, _prompt) = board_with(vec![
        member("p", UNRANKED, None),
        member("q", "5級", Some(15)),
    ])
    .await;

    board
        .change_category(0, MatchCategory::FirstCertification)
        .unwrap();
    board.assign(0, Side::P1, "q").await.unwrap();
    board.assign(0, Side::P2, "p").await.unwrap();
    board.start(0).await.unwrap();

    // The ranked winner takes the half win, never the plain pair.
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::HalfWin))
        .unwrap();
    let card = board.card(0).unwrap();
    assert_eq!(card.result(Side::P1), Some(ResultSymbol::HalfWin));
    assert_eq!(card.result(Side::P2), Some(ResultSymbol::Loss));

    // The unranked side winning voids the ranked side's loss.
    board
        .submit_result(0, Side::P2, Some(ResultSymbol::Win))
        .unwrap();
    let card = board.card(0).unwrap();
    assert_eq!(card.result(Side::P1), Some(ResultSymbol::NoCountLoss));
    assert_eq!(card.result(Side::P2), Some(ResultSymbol::Win));

    let outcome = board.finish(0).await.unwrap();
    assert!(matches!(outcome, FinishOutcome::Recorded(_)));
    let saved = api.state.saved_results.borrow();
    assert_eq!(saved[0].result1, "◆");
    assert_eq!(saved[0].result2, "○");
    assert_eq!(saved[0].grade_at_time2, UNRANKED);
    drop(saved);
    // Only the ranked side was ever run past the promotion authority (the
    // pairing preview, flagged as a half win); the unranked winner was not.
    assert_eq!(
        api.state.check_calls.borrow().as_slice(),
        &[("q".to_string(), true)]
    );
}

#[tokio::test]
async fn coaching_cards_pin_the_handicap_until_the_category_changes() {
    let (mut board, _api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.change_category(0, MatchCategory::Coaching).unwrap();
    let outcome = board.assign(0, Side::P1, "a").await.unwrap();
    assert_eq!(outcome, PairingOutcome::Waiting);
    let outcome = board.assign(0, Side::P2, "b").await.unwrap();
    assert_eq!(
        outcome,
        PairingOutcome::Paired {
            handicap: "指導".to_string()
        }
    );

    let err = board.set_handicap(0, "平手").unwrap_err();
    assert!(matches!(err, MatchError::HandicapFixed(0)));

    // Leaving the coaching category recomputes from the rule table.
    board
        .change_category(0, MatchCategory::Certification)
        .unwrap();
    assert_eq!(board.card(0).unwrap().handicap.as_deref(), Some("角落ち"));
    board.set_handicap(0, "平手").unwrap();
    assert_eq!(board.card(0).unwrap().handicap.as_deref(), Some("平手"));
}

#[tokio::test]
async fn repeat_gate_can_release_the_pairing() {
    let (mut board, api, prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    api.state.pair_count.set(1);
    prompt.state.repeat.set(Decision::Cancel);

    board.assign(0, Side::P1, "a").await.unwrap();
    let outcome = board.assign(0, Side::P2, "b").await.unwrap();
    assert_eq!(outcome, PairingOutcome::Declined);
    assert_eq!(prompt.state.repeat_asked.get(), 2);
    assert!(board.card(0).unwrap().is_empty());
    assert_eq!(board.unassigned().len(), 2);
}

#[tokio::test]
async fn repeat_gate_fails_open() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    api.state.pair_count_fails.set(true);
    board.assign(0, Side::P1, "a").await.unwrap();
    let outcome = board.assign(0, Side::P2, "b").await.unwrap();
    assert!(matches!(outcome, PairingOutcome::Paired { .. }));
}

#[tokio::test]
async fn free_matches_skip_the_repeat_gate() {
    let (mut board, api, prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    api.state.pair_count.set(3);
    board.change_category(0, MatchCategory::Free).unwrap();
    board.assign(0, Side::P1, "a").await.unwrap();
    let outcome = board.assign(0, Side::P2, "b").await.unwrap();
    assert!(matches!(outcome, PairingOutcome::Paired { .. }));
    assert_eq!(prompt.state.repeat_asked.get(), 0);
}

#[tokio::test]
async fn confirmed_promotion_updates_the_roster_and_pending_handicaps() {
    let (mut board, api, prompt) = board_with(vec![
        instructor("i", "2級", Some(12)),
        member("b", "3級", Some(13)),
        member("c", "1級", Some(11)),
    ])
    .await;

    api.state.promotion_checks.borrow_mut().insert(
        "i".to_string(),
        PromotionCheck {
            success: true,
            promote: true,
            next_grade: Some("1級".to_string()),
            reason: Some("3連勝".to_string()),
        },
    );

    // The instructor sits at a pending card whose handicap depends on
    // their grade while also playing a match on card 0.
    board.assign(1, Side::P1, "i").await.unwrap();
    board.assign(1, Side::P2, "c").await.unwrap();
    assert_eq!(board.card(1).unwrap().handicap.as_deref(), Some("香落ち"));

    board.assign(0, Side::P1, "i").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::Win))
        .unwrap();
    board.finish(0).await.unwrap();

    assert_eq!(
        api.state.promoted.borrow().as_slice(),
        &[("i".to_string(), "1級".to_string(), "3連勝".to_string())]
    );
    assert_eq!(board.participant("i").unwrap().grade, "1級");
    assert_eq!(prompt.state.repeat_asked.get(), 0);

    // The promotion changed a seated grade: the pending card reprices
    // (both players now 1級, no rule for distance zero).
    assert_eq!(board.card(1).unwrap().handicap.as_deref(), Some("平手"));
}

#[tokio::test]
async fn declined_promotion_leaves_the_grade_alone() {
    let (mut board, api, prompt) = board_with(vec![
        member("a", "2級", Some(12)),
        member("b", "3級", Some(13)),
    ])
    .await;

    api.state.promotion_checks.borrow_mut().insert(
        "a".to_string(),
        PromotionCheck {
            success: true,
            promote: true,
            next_grade: Some("1級".to_string()),
            reason: None,
        },
    );
    prompt.state.promotion.set(Decision::Cancel);

    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::Win))
        .unwrap();
    let outcome = board.finish(0).await.unwrap();

    // The result is recorded regardless of the declined promotion.
    assert!(matches!(outcome, FinishOutcome::Recorded(_)));
    assert!(api.state.promoted.borrow().is_empty());
    assert_eq!(board.participant("a").unwrap().grade, "2級");
}

#[tokio::test]
async fn coaching_finish_gate_can_discard_or_keep_playing() {
    let (mut board, api, prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.change_category(0, MatchCategory::Coaching).unwrap();
    board.assign(0, Side::P1, "a").await.unwrap();
    board.assign(0, Side::P2, "b").await.unwrap();
    board.start(0).await.unwrap();
    board
        .submit_result(0, Side::P1, Some(ResultSymbol::Win))
        .unwrap();

    prompt.state.coaching.set(CoachingOutcome::KeepPlaying);
    assert_eq!(board.finish(0).await.unwrap(), FinishOutcome::KeptPlaying);
    assert_eq!(board.card(0).unwrap().status, CardStatus::Ongoing);
    assert!(api.state.saved_results.borrow().is_empty());

    prompt.state.coaching.set(CoachingOutcome::Discard);
    assert_eq!(board.finish(0).await.unwrap(), FinishOutcome::Discarded);
    assert!(board.card(0).unwrap().is_empty());
    assert!(api.state.saved_results.borrow().is_empty());
    assert_eq!(board.unassigned().len(), 2);
}

#[tokio::test]
async fn roster_removal_conflict_changes_nothing() {
    let (mut board, api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    api.state.removal_conflict.set(true);
    let err = board.remove_participant("a").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchError>(),
        Some(MatchError::ParticipantInMatch(_))
    ));
    assert_eq!(board.roster().len(), 2);

    api.state.removal_conflict.set(false);
    board.remove_participant("a").await.unwrap();
    assert_eq!(board.roster().len(), 1);
    let err = board.remove_participant("zzz").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchError>(),
        Some(MatchError::ParticipantNotExists(_))
    ));
}

#[tokio::test]
async fn bootstrap_restores_ongoing_cards_and_snapshots() {
    let api = MockApi::default();
    api.state.rules.replace(default_rules());
    api.state.participants.replace(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
        instructor("i", "三段", Some(7)),
    ]);
    api.state.records.replace(vec![CardStateRecord {
        index: 1,
        match_type: MatchCategory::Certification,
        p1_id: "a".to_string(),
        p2_id: "b".to_string(),
        status: "ongoing".to_string(),
        info_html: "Handicap: 角落ち".to_string(),
        original_html1: "row-a".to_string(),
        original_html2: "row-b".to_string(),
    }]);

    let board = Board::bootstrap(
        api.clone(),
        MockPrompt::default(),
        BoardConfig::new("2025-08-01"),
    )
    .await
    .unwrap();

    // Backfilled to the default count around the restored card.
    assert_eq!(board.cards().count(), 5);
    let card = board.card(1).unwrap();
    assert_eq!(card.status, CardStatus::Ongoing);
    assert_eq!(card.handicap.as_deref(), Some("角落ち"));
    assert_eq!(card.grade_at_start(Side::P1), Some("初段"));
    assert_eq!(card.grade_at_start(Side::P2), Some("2級"));
    let pool: Vec<&str> = board.unassigned().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(pool, vec!["i"]);
}

#[tokio::test]
async fn end_today_resets_the_board() {
    let (mut board, _api, _prompt) = board_with(vec![
        member("a", "初段", Some(10)),
        member("b", "2級", Some(12)),
    ])
    .await;

    board.assign(3, Side::P1, "a").await.unwrap();
    board.add_card().await.unwrap();
    assert_eq!(board.cards().count(), 6);

    board.end_today().await.unwrap();
    assert_eq!(board.cards().count(), 5);
    assert!(board.cards().all(|c| c.is_empty()));
    assert!(board.roster().is_empty());
}

#[tokio::test]
async fn manual_certification_is_limited_to_coaching_and_assessment_cards() {
    let (mut board, api, _prompt) = board_with(vec![
        member("p", UNRANKED, None),
        member("q", "5級", Some(15)),
    ])
    .await;

    board.assign(0, Side::P1, "p").await.unwrap();
    board.assign(0, Side::P2, "q").await.unwrap();
    assert!(board.certify_grade(0, Side::P1, "9級").await.is_err());
    assert!(api.state.promoted.borrow().is_empty());

    board.cancel(0).await.unwrap();
    board
        .change_category(0, MatchCategory::FirstCertification)
        .unwrap();
    board.assign(0, Side::P1, "p").await.unwrap();
    board.assign(0, Side::P2, "q").await.unwrap();
    board.certify_grade(0, Side::P1, "9級").await.unwrap();
    assert_eq!(
        api.state.promoted.borrow().as_slice(),
        &[("p".to_string(), "9級".to_string(), "初回認定".to_string())]
    );
    assert_eq!(board.participant("p").unwrap().grade, "9級");
}
