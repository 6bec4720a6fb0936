use std::collections::{BTreeMap, HashSet};

use anyhow::anyhow;
use futures::future::join_all;
use tracing::{info, warn};

use crate::api::models::{CardStateRecord, MatchResultPayload, Participant};
use crate::api::{ApiResult, ClubApi};
use crate::card::{CardStatus, MatchCard, MatchCategory, Slot, HANDICAP_NOTE_PREFIX};
use crate::grade::GradeOrder;
use crate::handicap::HandicapResolver;
use crate::promotion::{Promotion, PromotionAdvisor};
use crate::result_codec::{ResultPair, ResultSymbol, Side};
use crate::utils::error::MatchError;
use crate::utils::prompt::{CoachingOutcome, Decision, OperatorPrompt};
use crate::ClubError;

/// Which club day the board manages and how the roster is sorted.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub date: String,
    pub sort_key: String,
    pub sort_order: String,
    /// How many empty cards the day starts with.
    pub default_card_count: u32,
}

impl BoardConfig {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            sort_key: "member_code".to_string(),
            sort_order: "asc".to_string(),
            default_card_count: 5,
        }
    }
}

/// What happened to a pairing after a seat was filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The other seat is still open.
    Waiting,
    /// Both seats filled; the match can start.
    Paired { handicap: String },
    /// The operator declined the repeat-pairing gate; the card was released.
    Declined,
}

/// What happened to a finish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    Recorded(Option<String>),
    /// An earlier finish for the same card is still round-tripping.
    AlreadyInFlight,
    /// Coaching gate: result dropped, pairing released.
    Discarded,
    /// Coaching gate: the match stays in progress.
    KeptPlaying,
}

/// The registry of match cards plus the roster of unassigned participants.
///
/// All state lives here: cards, the roster cache, the assignment set and the
/// per-card in-flight markers. Mutation happens only through these methods,
/// from a single task; every server call made inside a transition precedes
/// the local mutation so a failed round-trip leaves the pre-call state.
pub struct Board<A, P> {
    api: A,
    prompt: P,
    config: BoardConfig,
    grades: GradeOrder,
    resolver: HandicapResolver,
    roster: Vec<Participant>,
    /// Non-instructor participant ids currently seated at a card.
    assigned: HashSet<String>,
    cards: BTreeMap<u32, MatchCard>,
    /// Cards with a finish round-trip in progress.
    pub(crate) in_flight: HashSet<u32>,
}

impl<A, P> Board<A, P>
where
    A: ClubApi<Error = ClubError>,
    P: OperatorPrompt,
{
    /// Fetch rules, roster and saved card states, and restore the day.
    pub async fn bootstrap(api: A, prompt: P, config: BoardConfig) -> Result<Self, ClubError> {
        let (rules, roster, records) = tokio::try_join!(
            api.list_handicap_rules(),
            api.list_participants(&config.date, &config.sort_key, &config.sort_order),
            api.load_card_states(&config.date),
        )?;

        let mut board = Self {
            api,
            prompt,
            config,
            grades: GradeOrder::new(),
            resolver: HandicapResolver::new(rules),
            roster: Vec::new(),
            assigned: HashSet::new(),
            cards: BTreeMap::new(),
            in_flight: HashSet::new(),
        };
        board.learn_roster(roster);
        for record in &records {
            board
                .cards
                .insert(record.index, MatchCard::from_record(record));
        }
        board.backfill_cards();
        board.restore_snapshots();
        board.rebuild_assigned();
        board.recompute_handicaps();
        Ok(board)
    }

    pub fn date(&self) -> &str {
        &self.config.date
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    /// Participants not seated at any card. Instructors always appear here.
    pub fn unassigned(&self) -> Vec<&Participant> {
        self.roster
            .iter()
            .filter(|p| !self.assigned.contains(&p.id))
            .collect()
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn cards(&self) -> impl Iterator<Item = &MatchCard> {
        self.cards.values()
    }

    pub fn card(&self, index: u32) -> Option<&MatchCard> {
        self.cards.get(&index)
    }

    /// Handicap labels the operator may pick for a category.
    pub fn handicap_options(&self, category: MatchCategory) -> Vec<String> {
        self.resolver.options(category)
    }

    /// Seat a participant; when the card fills up, the pairing is validated,
    /// gated and priced in one go.
    pub async fn assign(
        &mut self,
        index: u32,
        side: Side,
        participant_id: &str,
    ) -> Result<PairingOutcome, MatchError> {
        let participant = self
            .participant(participant_id)
            .cloned()
            .ok_or_else(|| MatchError::ParticipantNotExists(participant_id.to_string()))?;
        if self.assigned.contains(participant_id) {
            return Err(MatchError::AlreadyAssigned(participant_id.to_string()));
        }

        let card = self
            .cards
            .get_mut(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        if card.status != CardStatus::Pending {
            return Err(MatchError::NotPending(index));
        }
        if card.participant_id(side.other()) == Some(participant_id) {
            return Err(MatchError::AlreadyAssigned(participant_id.to_string()));
        }
        card.assign(
            side,
            Slot {
                participant_id: participant.id.clone(),
                roster_row: participant.roster_label(),
            },
        )?;
        let ready = card.both_assigned();

        if !participant.is_instructor() {
            self.assigned.insert(participant.id.clone());
        }

        if ready {
            self.complete_pairing(index).await
        } else {
            Ok(PairingOutcome::Waiting)
        }
    }

    /// Return one seat's participant to the pool while the card is pending.
    pub fn unassign(&mut self, index: u32, side: Side) -> Result<(), MatchError> {
        let card = self
            .cards
            .get_mut(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        if card.status != CardStatus::Pending {
            return Err(MatchError::NotPending(index));
        }
        card.clear_slot(side);
        card.handicap = None;
        card.notes.clear();
        self.rebuild_assigned();
        Ok(())
    }

    /// Pending → Ongoing. The grade snapshots are written here (only if
    /// unset) and the new state is persisted before the local transition.
    pub async fn start(&mut self, index: u32) -> Result<(), ClubError> {
        let card = self
            .cards
            .get(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        if card.status == CardStatus::Ongoing {
            // Restarts must not move the grade snapshots.
            return Ok(());
        }
        if !card.both_assigned() {
            return Err(MatchError::PairingIncomplete(index).into());
        }

        let mut staged = card.clone();
        staged.status = CardStatus::Ongoing;
        let grade1 = self.current_grade(staged.participant_id(Side::P1));
        let grade2 = self.current_grade(staged.participant_id(Side::P2));
        staged.snapshot_grades(&grade1, &grade2);

        let records: Vec<CardStateRecord> = self
            .cards
            .values()
            .map(|c| {
                if c.index == index {
                    staged.to_record()
                } else {
                    c.to_record()
                }
            })
            .collect();
        self.api.save_card_states(&self.config.date, &records).await?;

        info!("Card {} started ({} vs {})", index, grade1, grade2);
        self.cards.insert(index, staged);
        Ok(())
    }

    /// Enter one side's result; the codec rewrites the pair.
    pub fn submit_result(
        &mut self,
        index: u32,
        side: Side,
        value: Option<ResultSymbol>,
    ) -> Result<ResultPair, MatchError> {
        let card = self
            .cards
            .get_mut(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        card.set_result(side, value)
    }

    /// Close out an ongoing match: promotion pass, archive the record,
    /// release the card.
    pub async fn finish(&mut self, index: u32) -> Result<FinishOutcome, ClubError> {
        if !self.in_flight.insert(index) {
            return Ok(FinishOutcome::AlreadyInFlight);
        }
        // The marker is released on every path, failures included.
        let outcome = self.finish_guarded(index).await;
        self.in_flight.remove(&index);
        outcome
    }

    async fn finish_guarded(&mut self, index: u32) -> Result<FinishOutcome, ClubError> {
        let card = self
            .cards
            .get(&index)
            .ok_or(MatchError::CardNotExists(index))?
            .clone();
        if card.status != CardStatus::Ongoing {
            return Err(MatchError::NotOngoing(index).into());
        }
        if !card.results_complete() {
            return Err(MatchError::ResultsIncomplete(index).into());
        }

        let p1 = self.participant_or_stub(card.participant_id(Side::P1).unwrap_or_default());
        let p2 = self.participant_or_stub(card.participant_id(Side::P2).unwrap_or_default());

        let payload = MatchResultPayload {
            player1_id: p1.id.clone(),
            player2_id: p2.id.clone(),
            result1: card.result(Side::P1).map(|r| r.to_string()).unwrap_or_default(),
            result2: card.result(Side::P2).map(|r| r.to_string()).unwrap_or_default(),
            match_type: card.category,
            handicap: card.handicap.clone().unwrap_or_default(),
            grade_at_time1: card.grade_at_start(Side::P1).unwrap_or_default().to_string(),
            grade_at_time2: card.grade_at_start(Side::P2).unwrap_or_default().to_string(),
            card_index: index,
            p1_opponent_grade: p2.grade.clone(),
            p2_opponent_grade: p1.grade.clone(),
        };

        if card.category == MatchCategory::Coaching {
            match self.prompt.coaching_outcome(&p1.name, &p2.name).await {
                CoachingOutcome::Record => {}
                CoachingOutcome::Discard => {
                    self.cancel(index).await?;
                    return Ok(FinishOutcome::Discarded);
                }
                CoachingOutcome::KeepPlaying => return Ok(FinishOutcome::KeptPlaying),
            }
        }

        // Promotion pass for every winner. Failures are logged inside the
        // advisor and never hold up the record.
        for side in card.winners() {
            let Some(winner_id) = card.participant_id(side).map(str::to_string) else {
                continue;
            };
            let winner = self.participant_or_stub(&winner_id);
            let opponent_grade = self.current_grade(card.participant_id(side.other()));
            let next_half =
                PromotionAdvisor::next_win_is_half(card.category, &winner.grade, &opponent_grade);
            if let Some(promotion) =
                PromotionAdvisor::advise_winner(&self.api, &self.prompt, &winner, next_half).await
            {
                self.apply_promotion(&promotion);
                if let Err(e) = self.resync_roster().await {
                    warn!("Roster refresh after promotion failed: {}", e);
                }
            }
        }

        let ack = self.api.save_match_result(&payload).await?;
        if !ack.success {
            return Err(anyhow!(
                "Match record refused: {}",
                ack.message.unwrap_or_default()
            ));
        }
        self.api.delete_card_state(&self.config.date, index).await?;

        if let Some(card) = self.cards.get_mut(&index) {
            card.reset();
        }
        self.rebuild_assigned();
        if let Err(e) = self.resync_roster().await {
            warn!("Roster refresh after match failed: {}", e);
        }
        info!("Card {} recorded and released", index);
        Ok(FinishOutcome::Recorded(ack.message))
    }

    /// Release a pairing at any point before finish. Idempotent; the
    /// server-side record is cleared before any local change.
    pub async fn cancel(&mut self, index: u32) -> Result<(), ClubError> {
        if !self.cards.contains_key(&index) {
            return Err(MatchError::CardNotExists(index).into());
        }
        self.api.delete_card_state(&self.config.date, index).await?;
        if let Some(card) = self.cards.get_mut(&index) {
            card.reset();
        }
        self.rebuild_assigned();
        if let Err(e) = self.resync_roster().await {
            warn!("Roster refresh after release failed: {}", e);
        }
        Ok(())
    }

    /// Change a pending card's category, re-running the pairing rules.
    pub fn change_category(
        &mut self,
        index: u32,
        category: MatchCategory,
    ) -> Result<(), MatchError> {
        {
            let card = self
                .cards
                .get_mut(&index)
                .ok_or(MatchError::CardNotExists(index))?;
            card.set_category(category)?;
        }

        let card = &self.cards[&index];
        if !card.both_assigned() {
            return Ok(());
        }
        let grade1 = self.current_grade(card.participant_id(Side::P1));
        let grade2 = self.current_grade(card.participant_id(Side::P2));
        if category == MatchCategory::FirstCertification
            && !valid_first_certification(&grade1, &grade2)
        {
            self.release_pairing(index);
            return Err(MatchError::InvalidFirstCertificationPairing);
        }
        self.recompute_handicaps();
        Ok(())
    }

    /// Operator override of a pending card's handicap.
    pub fn set_handicap(&mut self, index: u32, label: &str) -> Result<(), MatchError> {
        let card = self
            .cards
            .get_mut(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        if card.status != CardStatus::Pending {
            return Err(MatchError::NotPending(index));
        }
        if card.category.handicap_fixed() {
            return Err(MatchError::HandicapFixed(index));
        }
        card.handicap = Some(label.to_string());
        set_handicap_note(card, label);
        Ok(())
    }

    /// Manual grade certification from a coaching or first-time assessment
    /// card, independent of the match outcome.
    pub async fn certify_grade(
        &mut self,
        index: u32,
        side: Side,
        new_grade: &str,
    ) -> Result<(), ClubError> {
        let card = self
            .cards
            .get(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        let Some(reason) = card.category.certification_reason() else {
            return Err(anyhow!(
                "Card {}: manual certification is not available for {} matches",
                index,
                card.category
            ));
        };
        let participant_id = card
            .participant_id(side)
            .ok_or(MatchError::PairingIncomplete(index))?
            .to_string();

        let ack = self
            .api
            .promote_player(&participant_id, new_grade, reason)
            .await?;
        if !ack.success {
            return Err(anyhow!(
                "Certification refused: {}",
                ack.message.unwrap_or_default()
            ));
        }
        self.apply_promotion(&Promotion {
            participant_id,
            new_grade: new_grade.to_string(),
            reason: reason.to_string(),
        });
        self.resync_roster().await?;
        Ok(())
    }

    /// Append an empty card. The new index is persisted before it exists
    /// locally.
    pub async fn add_card(&mut self) -> Result<u32, ClubError> {
        let index = self.cards.keys().max().map_or(0, |max| max + 1);
        let card = MatchCard::new(index);
        let mut records: Vec<CardStateRecord> =
            self.cards.values().map(MatchCard::to_record).collect();
        records.push(card.to_record());
        self.api.save_card_states(&self.config.date, &records).await?;
        self.cards.insert(index, card);
        Ok(index)
    }

    /// Remove a card entirely; its participants fall back into the pool.
    pub async fn delete_card(&mut self, index: u32) -> Result<(), ClubError> {
        if !self.cards.contains_key(&index) {
            return Err(MatchError::CardNotExists(index).into());
        }
        self.api.delete_card_state(&self.config.date, index).await?;
        self.cards.remove(&index);
        self.rebuild_assigned();
        Ok(())
    }

    /// Check members in for the day.
    pub async fn add_participants(&mut self, ids: &[String]) -> Result<(), ClubError> {
        let ack = self.api.add_participants(&self.config.date, ids).await?;
        if !ack.success {
            return Err(anyhow!(
                "Check-in refused: {}",
                ack.message.unwrap_or_default()
            ));
        }
        self.resync_roster().await
    }

    /// Check a member out. Refused while they are on a live card; nothing
    /// changes locally in that case.
    pub async fn remove_participant(&mut self, id: &str) -> Result<(), ClubError> {
        match self.api.remove_participant(id, &self.config.date).await? {
            ApiResult::Ok(_) => self.resync_roster().await,
            ApiResult::Conflict(message) => Err(MatchError::ParticipantInMatch(message).into()),
            ApiResult::NotFound => Err(MatchError::ParticipantNotExists(id.to_string()).into()),
        }
    }

    /// End-of-day reset: the server clears the day, the board returns to
    /// its default set of empty cards.
    pub async fn end_today(&mut self) -> Result<Option<String>, ClubError> {
        let ack = self.api.end_today(&self.config.date).await?;
        if !ack.success {
            return Err(anyhow!(
                "End-of-day reset refused: {}",
                ack.message.unwrap_or_default()
            ));
        }
        self.roster.clear();
        self.assigned.clear();
        self.in_flight.clear();
        self.cards.clear();
        self.backfill_cards();
        Ok(ack.message)
    }

    /// Both seats just filled: freshest grades, category validation, the
    /// repeat gate, handicap and promotion previews.
    async fn complete_pairing(&mut self, index: u32) -> Result<PairingOutcome, MatchError> {
        // A promotion on another card may have landed since the roster was
        // last fetched.
        if let Err(e) = self.resync_roster().await {
            warn!("Roster refresh before pairing failed: {}", e);
        }

        let (id1, id2, category) = {
            let card = self
                .cards
                .get(&index)
                .ok_or(MatchError::CardNotExists(index))?;
            (
                card.participant_id(Side::P1).unwrap_or_default().to_string(),
                card.participant_id(Side::P2).unwrap_or_default().to_string(),
                card.category,
            )
        };
        let p1 = self.participant_or_stub(&id1);
        let p2 = self.participant_or_stub(&id2);

        if category == MatchCategory::FirstCertification
            && !valid_first_certification(&p1.grade, &p2.grade)
        {
            self.release_pairing(index);
            return Err(MatchError::InvalidFirstCertificationPairing);
        }

        if category.repeat_checked() {
            match self.api.today_pair_count(&id1, &id2).await {
                Ok(count) if count >= 1 => {
                    let decision = self
                        .prompt
                        .confirm_repeat_pairing(count + 1, &p1.name, &p2.name)
                        .await;
                    if decision == Decision::Cancel {
                        self.release_pairing(index);
                        return Ok(PairingOutcome::Declined);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // Fail open: a broken lookup must not block the pairing.
                    warn!("Repeat-pairing lookup failed, proceeding: {}", e);
                }
            }
        }

        let handicap = self
            .resolver
            .resolve(self.order_of(&p1), self.order_of(&p2), category);

        let next_half1 = PromotionAdvisor::next_win_is_half(category, &p1.grade, &p2.grade);
        let next_half2 = PromotionAdvisor::next_win_is_half(category, &p2.grade, &p1.grade);
        let previews = join_all([
            PromotionAdvisor::preview(&self.api, &p1, next_half1),
            PromotionAdvisor::preview(&self.api, &p2, next_half2),
        ])
        .await;

        let card = self
            .cards
            .get_mut(&index)
            .ok_or(MatchError::CardNotExists(index))?;
        card.handicap = Some(handicap.clone());
        card.notes.clear();
        set_handicap_note(card, &handicap);
        card.notes.extend(previews.into_iter().flatten());

        Ok(PairingOutcome::Paired { handicap })
    }

    fn learn_roster(&mut self, rows: Vec<Participant>) {
        for row in &rows {
            if let Some(order) = row.grade_order {
                self.grades.learn(&row.grade, order);
            }
        }
        self.roster = rows;
    }

    /// Re-derive the assignment set from the cards. Instructors are never
    /// counted: they stay in the pool while seated.
    fn rebuild_assigned(&mut self) {
        let mut assigned = HashSet::new();
        for card in self.cards.values() {
            for side in [Side::P1, Side::P2] {
                let Some(id) = card.participant_id(side) else {
                    continue;
                };
                let instructor = self
                    .participant(id)
                    .map(Participant::is_instructor)
                    .unwrap_or(false);
                if !instructor {
                    assigned.insert(id.to_string());
                }
            }
        }
        self.assigned = assigned;
    }

    /// Recompute every pending, fully seated card's handicap from current
    /// grades. Grade snapshots of ongoing cards are deliberately left alone.
    fn recompute_handicaps(&mut self) {
        let updates: Vec<(u32, String)> = self
            .cards
            .values()
            .filter(|c| c.status == CardStatus::Pending && c.both_assigned())
            .map(|card| {
                let order = |side| {
                    card.participant_id(side)
                        .and_then(|id| self.participant(id))
                        .and_then(|p| self.order_of(p))
                };
                (
                    card.index,
                    self.resolver
                        .resolve(order(Side::P1), order(Side::P2), card.category),
                )
            })
            .collect();
        for (index, label) in updates {
            if let Some(card) = self.cards.get_mut(&index) {
                card.handicap = Some(label.clone());
                set_handicap_note(card, &label);
            }
        }
    }

    async fn resync_roster(&mut self) -> Result<(), ClubError> {
        let rows = self
            .api
            .list_participants(&self.config.date, &self.config.sort_key, &self.config.sort_order)
            .await?;
        self.learn_roster(rows);
        self.rebuild_assigned();
        self.recompute_handicaps();
        Ok(())
    }

    /// Update the cached grade after a confirmed promotion. Pending
    /// handicaps follow; start-of-match snapshots do not.
    fn apply_promotion(&mut self, promotion: &Promotion) {
        let order = self.grades.order(&promotion.new_grade);
        if let Some(entry) = self
            .roster
            .iter_mut()
            .find(|p| p.id == promotion.participant_id)
        {
            entry.grade = promotion.new_grade.clone();
            entry.grade_order = order;
        }
        self.rebuild_assigned();
        self.recompute_handicaps();
    }

    fn release_pairing(&mut self, index: u32) {
        if let Some(card) = self.cards.get_mut(&index) {
            card.reset();
        }
        self.rebuild_assigned();
    }

    fn backfill_cards(&mut self) {
        for index in 0..self.config.default_card_count {
            self.cards
                .entry(index)
                .or_insert_with(|| MatchCard::new(index));
        }
    }

    /// Ongoing cards restored from persistence have no snapshots yet; fill
    /// them from the current roster.
    fn restore_snapshots(&mut self) {
        let grades: Vec<(u32, String, String)> = self
            .cards
            .values()
            .filter(|c| c.status == CardStatus::Ongoing)
            .map(|card| {
                (
                    card.index,
                    self.current_grade(card.participant_id(Side::P1)),
                    self.current_grade(card.participant_id(Side::P2)),
                )
            })
            .collect();
        for (index, grade1, grade2) in grades {
            if let Some(card) = self.cards.get_mut(&index) {
                card.snapshot_grades(&grade1, &grade2);
            }
        }
    }

    fn current_grade(&self, id: Option<&str>) -> String {
        id.and_then(|id| self.participant(id))
            .map(|p| p.grade.clone())
            .unwrap_or_default()
    }

    fn participant_or_stub(&self, id: &str) -> Participant {
        self.participant(id).cloned().unwrap_or_else(|| Participant {
            id: id.to_string(),
            ..Participant::default()
        })
    }

    fn order_of(&self, participant: &Participant) -> Option<i32> {
        if participant.is_unranked() {
            return None;
        }
        self.grades
            .order(&participant.grade)
            .or(participant.grade_order)
    }
}

/// A first-time assessment needs exactly one unranked player.
fn valid_first_certification(grade1: &str, grade2: &str) -> bool {
    crate::grade::is_unranked(grade1) != crate::grade::is_unranked(grade2)
}

fn set_handicap_note(card: &mut MatchCard, label: &str) {
    let line = format!("{}{}", HANDICAP_NOTE_PREFIX, label);
    match card.notes.first_mut() {
        Some(first) if first.starts_with(HANDICAP_NOTE_PREFIX) => *first = line,
        _ => card.notes.insert(0, line),
    }
}
