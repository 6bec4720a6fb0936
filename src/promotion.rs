use tracing::{info, warn};

use crate::api::models::Participant;
use crate::api::ClubApi;
use crate::card::MatchCategory;
use crate::grade;
use crate::utils::prompt::{Decision, OperatorPrompt};
use crate::ClubError;

/// A promotion the operator confirmed and the authority applied.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub participant_id: String,
    pub new_grade: String,
    pub reason: String,
}

/// Client half of promotion eligibility.
///
/// The authority owns the counting rules; this side only decides when to
/// ask, how to weigh the next win, and what to do with the answer. Nothing
/// here may fail the surrounding match flow.
pub struct PromotionAdvisor;

impl PromotionAdvisor {
    /// Whether a player's next win counts half: the ranked side of a
    /// first-time assessment against an unranked opponent.
    pub fn next_win_is_half(
        category: MatchCategory,
        own_grade: &str,
        opponent_grade: &str,
    ) -> bool {
        category == MatchCategory::FirstCertification
            && !grade::is_unranked(own_grade)
            && grade::is_unranked(opponent_grade)
    }

    /// Pairing-time preview line: "wins and is promoted". `None` when the
    /// player is unranked, not about to promote, or the check failed.
    pub async fn preview<A>(api: &A, player: &Participant, next_win_half: bool) -> Option<String>
    where
        A: ClubApi<Error = ClubError>,
    {
        if player.is_unranked() {
            return None;
        }
        let check = match api.check_promotion(&player.id, next_win_half).await {
            Ok(check) => check,
            Err(e) => {
                warn!("Promotion preview for {} failed: {}", player.id, e);
                return None;
            }
        };
        if check.success && check.promote {
            let next = check.next_grade.unwrap_or_else(|| "next grade".to_string());
            Some(format!("{} wins and is promoted to {}", player.name, next))
        } else {
            None
        }
    }

    /// Post-match pass for one winner: consult the authority, gate on the
    /// operator, apply through the authority. Returns the applied promotion,
    /// or `None` for "not eligible", "declined" and every failure (all
    /// logged; none may block the match record).
    pub async fn advise_winner<A, P>(
        api: &A,
        prompt: &P,
        winner: &Participant,
        next_win_half: bool,
    ) -> Option<Promotion>
    where
        A: ClubApi<Error = ClubError>,
        P: OperatorPrompt,
    {
        if winner.is_unranked() {
            return None;
        }

        let check = match api.check_promotion(&winner.id, next_win_half).await {
            Ok(check) => check,
            Err(e) => {
                warn!("Promotion check for {} failed: {}", winner.id, e);
                return None;
            }
        };
        if !(check.success && check.promote) {
            return None;
        }
        let next_grade = check.next_grade?;

        let decision = prompt
            .confirm_promotion(&winner.name, &next_grade, check.reason.as_deref())
            .await;
        if decision != Decision::Proceed {
            info!("Promotion of {} to {} declined", winner.name, next_grade);
            return None;
        }

        let reason = check.reason.unwrap_or_default();
        match api.promote_player(&winner.id, &next_grade, &reason).await {
            Ok(ack) if ack.success => {
                info!("Promoted {} to {}", winner.name, next_grade);
                Some(Promotion {
                    participant_id: winner.id.clone(),
                    new_grade: next_grade,
                    reason,
                })
            }
            Ok(ack) => {
                warn!(
                    "Promotion of {} refused: {}",
                    winner.id,
                    ack.message.unwrap_or_default()
                );
                None
            }
            Err(e) => {
                warn!("Promotion of {} failed: {}", winner.id, e);
                None
            }
        }
    }
}
