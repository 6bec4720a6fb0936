/// Outcome of a yes/no confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Cancel,
}

/// What to do with a finished coaching match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachingOutcome {
    /// Record the result like any certification match.
    Record,
    /// Drop the result and release the pairing.
    Discard,
    /// Abort the finish; the match stays in progress.
    KeepPlaying,
}

/// Operator confirmation gates, decoupled from any presentation mechanism.
///
/// Implementations decide how to ask (console, UI dialog); the board only
/// sees the decision.
#[allow(async_fn_in_trait)]
pub trait OperatorPrompt {
    /// The pair has already played `nth - 1` recorded certification matches
    /// today. Dismissing the gate without an explicit choice counts as
    /// `Proceed`; only an explicit cancellation releases the pairing.
    async fn confirm_repeat_pairing(&self, nth: u32, name1: &str, name2: &str) -> Decision;

    /// A winner qualifies for `next_grade`; ask before promoting.
    async fn confirm_promotion(
        &self,
        name: &str,
        next_grade: &str,
        reason: Option<&str>,
    ) -> Decision;

    /// Three-way gate shown when a coaching match ends.
    async fn coaching_outcome(&self, name1: &str, name2: &str) -> CoachingOutcome;
}
