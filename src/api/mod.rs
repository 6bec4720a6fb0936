use anyhow::anyhow;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::ClubError;

pub mod models;

use models::{
    Ack, CardStateRecord, HandicapRule, LoadCardsResponse, MatchResultPayload, PairCountResponse,
    Participant, PromotionCheck, SaveCardsPayload,
};

/// Describes the club server the board talks to.
///
/// The board only ever sees this trait; tests drive it with an in-memory
/// implementation and production uses [`HttpClubApi`].
#[allow(async_fn_in_trait)]
pub trait ClubApi {
    /// The error type the API can return. You can usually just use ClubError.
    type Error;

    /// Today's checked-in participants, in the requested sort order.
    async fn list_participants(
        &self,
        date: &str,
        sort: &str,
        order: &str,
    ) -> Result<Vec<Participant>, Self::Error>;

    /// Check members in for the day.
    async fn add_participants(&self, date: &str, ids: &[String]) -> Result<Ack, Self::Error>;

    /// Check a member out. Answers `Conflict` while they are on a live card.
    async fn remove_participant(
        &self,
        id: &str,
        date: &str,
    ) -> Result<ApiResult<Ack>, Self::Error>;

    /// The club's handicap rule table, ordered.
    async fn list_handicap_rules(&self) -> Result<Vec<HandicapRule>, Self::Error>;

    /// Persist the full set of card states for the day.
    async fn save_card_states(
        &self,
        date: &str,
        cards: &[CardStateRecord],
    ) -> Result<(), Self::Error>;

    /// Restore the card states saved for the day.
    async fn load_card_states(&self, date: &str) -> Result<Vec<CardStateRecord>, Self::Error>;

    /// Clear one card's persisted state (pairing released or match archived).
    async fn delete_card_state(&self, date: &str, index: u32) -> Result<(), Self::Error>;

    /// How many recorded certification matches this pair already played today.
    async fn today_pair_count(&self, p1: &str, p2: &str) -> Result<u32, Self::Error>;

    /// Ask the promotion authority whether the player's next win promotes
    /// them. `next_win_half` marks the win as a half win.
    async fn check_promotion(
        &self,
        player_id: &str,
        next_win_half: bool,
    ) -> Result<PromotionCheck, Self::Error>;

    /// Apply a promotion the operator confirmed.
    async fn promote_player(
        &self,
        participant_id: &str,
        new_grade: &str,
        reason: &str,
    ) -> Result<Ack, Self::Error>;

    /// Archive one finished match.
    async fn save_match_result(&self, payload: &MatchResultPayload) -> Result<Ack, Self::Error>;

    /// End-of-day reset: clears today's roster and stale cards.
    async fn end_today(&self, date: &str) -> Result<Ack, Self::Error>;
}

/// Wrapper for the result of an API call whose failure modes are part of
/// the contract rather than errors.
pub enum ApiResult<M> {
    Ok(M),
    NotFound,
    /// The server refused the operation and said why.
    Conflict(String),
}

impl<M> ApiResult<M>
where
    M: DeserializeOwned,
{
    /// Create an API result from a response.
    ///
    /// 200 carries the payload, 404 and 409 are contract answers, anything
    /// else is a transport-level failure.
    pub async fn from_response(response: Response) -> Result<Self, ClubError> {
        match response.status() {
            StatusCode::OK => Ok(ApiResult::Ok(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(ApiResult::NotFound),
            StatusCode::CONFLICT => {
                let ack: Ack = response.json().await.unwrap_or_default();
                Ok(ApiResult::Conflict(
                    ack.message.unwrap_or_else(|| "Conflict".to_string()),
                ))
            }
            _ => Err(anyhow!(
                "Request failed with status code: {}\n\nResponse details: {:#?}",
                response.status(),
                response
            )),
        }
    }
}

/// The API endpoint to retrieve resources from.
#[derive(Debug)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    fn new(url: String) -> Self {
        Self { url }
    }

    /// Append a path to retrieve a specific resource from the endpoint.
    fn append_path(&self, path: &str) -> String {
        let mut full_url = self.url.clone();
        full_url.push_str(path);
        full_url
    }
}

/// The club server reached over HTTP with JSON bodies.
#[derive(Debug)]
pub struct HttpClubApi {
    client: Client,
    endpoint: Endpoint,
}

impl HttpClubApi {
    /// Create a new API client against a base URL such as
    /// `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: Endpoint::new(base_url.trim_end_matches('/').to_string()),
        }
    }

    async fn expect_ack(response: Response) -> Result<Ack, ClubError> {
        if !response.status().is_success() {
            return Err(anyhow!(
                "Request failed with status code: {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }
}

impl ClubApi for HttpClubApi {
    type Error = ClubError;

    async fn list_participants(
        &self,
        date: &str,
        sort: &str,
        order: &str,
    ) -> Result<Vec<Participant>, Self::Error> {
        let url = self.endpoint.append_path(&format!(
            "/api/participants?date={}&sort={}&order={}",
            urlencoding::encode(date),
            urlencoding::encode(sort),
            urlencoding::encode(order)
        ));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to fetch participants with status code {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn add_participants(&self, date: &str, ids: &[String]) -> Result<Ack, Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/api/participants"))
            .json(&serde_json::json!({ "date": date, "ids": ids }))
            .send()
            .await?;
        Self::expect_ack(response).await
    }

    async fn remove_participant(
        &self,
        id: &str,
        date: &str,
    ) -> Result<ApiResult<Ack>, Self::Error> {
        let url = self.endpoint.append_path(&format!(
            "/api/participants/{}?date={}",
            urlencoding::encode(id),
            urlencoding::encode(date)
        ));
        let response = self.client.delete(&url).send().await?;
        ApiResult::from_response(response).await
    }

    async fn list_handicap_rules(&self) -> Result<Vec<HandicapRule>, Self::Error> {
        let response = self
            .client
            .get(self.endpoint.append_path("/api/handicap_rules"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to fetch handicap rules with status code {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn save_card_states(
        &self,
        date: &str,
        cards: &[CardStateRecord],
    ) -> Result<(), Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/api/match_card_state/save"))
            .json(&SaveCardsPayload { date, cards })
            .send()
            .await?;
        Self::expect_ack(response).await?;
        Ok(())
    }

    async fn load_card_states(&self, date: &str) -> Result<Vec<CardStateRecord>, Self::Error> {
        let url = self.endpoint.append_path(&format!(
            "/api/match_card_state/load?date={}",
            urlencoding::encode(date)
        ));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to load card states with status code {}",
                response.status()
            ));
        }
        let body: LoadCardsResponse = response.json().await?;
        Ok(body.cards)
    }

    async fn delete_card_state(&self, date: &str, index: u32) -> Result<(), Self::Error> {
        let url = self.endpoint.append_path(&format!(
            "/api/match_card_state/delete?date={}&index={}",
            urlencoding::encode(date),
            index
        ));
        let response = self.client.delete(&url).send().await?;
        let ack = Self::expect_ack(response).await?;
        if !ack.success {
            return Err(anyhow!(
                "Card state delete refused: {}",
                ack.message.unwrap_or_default()
            ));
        }
        Ok(())
    }

    async fn today_pair_count(&self, p1: &str, p2: &str) -> Result<u32, Self::Error> {
        let url = self.endpoint.append_path(&format!(
            "/api/today_pair_count?p1={}&p2={}",
            urlencoding::encode(p1),
            urlencoding::encode(p2)
        ));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Pair count lookup failed with status code {}",
                response.status()
            ));
        }
        let body: PairCountResponse = response.json().await?;
        if !body.success {
            return Err(anyhow!("Pair count lookup refused"));
        }
        Ok(body.count)
    }

    async fn check_promotion(
        &self,
        player_id: &str,
        next_win_half: bool,
    ) -> Result<PromotionCheck, Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/check_promotion"))
            .json(&serde_json::json!({
                "player_id": player_id,
                "next_win_half": next_win_half
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Promotion check failed with status code {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn promote_player(
        &self,
        participant_id: &str,
        new_grade: &str,
        reason: &str,
    ) -> Result<Ack, Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/api/promote_player"))
            .json(&serde_json::json!({
                "participant_id": participant_id,
                "new_grade": new_grade,
                "reason": reason
            }))
            .send()
            .await?;
        Self::expect_ack(response).await
    }

    async fn save_match_result(&self, payload: &MatchResultPayload) -> Result<Ack, Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/save_match_result"))
            .json(payload)
            .send()
            .await?;
        Self::expect_ack(response).await
    }

    async fn end_today(&self, date: &str) -> Result<Ack, Self::Error> {
        let response = self
            .client
            .post(self.endpoint.append_path("/api/end_today"))
            .json(&serde_json::json!({ "date": date }))
            .send()
            .await?;
        Self::expect_ack(response).await
    }
}
