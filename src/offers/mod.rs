mod catalog;
mod respond;

use std::{fmt, str::FromStr};

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub use catalog::{
    create_offer, delete_offer, list_admin_offers, list_offers, set_active, AdminOfferListing,
    NewOffer, OfferFilters, OfferListing,
};
pub use respond::{list_applications, respond, Application};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/offers", get(catalog::list).post(catalog::create))
        .route("/offers/{id}/respond", post(respond::respond_to_offer))
        .route("/offers/{id}/applications", get(respond::applications))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OfferType {
    ServiceOffer,
    RequestForService,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::ServiceOffer => "service_offer",
            OfferType::RequestForService => "request_for_service",
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_offer" => Ok(OfferType::ServiceOffer),
            "request_for_service" => Ok(OfferType::RequestForService),
            other => Err(AppError::invalid_input(format!(
                "offer type must be service_offer or request_for_service, got {other:?}"
            ))),
        }
    }
}

/// Author of the offer, or [`AppError::NotFound`].
pub async fn offer_author<'e>(executor: impl SqliteExecutor<'e>, offer_id: Uuid) -> AppResult<Uuid> {
    let author: Option<(Uuid,)> = sqlx::query_as("SELECT author_id FROM offers WHERE id = ?")
        .bind(offer_id)
        .fetch_optional(executor)
        .await?;

    author
        .map(|(author_id,)| author_id)
        .ok_or_else(|| AppError::not_found("Offer not found"))
}
