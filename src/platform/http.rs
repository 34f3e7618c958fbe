//! HTTP transport for the managed data platform.
//!
//! The platform exposes its stored procedures PostgREST-style at
//! `POST {base}/rest/v1/rpc/{name}` with `p_`-prefixed JSON arguments and
//! table reads at `GET {base}/rest/v1/{table}`. This client maps the
//! [`PlatformClient`] trait onto that surface.

use super::types::*;
use super::PlatformClient;
use crate::config::PlatformConfig;
use crate::error::{LibrariumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Production [`PlatformClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpPlatformClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Bearer token sent as the caller identity. Defaults to the service
    /// key; use [`with_access_token`](Self::with_access_token) to forward
    /// an end-user session instead.
    access_token: String,
}

impl HttpPlatformClient {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.anon_key.clone(),
            access_token: config.service_key.clone(),
        }
    }

    /// Forward an end-user access token instead of the service key, so the
    /// platform evaluates its row-level policies as that user.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    async fn rpc<T: DeserializeOwned>(&self, name: &str, args: Value) -> Result<T> {
        let url = format!("{}/rest/v1/rpc/{name}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .json(&args)
            .send()
            .await
            .map_err(|e| {
                LibrariumError::service_unavailable(format!("platform rpc {name}: {e}"))
            })?;

        Self::decode(name, response).await
    }

    async fn decode<T: DeserializeOwned>(name: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                LibrariumError::internal(format!("platform rpc {name}: malformed response: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => LibrariumError::unauthorized(body),
            StatusCode::FORBIDDEN => LibrariumError::forbidden(body),
            StatusCode::NOT_FOUND => LibrariumError::not_found(body),
            s if s.is_client_error() => LibrariumError::bad_request(body),
            _ => LibrariumError::service_unavailable(format!("platform rpc {name}: {status}")),
        })
    }

    /// The stats RPCs return single-row arrays; unwrap them.
    fn single_row<T: Default>(rows: Vec<T>) -> T {
        rows.into_iter().next().unwrap_or_default()
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn get_user_organizations(&self, _user_id: &str) -> Result<Vec<OrgSummaryRow>> {
        // Caller identity comes from the bearer token.
        self.rpc("get_user_organizations", json!({})).await
    }

    async fn switch_organization(
        &self,
        _user_id: &str,
        organization_id: &str,
    ) -> Result<RpcOutcome> {
        self.rpc(
            "switch_organization",
            json!({ "p_organization_id": organization_id }),
        )
        .await
    }

    async fn create_organization(
        &self,
        _user_id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        contact_email: Option<&str>,
    ) -> Result<CreateOrgOutcome> {
        self.rpc(
            "create_organization",
            json!({
                "p_name": name,
                "p_slug": slug,
                "p_description": description,
                "p_contact_email": contact_email,
            }),
        )
        .await
    }

    async fn get_organization(&self, organization_id: &str) -> Result<Option<OrganizationRow>> {
        let url = format!(
            "{}/rest/v1/organizations?id=eq.{organization_id}&limit=1",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("platform select: {e}")))?;

        let rows: Vec<OrganizationRow> = Self::decode("get_organization", response).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_organization_stats(&self, organization_id: &str) -> Result<OrgStatsRow> {
        let rows: Vec<OrgStatsRow> = self
            .rpc(
                "get_organization_stats",
                json!({ "p_organization_id": organization_id }),
            )
            .await?;
        Ok(Self::single_row(rows))
    }

    async fn get_user_dashboard_stats(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
    ) -> Result<DashboardStatsRow> {
        let rows: Vec<DashboardStatsRow> = self
            .rpc(
                "get_user_dashboard_stats",
                json!({
                    "p_organization_id": organization_id,
                    "p_user_id": user_id,
                }),
            )
            .await?;
        Ok(Self::single_row(rows))
    }

    async fn borrow_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<BorrowOutcome> {
        self.rpc(
            "borrow_book",
            json!({
                "p_organization_id": organization_id,
                "p_book_id": book_id,
                "p_user_id": user_id,
                "p_due_date": due_date,
            }),
        )
        .await
    }

    async fn return_book(
        &self,
        loan_id: &str,
        organization_id: Option<&str>,
    ) -> Result<ReturnOutcome> {
        self.rpc(
            "return_book",
            json!({
                "p_loan_id": loan_id,
                "p_organization_id": organization_id,
            }),
        )
        .await
    }

    async fn reserve_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
    ) -> Result<ReserveOutcome> {
        self.rpc(
            "reserve_book",
            json!({
                "p_organization_id": organization_id,
                "p_book_id": book_id,
                "p_user_id": user_id,
            }),
        )
        .await
    }

    async fn invite_to_organization(
        &self,
        organization_id: &str,
        _actor_id: &str,
        email: &str,
        role: Option<&str>,
        message: Option<&str>,
    ) -> Result<InviteOutcome> {
        self.rpc(
            "invite_to_organization",
            json!({
                "p_organization_id": organization_id,
                "p_email": email,
                "p_role": role,
                "p_message": message,
            }),
        )
        .await
    }

    async fn get_invitation(&self, invitation_id: &str) -> Result<Option<InvitationRow>> {
        let url = format!(
            "{}/rest/v1/invitations_with_org?id=eq.{invitation_id}&limit=1",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("platform select: {e}")))?;

        let rows: Vec<InvitationRow> = Self::decode("get_invitation", response).await?;
        Ok(rows.into_iter().next())
    }

    async fn accept_invitation(&self, token: &str, user_id: &str) -> Result<AcceptOutcome> {
        self.rpc(
            "accept_invitation",
            json!({
                "p_token": token,
                "p_user_id": user_id,
            }),
        )
        .await
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        email: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(&self.access_token)
            .json(&json!({
                "id": user_id,
                "email": email,
                "metadata": metadata,
            }))
            .send()
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("profile upsert: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LibrariumError::service_unavailable(format!(
                "profile upsert: {}",
                response.status()
            )))
        }
    }

    async fn set_billing_customer(&self, organization_id: &str, customer_id: &str) -> Result<()> {
        let url = format!(
            "{}/rest/v1/organizations?id=eq.{organization_id}",
            self.base_url
        );
        let response = self
            .http
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .json(&json!({ "stripe_customer_id": customer_id }))
            .send()
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("billing update: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LibrariumError::service_unavailable(format!(
                "billing update: {}",
                response.status()
            )))
        }
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/rest/v1/", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("platform ping: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LibrariumError::service_unavailable(format!(
                "platform ping: {}",
                response.status()
            )))
        }
    }
}
