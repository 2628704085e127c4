//! Report routes.
//!
//! Each route is a thin adapter: it parses query parameters into a
//! `ReportRequest` and hands it to the shared engine with its `ReportKind`.

use std::collections::BTreeSet;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;
use vitrine_core::branch::BranchSelection;
use vitrine_core::reports::{Curve, ReportKind, ReportPage, ReportParams, ReportRequest};
use vitrine_shared::AppError;
use vitrine_shared::types::PageRequest;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the report routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/losses", get(get_losses))
        .route("/reports/rupture/curve", get(get_rupture_by_curve))
        .route("/reports/rupture/forecast", get(get_rupture_forecast))
        .route("/reports/dre", get(get_dre))
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters shared by every report route.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQueryParams {
    /// `all` or a comma-separated list of branch codes.
    pub filiais: Option<String>,
    /// Period start (defaults to the first day of the end date's month).
    pub data_inicio: Option<NaiveDate>,
    /// Period end (defaults to today).
    pub data_fim: Option<NaiveDate>,
    /// Page number, 1-based.
    pub page: Option<u32>,
    /// Top-level groups per page.
    pub page_size: Option<u32>,
    /// Compare against PAM and PAA.
    pub comparar: Option<bool>,
    /// Comma-separated curve filter (`A,B`).
    pub curvas: Option<String>,
    /// Forecast horizon in days.
    pub horizonte_dias: Option<u32>,
    /// Date the forecast counts coverage days from.
    pub data_referencia: Option<NaiveDate>,
}

impl ReportQueryParams {
    /// Builds an engine request, filling defaults relative to `today`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for unparsable branch codes or curves.
    pub fn into_request(
        self,
        today: NaiveDate,
        default_page_size: u32,
    ) -> Result<ReportRequest, AppError> {
        let branches = BranchSelection::parse(self.filiais.as_deref())
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let period_end = self.data_fim.unwrap_or(today);
        let period_start = match self.data_inicio {
            Some(start) => start,
            None => period_end.with_day(1).unwrap_or(period_end),
        };

        let curves = match self.curvas.as_deref() {
            Some(raw) => parse_curves(raw)?,
            None => BTreeSet::new(),
        };

        Ok(ReportRequest {
            branches,
            period_start,
            period_end,
            page: PageRequest::new(
                self.page.unwrap_or(1),
                self.page_size.unwrap_or(default_page_size),
            ),
            compare: self.comparar.unwrap_or(false),
            params: ReportParams {
                curves,
                horizon_days: self.horizonte_dias,
                reference_date: self.data_referencia,
            },
        })
    }
}

fn parse_curves(raw: &str) -> Result<BTreeSet<Curve>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<Curve>().map_err(AppError::Validation))
        .collect()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /reports/losses
async fn get_losses(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Result<Json<ReportPage>, ApiError> {
    run_report(&state, ReportKind::Loss, &auth_user, query).await
}

/// GET /reports/rupture/curve
async fn get_rupture_by_curve(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Result<Json<ReportPage>, ApiError> {
    run_report(&state, ReportKind::RuptureByCurve, &auth_user, query).await
}

/// GET /reports/rupture/forecast
async fn get_rupture_forecast(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Result<Json<ReportPage>, ApiError> {
    run_report(&state, ReportKind::RuptureForecast, &auth_user, query).await
}

/// GET /reports/dre
async fn get_dre(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Result<Json<ReportPage>, ApiError> {
    run_report(&state, ReportKind::Dre, &auth_user, query).await
}

async fn run_report(
    state: &AppState,
    kind: ReportKind,
    auth_user: &AuthUser,
    query: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Result<Json<ReportPage>, ApiError> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let request = params.into_request(
        Utc::now().date_naive(),
        state.reports.config().default_page_size,
    )?;

    debug!(kind = %kind, role = auth_user.role(), "Report requested");

    let page = state.reports.run(kind, &auth_user.caller(), &request).await?;
    Ok(Json(page))
}
