use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, Uri, header},
    response::Response,
    routing::get,
};
use tracing::{error, info};

use corpreg_auth::{Action, CallerIdentity, verify_user};
use corpreg_companies::{CompanyDraft, CompanyFilter};
use corpreg_core::CompanyId;

use crate::app::envelope::Payload;
use crate::app::errors::ApiError;
use crate::app::services::AppState;
use crate::context::RequestContext;
use crate::executor::execute;

const INCORRECT_PARAMS: &str = "incorrect params";
const ID_REQUIRED: &str = "company id required";
const GLOBAL_ERROR: &str = "global error";
const SERVER_ERROR: &str = "server error";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route(
            "/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
}

pub async fn list_companies(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    uri: Uri,
) -> Response {
    let cancel = ctx.cancel_token().clone();
    execute(&ctx, async move {
        let Query(filter) = Query::<CompanyFilter>::try_from_uri(&uri).map_err(|e| {
            error!(method = "GetCompanies", error = %e, "Failed to decode query params");
            ApiError::BadRequest(INCORRECT_PARAMS)
        })?;

        let companies = state.companies.list(&cancel, &filter).await.map_err(|e| {
            error!(method = "GetCompanies", error = %e, "Failed to get companies");
            ApiError::from_service_masked(e, GLOBAL_ERROR)
        })?;
        Ok(Payload::Companies { companies })
    })
    .await
}

pub async fn get_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(raw_id): Path<String>,
) -> Response {
    let cancel = ctx.cancel_token().clone();
    execute(&ctx, async move {
        let id = parse_id(&raw_id, "GetCompany")?;

        let company = state.companies.get(&cancel, id).await.map_err(|e| {
            error!(method = "GetCompany", error = %e, "Failed to get company");
            ApiError::from_service_masked(e, GLOBAL_ERROR)
        })?;
        Ok(company.map_or(Payload::Empty, |company| Payload::Company { company }))
    })
    .await
}

/// Not identity- or region-gated.
pub async fn update_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Response {
    let cancel = ctx.cancel_token().clone();
    execute(&ctx, async move {
        let id = parse_id(&raw_id, "UpdateCompany")?;
        let draft = parse_draft(&body, "UpdateCompany")?;

        let company = state.companies.update(&cancel, id, draft).await.map_err(|e| {
            error!(method = "UpdateCompany", error = %e, "Failed to update company");
            ApiError::from_service(e)
        })?;
        Ok(Payload::Company { company })
    })
    .await
}

pub async fn create_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let handler_ctx = ctx.clone();
    execute(&ctx, async move {
        authorize(&state, &handler_ctx, &headers, Action::CreateCompany, "CreateCompany").await?;
        let draft = parse_draft(&body, "CreateCompany")?;

        let company = state
            .companies
            .create(handler_ctx.cancel_token(), draft)
            .await
            .map_err(|e| {
                error!(method = "CreateCompany", error = %e, "Failed to create company");
                ApiError::from_service_masked(e, SERVER_ERROR)
            })?;
        Ok(Payload::CompanyId {
            company_id: company.id,
        })
    })
    .await
}

pub async fn delete_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let handler_ctx = ctx.clone();
    execute(&ctx, async move {
        authorize(&state, &handler_ctx, &headers, Action::DeleteCompany, "DeleteCompany").await?;
        let id = parse_id(&raw_id, "DeleteCompany")?;

        state
            .companies
            .delete(handler_ctx.cancel_token(), id)
            .await
            .map_err(|e| {
                error!(method = "DeleteCompany", error = %e, "Failed to delete company");
                ApiError::from_service(e)
            })?;
        Ok(Payload::Empty)
    })
    .await
}

/// VerifyUser, then IsActionAllowed unless development mode bypasses it.
/// A failed region lookup is logged on its own and then treated as a denial.
async fn authorize(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    action: Action,
    method: &'static str,
) -> Result<CallerIdentity, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let caller = verify_user(state.tokens.as_ref(), authorization).map_err(|e| {
        error!(method, error = %e, "Failed to verify user");
        ApiError::Unauthorized
    })?;

    if state.dev_mode {
        return Ok(caller);
    }

    let remote_addr = ctx.remote_ip().map(|ip| ip.to_string()).unwrap_or_default();
    let allowed = match state.gate.is_action_allowed(action, &remote_addr).await {
        Ok(allowed) => allowed,
        Err(e) => {
            error!(method, remote_addr = %remote_addr, error = %e, "Failed to verify user location");
            false
        }
    };

    if !allowed {
        info!(
            method,
            remote_addr = %remote_addr,
            allowed_country = state.gate.allowed_country(),
            "Action is not allowed due to region restrictions"
        );
        return Err(ApiError::Unauthorized);
    }
    Ok(caller)
}

fn parse_id(raw: &str, method: &'static str) -> Result<CompanyId, ApiError> {
    raw.parse::<CompanyId>().map_err(|e| {
        error!(method, error = %e, "Failed to parse company id from request url");
        ApiError::BadRequest(ID_REQUIRED)
    })
}

fn parse_draft(body: &[u8], method: &'static str) -> Result<CompanyDraft, ApiError> {
    CompanyDraft::from_json_body(body).map_err(|e| {
        error!(method, error = %e, "Failed to decode request body");
        ApiError::BadRequest(INCORRECT_PARAMS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_unsigned_decimal() {
        assert_eq!(parse_id("12", "t").unwrap(), CompanyId::new(12));
        assert_eq!(
            parse_id("abc", "t").unwrap_err(),
            ApiError::BadRequest(ID_REQUIRED)
        );
        assert!(parse_id("-3", "t").is_err());
    }

    #[test]
    fn bodies_decode_leniently_but_reject_garbage() {
        let draft = parse_draft(br#"{"name":"Acme","extra":1}"#, "t").unwrap();
        assert_eq!(draft.name, "Acme");
        assert_eq!(parse_draft(b"", "t").unwrap(), CompanyDraft::default());
        assert_eq!(
            parse_draft(b"{not json", "t").unwrap_err(),
            ApiError::BadRequest(INCORRECT_PARAMS)
        );
    }
}
