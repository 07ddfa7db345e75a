//! Quotation CRUD and payment history.

use std::str::FromStr;

use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use log::info;
use serde::Deserialize;
use strum::VariantNames;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{JsonBody, PathParam, QueryParams};
use super::{created, ok, AppState, SharedState};
use crate::core::api::database::{self, QuotationGetRequest, QuotationOrdering, MAX_LIMIT};
use crate::core::models::{Quotation, QuotationPatch, QuoteStatus};
use crate::core::quotes::QuotationRequest;

/// Load a quotation or answer 404.
pub(super) async fn find_quotation(state: &AppState, id: Uuid) -> Result<Quotation, ApiError> {
    database::quotation_get(&state.database, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quotation not found: {}", id)))
}

pub async fn create_quotation(
    State(state): State<SharedState>,
    JsonBody(request): JsonBody<QuotationRequest>,
) -> Result<Response, ApiError> {
    let today = Utc::now().date_naive();
    let new = request
        .into_new_quotation(&state.catalog, &state.quotes, today)
        .map_err(ApiError::Validation)?;

    let quotation = database::quotations_post(&state.database, &new).await?;
    info!(
        "Created quotation {} ({}) for {}",
        quotation.quote_number, quotation.id, quotation.customer.email
    );
    Ok(created(quotation))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    email: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    order: Option<String>,
}

impl ListQuery {
    fn into_request(self) -> Result<QuotationGetRequest, ApiError> {
        let status = match self.status.as_deref() {
            Some(s) => Some(QuoteStatus::from_str(s).map_err(|_| {
                ApiError::BadRequest(format!(
                    "Unknown status: {}. Expected one of: {}",
                    s,
                    QuoteStatus::VARIANTS.join(", ")
                ))
            })?),
            None => None,
        };
        let order = match self.order.as_deref() {
            Some(o) => Some(QuotationOrdering::from_str(o).map_err(|_| {
                ApiError::BadRequest(format!(
                    "Unknown order: {}. Expected one of: {}",
                    o,
                    QuotationOrdering::VARIANTS.join(", ")
                ))
            })?),
            None => None,
        };
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(ApiError::BadRequest(format!(
                    "limit must be between 1 and {}",
                    MAX_LIMIT
                )));
            }
        }

        Ok(QuotationGetRequest {
            status,
            customer_email: self
                .email
                .map(|email| email.trim().to_owned())
                .filter(|email| !email.is_empty()),
            order,
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        })
    }
}

pub async fn list_quotations(
    State(state): State<SharedState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Response, ApiError> {
    let params = query.into_request()?;
    let quotations = database::quotations_get(&state.database, &params).await?;
    Ok(ok(quotations))
}

pub async fn get_quotation(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    Ok(ok(find_quotation(&state, id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdate {
    status: QuoteStatus,
}

/// Quotations only move forward, or to `void`. Setting the current status
/// again is a no-op.
pub async fn update_status(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Result<Response, ApiError> {
    let current = find_quotation(&state, id).await?;
    if current.status == update.status {
        return Ok(ok(current));
    }
    if !current.status.can_transition_to(update.status) {
        return Err(ApiError::Conflict(format!(
            "Quotation {} cannot move from {} to {}",
            current.quote_number, current.status, update.status
        )));
    }

    let quotation =
        database::quotations_patch(&state.database, id, &QuotationPatch::status(update.status))
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Quotation not found: {}", id)))?;
    info!("Quotation {} is now {}", quotation.quote_number, quotation.status);
    Ok(ok(quotation))
}

pub async fn list_payments(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    find_quotation(&state, id).await?;
    let payments = database::payments_get(&state.database, id).await?;
    Ok(ok(payments))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use httpmock::{
        Method::{GET, PATCH, POST},
        MockServer,
    };
    use serde_json::json;

    use super::super::tests::{call, get, post_json, request, test_state};
    use crate::core::models::tests::{quotation_json, QUOTATION_ID};

    #[tokio::test]
    async fn test_create_quotation() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/quotations")
                .header("Authorization", "Bearer JWT")
                .body_contains("\"status\":\"draft\"")
                .body_contains("\"subtotal_cents\":429800")
                .body_contains("\"tax_cents\":35459")
                .body_contains("\"total_cents\":515259");
            then.status(201)
                .header("Content-Type", "application/json")
                .json_body(json!([quotation_json("draft")]));
        });

        let (status, body) = call(
            test_state(&server),
            post_json(
                "/quotations",
                &json!({
                    "customer": {
                        "name": "Rosa Diaz",
                        "company": "Diaz Greenhouses",
                        "email": "rosa@example.com"
                    },
                    "items": [{"sku": "DS-EC-7000", "quantity": 2}],
                    "installation_cents": 50000
                }),
            ),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], QUOTATION_ID);
    }

    #[tokio::test]
    async fn test_create_quotation_validation_details() {
        let server = MockServer::start();
        let (status, body) = call(
            test_state(&server),
            post_json(
                "/quotations",
                &json!({
                    "customer": {"name": "Rosa Diaz", "email": "rosa"},
                    "items": [{"sku": "DS-NOPE", "quantity": 1}]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Validation failed");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"customer.email"));
        assert!(fields.contains(&"items[0].sku"));
    }

    #[tokio::test]
    async fn test_create_quotation_malformed_json() {
        let server = MockServer::start();
        let (status, body) = call(
            test_state(&server),
            request(Method::POST, "/quotations", Body::from("{not json")),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_quotations_filters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/quotations")
                .query_param("status", "eq.sent")
                .query_param("customer->>email", "eq.rosa@example.com")
                .query_param("order", "total_cents.desc")
                .query_param("limit", "5");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([quotation_json("sent")]));
        });

        let (status, body) = call(
            test_state(&server),
            get("/quotations?status=sent&email=rosa@example.com&order=total_cents.desc&limit=5"),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["status"], "sent");
    }

    #[tokio::test]
    async fn test_list_quotations_bad_params() {
        let server = MockServer::start();
        let state = test_state(&server);

        let (status, body) = call(state.clone(), get("/quotations?status=lost")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Unknown status: lost"));

        let (status, _) = call(state.clone(), get("/quotations?limit=500")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(state.clone(), get("/quotations?limit=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "limit must be between 1 and 100");

        let (status, _) = call(state, get("/quotations?limit=ten")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_quotation() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/quotations")
                .query_param("id", format!("eq.{}", QUOTATION_ID).as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([quotation_json("draft")]));
        });

        let (status, body) =
            call(test_state(&server), get(&format!("/quotations/{}", QUOTATION_ID))).await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["quote_number"], "DS-20210503-4F2A");
    }

    #[tokio::test]
    async fn test_get_quotation_not_found() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/rest/v1/quotations");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([]));
        });

        let (status, body) =
            call(test_state(&server), get(&format!("/quotations/{}", QUOTATION_ID))).await;

        mock.assert();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["error"],
            format!("Quotation not found: {}", QUOTATION_ID)
        );
    }

    #[tokio::test]
    async fn test_invalid_uuid_is_bad_request() {
        let server = MockServer::start();
        let (status, body) = call(test_state(&server), get("/quotations/not-a-uuid")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_database_failure_is_500() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/rest/v1/quotations");
            then.status(503).body("upstream down");
        });

        let (status, body) =
            call(test_state(&server), get(&format!("/quotations/{}", QUOTATION_ID))).await;

        mock.assert();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_list_quotations_trims_email() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/quotations")
                .query_param("customer->>email", "eq.rosa@example.com");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([]));
        });

        let (status, _) = call(
            test_state(&server),
            get("/quotations?email=%20rosa@example.com%20"),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_quotation_huge_price_is_bad_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/rest/v1/quotations");
            then.status(201);
        });

        let (status, body) = call(
            test_state(&server),
            post_json(
                "/quotations",
                &json!({
                    "customer": {"name": "Rosa Diaz", "email": "rosa@example.com"},
                    "items": [{
                        "sku": "DS-EC-4500",
                        "quantity": 1000,
                        "unit_price_cents": 100_000_000_000_000u64
                    }]
                }),
            ),
        )
        .await;

        mock.assert_hits(0);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "items[0].unit_price_cents");
    }

    fn mock_current<'a>(server: &'a MockServer, status: &str) -> httpmock::Mock<'a> {
        let body = json!([quotation_json(status)]);
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/quotations")
                .query_param("id", format!("eq.{}", QUOTATION_ID).as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body);
        })
    }

    #[tokio::test]
    async fn test_update_status_backwards_is_conflict() {
        let server = MockServer::start();
        let _current = mock_current(&server, "paid");
        let patch = server.mock(|when, then| {
            when.method(PATCH).path("/rest/v1/quotations");
            then.status(200);
        });

        let (status, body) = call(
            test_state(&server),
            request(
                Method::PATCH,
                &format!("/quotations/{}/status", QUOTATION_ID),
                Body::from(r#"{"status":"draft"}"#),
            ),
        )
        .await;

        patch.assert_hits(0);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["error"],
            "Quotation DS-20210503-4F2A cannot move from paid to draft"
        );
    }

    #[tokio::test]
    async fn test_update_status_out_of_void_is_conflict() {
        let server = MockServer::start();
        let _current = mock_current(&server, "void");

        let (status, _) = call(
            test_state(&server),
            request(
                Method::PATCH,
                &format!("/quotations/{}/status", QUOTATION_ID),
                Body::from(r#"{"status":"accepted"}"#),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_status_same_value_is_noop() {
        let server = MockServer::start();
        let current = mock_current(&server, "sent");
        let patch = server.mock(|when, then| {
            when.method(PATCH).path("/rest/v1/quotations");
            then.status(200);
        });

        let (status, body) = call(
            test_state(&server),
            request(
                Method::PATCH,
                &format!("/quotations/{}/status", QUOTATION_ID),
                Body::from(r#"{"status":"sent"}"#),
            ),
        )
        .await;

        current.assert();
        patch.assert_hits(0);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "sent");
    }

    #[tokio::test]
    async fn test_update_status() {
        let server = MockServer::start();
        let current = mock_current(&server, "sent");
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/quotations")
                .query_param("id", format!("eq.{}", QUOTATION_ID).as_str())
                .json_body(json!({"status": "accepted"}));
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([quotation_json("accepted")]));
        });

        let (status, body) = call(
            test_state(&server),
            request(
                Method::PATCH,
                &format!("/quotations/{}/status", QUOTATION_ID),
                Body::from(r#"{"status":"accepted"}"#),
            ),
        )
        .await;

        current.assert();
        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "accepted");
    }

    #[tokio::test]
    async fn test_update_status_unknown_value() {
        let server = MockServer::start();
        let (status, _) = call(
            test_state(&server),
            request(
                Method::PATCH,
                &format!("/quotations/{}/status", QUOTATION_ID),
                Body::from(r#"{"status":"lost"}"#),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_payments() {
        let server = MockServer::start();
        let quotation = server.mock(|when, then| {
            when.method(GET).path("/rest/v1/quotations");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([quotation_json("paid")]));
        });
        let payments = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/payments")
                .query_param("quotation_id", format!("eq.{}", QUOTATION_ID).as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([{
                    "id": "1415fe36-851f-4c62-a616-4f5e343ba5fc",
                    "quotation_id": QUOTATION_ID,
                    "invoice_id": "inv_1",
                    "event_id": "evt_1",
                    "amount_cents": 515259,
                    "status": "paid",
                    "received_at": "2021-05-20T16:00:00+00:00"
                }]));
        });

        let (status, body) = call(
            test_state(&server),
            get(&format!("/quotations/{}/payments", QUOTATION_ID)),
        )
        .await;

        quotation.assert();
        payments.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["amount_cents"], 515_259);
    }
}
