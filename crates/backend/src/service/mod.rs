use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use membermap_shared::protocol::{
    AddressesData, AddressesResponse, PersonData, PersonResponse, ServiceResponse,
    MSG_INVALID_ID, MSG_INVALID_OPERATION, MSG_INVALID_PAGE, MSG_MISSING_NAME,
    MSG_NAME_TOO_SHORT, OP_GET_ADDRESSES, OP_UPDATE_PERSON_NAME,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::aggregator::AddressAggregator;
use crate::directory::DirectoryClient;
use crate::storage::GeocodeCache;

/// Request problems caught before anything remote is contacted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", MSG_INVALID_PAGE)]
    InvalidPage,
    #[error("{}", MSG_INVALID_ID)]
    InvalidId,
    #[error("{}", MSG_MISSING_NAME)]
    MissingName,
    #[error("{}", MSG_NAME_TOO_SHORT)]
    NameTooShort,
}

pub fn parse_page(raw: Option<&str>) -> Result<u32, ValidationError> {
    match raw.map(str::parse::<u32>) {
        Some(Ok(page)) if page > 0 => Ok(page),
        _ => Err(ValidationError::InvalidPage),
    }
}

pub fn parse_member_id(raw: Option<&str>) -> Result<&str, ValidationError> {
    match raw {
        Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => Ok(id),
        _ => Err(ValidationError::InvalidId),
    }
}

/// Split a full name into (first, last). The last word is the last name; all
/// earlier words, single-space joined, are the first name.
pub fn split_full_name(full_name: &str) -> Result<(String, String), ValidationError> {
    let mut words: Vec<&str> = full_name.split_whitespace().collect();
    if words.len() < 2 {
        return Err(ValidationError::NameTooShort);
    }
    let last = words.pop().unwrap_or_default().to_string();
    Ok((words.join(" "), last))
}

/// The two operations exposed to the browser.
pub struct ServiceProtocol {
    aggregator: AddressAggregator,
    directory: Arc<dyn DirectoryClient>,
    page_size: u32,
}

impl ServiceProtocol {
    pub fn new(
        aggregator: AddressAggregator,
        directory: Arc<dyn DirectoryClient>,
        page_size: u32,
    ) -> Self {
        ServiceProtocol {
            aggregator,
            directory,
            page_size,
        }
    }

    pub async fn get_addresses(&self, page: Option<&str>) -> AddressesResponse {
        let page = match parse_page(page) {
            Ok(page) => page,
            Err(e) => return ServiceResponse::error(e.to_string()),
        };

        match self.aggregator.run_page(page, self.page_size).await {
            Ok(result) => {
                let data_count = result.data_count();
                ServiceResponse::paged(
                    AddressesData {
                        addresses: result.groups,
                    },
                    data_count,
                    result.page,
                    result.api_count,
                )
            }
            Err(e) => {
                error!(page, error = %e, "directory page could not be loaded");
                ServiceResponse::error(e.to_string())
            }
        }
    }

    pub async fn update_person_name(&self, id: Option<&str>, name: Option<&str>) -> PersonResponse {
        let id = match parse_member_id(id) {
            Ok(id) => id,
            Err(e) => return ServiceResponse::error(e.to_string()),
        };
        let Some(name) = name else {
            return ServiceResponse::error(ValidationError::MissingName.to_string());
        };
        let (first_name, last_name) = match split_full_name(name) {
            Ok(parts) => parts,
            Err(e) => return ServiceResponse::error(e.to_string()),
        };

        let mut member = match self.directory.get_editable_member(id).await {
            Ok(member) => member,
            Err(e) => {
                warn!(member_id = id, error = %e, "member could not be loaded for editing");
                return ServiceResponse::error(e.to_string());
            }
        };
        member.set_name(&first_name, &last_name);

        match self.directory.save_member(member).await {
            Ok(saved) => {
                info!(member_id = id, "member name updated");
                ServiceResponse::ok(
                    PersonData {
                        person: saved.simple_person(),
                    },
                    1,
                )
            }
            Err(e) => {
                warn!(member_id = id, error = %e, "directory rejected name update");
                ServiceResponse::error(e.to_string())
            }
        }
    }

    /// Route a request to the operation named by its `o` parameter.
    pub async fn dispatch(&self, params: &HashMap<String, String>) -> Response {
        let param = |name: &str| params.get(name).map(String::as_str);
        match param("o") {
            Some(OP_GET_ADDRESSES) => Json(self.get_addresses(param("page")).await).into_response(),
            Some(OP_UPDATE_PERSON_NAME) => {
                Json(self.update_person_name(param("id"), param("name")).await).into_response()
            }
            _ => Json(ServiceResponse::<()>::error(MSG_INVALID_OPERATION)).into_response(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ServiceProtocol>,
    pub cache: Arc<GeocodeCache>,
}

pub async fn services_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.service.dispatch(&params).await
}

/// POST accepts a form body; an `o` in the query string still wins.
pub async fn services_post(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let params = if query.contains_key("o") {
        query
    } else {
        form.map(|Form(body)| body).unwrap_or_default()
    };
    state.service.dispatch(&params).await
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    cache_entries: u64,
    db_size_bytes: u64,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.cache.len().and_then(|cache_entries| {
        Ok(HealthReport {
            cache_entries,
            db_size_bytes: state.cache.db_size_bytes()?,
        })
    });
    match report {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "geocode cache health check failed");
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
