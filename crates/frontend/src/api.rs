use membermap_shared::models::SimplePerson;
use membermap_shared::protocol::{
    AddressesResponse, PersonResponse, ServiceResponse, OP_GET_ADDRESSES, OP_UPDATE_PERSON_NAME,
};

use crate::state::transport_failure_message;

const SERVICES_PATH: &str = "/services/";

/// Query parameters for one `getAddresses` page.
pub fn get_addresses_params(page: u32) -> Vec<(&'static str, String)> {
    vec![("o", OP_GET_ADDRESSES.to_string()), ("page", page.to_string())]
}

/// Form fields for an `updatePersonName` request.
pub fn update_person_name_params(id: &str, name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("o", OP_UPDATE_PERSON_NAME.to_string()),
        ("id", id.to_string()),
        ("name", name.to_string()),
    ]
}

/// Collapse an update answer into the new person or a message to show.
pub fn person_outcome(outcome: Result<PersonResponse, String>) -> Result<SimplePerson, String> {
    match outcome {
        Ok(ServiceResponse::Ok { data, .. }) => Ok(data.person),
        Ok(ServiceResponse::Error { message }) => Err(message),
        Err(detail) => Err(transport_failure_message(&detail)),
    }
}

fn services_url() -> Result<String, String> {
    let origin = web_sys::window()
        .ok_or("no window")?
        .location()
        .origin()
        .map_err(|_| "no origin".to_string())?;
    Ok(format!("{}{}", origin, SERVICES_PATH))
}

/// Fetch one page of address groups. `Err` holds the transport failure detail.
pub async fn get_addresses(page: u32) -> Result<AddressesResponse, String> {
    let resp = reqwest::Client::new()
        .get(services_url()?)
        .query(&get_addresses_params(page))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    resp.json().await.map_err(|e| e.to_string())
}

async fn post_update(id: &str, name: &str) -> Result<PersonResponse, String> {
    let resp = reqwest::Client::new()
        .post(services_url()?)
        .form(&update_person_name_params(id, name))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    resp.json().await.map_err(|e| e.to_string())
}

/// Send a name change for one person.
pub async fn update_person_name(id: &str, name: &str) -> Result<SimplePerson, String> {
    person_outcome(post_update(id, name).await)
}
