use serde::{Deserialize, Serialize};

use crate::fleet::CreatedContainer;
use crate::fleet::control::ContainerStatus;

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateContainerResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub container: CreatedContainer,
}

#[derive(Debug, Default, Deserialize)]
pub struct CountryChangeRequest {
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountryChangeResponse {
    pub success: bool,
    pub message: String,
    pub status: ContainerStatus,
    /// False when the gateway accepted the country but no new public IP was observed in time.
    pub confirmed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextNameResponse {
    pub name: String,
}
