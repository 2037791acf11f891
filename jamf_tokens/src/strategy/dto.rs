//! DTOs for interacting with the token authority

use jamf_clock::DurationSecs;
use serde::{Deserialize, Serialize, Serializer};

use crate::{AccessToken, ClientId, ClientSecret};

/// Client credentials
#[derive(Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

impl Serialize for ClientCredentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentials", 3)?;
        ser.serialize_field("client_id", &self.client_id)?;
        ser.serialize_field("client_secret", &self.client_secret)?;
        ser.serialize_field("grant_type", "client_credentials")?;
        ser.end()
    }
}

/// Response to a client credentials exchange
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OAuthTokenResponse {
    pub access_token: AccessToken,
    pub expires_in: DurationSecs,
}

/// Response to a username and password exchange or a keep-alive
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct SessionTokenResponse {
    pub token: AccessToken,
    pub expires: String,
}
