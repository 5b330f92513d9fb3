//! REST client for the telephony provider's account and number APIs.

use crate::error::TelephonyError;
use nexus_types::{NumberCapabilities, NumberStatus, PhoneNumber, ProviderNumber, TelephonyCredentials};
use serde::Deserialize;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Timeout for provider requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for number listings.
const PAGE_SIZE: u32 = 20;

/// Basic account details returned by credential validation.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSummary {
    pub sid: String,
    pub friendly_name: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct IncomingNumbersResponse {
    #[serde(default)]
    incoming_phone_numbers: Vec<WireIncomingNumber>,
}

#[derive(Debug, Deserialize)]
struct WireIncomingNumber {
    sid: String,
    phone_number: String,
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    iso_country: Option<String>,
    #[serde(default)]
    capabilities: WireCapabilities,
}

#[derive(Debug, Deserialize)]
struct AvailableNumbersResponse {
    #[serde(default)]
    available_phone_numbers: Vec<WireAvailableNumber>,
}

#[derive(Debug, Deserialize)]
struct WireAvailableNumber {
    phone_number: String,
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    iso_country: Option<String>,
    #[serde(default)]
    capabilities: WireCapabilities,
}

/// The provider spells capabilities with inconsistent casing (`voice`,
/// `SMS`, `MMS`).
#[derive(Debug, Default, Deserialize)]
struct WireCapabilities {
    #[serde(default)]
    voice: bool,
    #[serde(default, rename = "SMS")]
    sms: bool,
    #[serde(default, rename = "MMS")]
    mms: bool,
}

impl From<WireCapabilities> for NumberCapabilities {
    fn from(wire: WireCapabilities) -> Self {
        Self {
            voice: wire.voice,
            sms: wire.sms,
            mms: wire.mms,
        }
    }
}

fn owned_number(wire: WireIncomingNumber) -> PhoneNumber {
    PhoneNumber {
        id: wire.sid,
        number: wire.phone_number,
        country: wire.iso_country.unwrap_or_else(|| "US".to_string()),
        capabilities: wire.capabilities.into(),
        assigned_agent_id: None,
        status: NumberStatus::Active,
        friendly_name: wire.friendly_name,
    }
}

fn available_number(wire: WireAvailableNumber) -> ProviderNumber {
    ProviderNumber {
        friendly_name: wire
            .friendly_name
            .unwrap_or_else(|| wire.phone_number.clone()),
        phone_number: wire.phone_number,
        locality: wire.locality,
        region: wire.region,
        postal_code: wire.postal_code,
        iso_country: wire.iso_country.unwrap_or_else(|| "US".to_string()),
        capabilities: wire.capabilities.into(),
    }
}

/// REST client for the telephony provider.
#[derive(Debug, Clone)]
pub struct TelephonyClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for TelephonyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TelephonyClient {
    /// Creates a client against the provider's production API.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TelephonyError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TelephonyError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TelephonyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Validates credentials by fetching the account record.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError::Auth`] on bad credentials.
    pub async fn validate(
        &self,
        creds: &TelephonyCredentials,
    ) -> Result<AccountSummary, TelephonyError> {
        let url = format!("{}/Accounts/{}.json", self.base_url, creds.account_sid);
        let response = self
            .http
            .get(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Lists the phone numbers the account owns.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError`] on transport, auth, or API failure.
    pub async fn incoming_numbers(
        &self,
        creds: &TelephonyCredentials,
    ) -> Result<Vec<PhoneNumber>, TelephonyError> {
        let url = format!(
            "{}/Accounts/{}/IncomingPhoneNumbers.json?PageSize={}",
            self.base_url, creds.account_sid, PAGE_SIZE
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: IncomingNumbersResponse = response.json().await?;
        Ok(parsed
            .incoming_phone_numbers
            .into_iter()
            .map(owned_number)
            .collect())
    }

    /// Searches the marketplace for available local numbers.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError`] on transport, auth, or API failure.
    pub async fn search_available(
        &self,
        creds: &TelephonyCredentials,
        country: &str,
        area_code: Option<&str>,
    ) -> Result<Vec<ProviderNumber>, TelephonyError> {
        let mut url = format!(
            "{}/Accounts/{}/AvailablePhoneNumbers/{}/Local.json?PageSize={}",
            self.base_url, creds.account_sid, country, PAGE_SIZE
        );
        if let Some(area_code) = area_code {
            url.push_str(&format!("&AreaCode={area_code}"));
        }
        let response = self
            .http
            .get(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: AvailableNumbersResponse = response.json().await?;
        Ok(parsed
            .available_phone_numbers
            .into_iter()
            .map(available_number)
            .collect())
    }

    /// Purchases a number from the marketplace, returning the owned
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError`] on transport, auth, or API failure
    /// (including "number no longer available").
    pub async fn purchase(
        &self,
        creds: &TelephonyCredentials,
        phone_number: &str,
    ) -> Result<PhoneNumber, TelephonyError> {
        let url = format!(
            "{}/Accounts/{}/IncomingPhoneNumbers.json",
            self.base_url, creds.account_sid
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&[("PhoneNumber", phone_number)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let wire: WireIncomingNumber = response.json().await?;
        tracing::info!(number = %wire.phone_number, "purchased number");
        Ok(owned_number(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_number_maps_to_owned_record() {
        let wire: WireIncomingNumber = serde_json::from_value(serde_json::json!({
            "sid": "PN1",
            "phone_number": "+14155550101",
            "friendly_name": "(415) 555-0101",
            "iso_country": "US",
            "capabilities": { "voice": true, "SMS": true, "MMS": false }
        }))
        .expect("should deserialize");

        let number = owned_number(wire);
        assert_eq!(number.id, "PN1");
        assert_eq!(number.number, "+14155550101");
        assert!(number.capabilities.voice);
        assert!(number.capabilities.sms);
        assert!(!number.capabilities.mms);
        assert_eq!(number.status, NumberStatus::Active);
        assert_eq!(number.assigned_agent_id, None);
    }

    #[test]
    fn available_number_falls_back_to_e164_name() {
        let wire: WireAvailableNumber = serde_json::from_value(serde_json::json!({
            "phone_number": "+442071234567",
            "iso_country": "GB",
            "capabilities": { "voice": true }
        }))
        .expect("should deserialize");

        let number = available_number(wire);
        assert_eq!(number.friendly_name, "+442071234567");
        assert_eq!(number.iso_country, "GB");
        assert!(number.capabilities.voice);
        assert!(!number.capabilities.sms);
    }

    #[test]
    fn missing_capabilities_default_to_false() {
        let wire: WireIncomingNumber = serde_json::from_value(serde_json::json!({
            "sid": "PN2",
            "phone_number": "+15125550199"
        }))
        .expect("should deserialize");

        let number = owned_number(wire);
        assert!(!number.capabilities.voice);
        assert_eq!(number.country, "US");
    }
}
