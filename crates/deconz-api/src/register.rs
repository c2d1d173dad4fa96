// API key registration
//
// `POST /api` asks the gateway for a new API key. The gateway only grants one
// while it is unlocked ("Authenticate app" in Phoscon), so a 403 is an
// expected outcome rather than a failure.

use serde_json::{Value, json};
use tracing::debug;

use crate::client::{base_url, decode};
use crate::error::Error;
use crate::models::{Registration, ReplyItem, error_description};
use crate::transport::TransportConfig;

/// Request a new API key from the gateway at `host:port`.
pub async fn register(
    transport: &TransportConfig,
    host: &str,
    port: u16,
    device_type: &str,
) -> Result<Registration, Error> {
    let http = transport.build_client()?;
    let url = base_url(host, port)?.join("api")?;
    debug!(%url, device_type, "requesting API key");

    let resp = http
        .post(url)
        .json(&json!({ "devicetype": device_type }))
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    match status.as_u16() {
        200 => {
            let items: Vec<ReplyItem> = decode(&body)?;
            items
                .into_iter()
                .find_map(|item| item.success)
                .and_then(|success| {
                    success
                        .get("username")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .map(|api_key| Registration::Granted { api_key })
                .ok_or_else(|| Error::Deserialization {
                    message: "registration reply carries no username".into(),
                    body,
                })
        }
        403 => Ok(Registration::AuthorizationRequired),
        404 => Err(Error::NotAccessible),
        code => Err(Error::Gateway {
            status: code,
            message: error_description(&body).unwrap_or_else(|| status.to_string()),
        }),
    }
}
