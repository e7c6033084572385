use anyhow::Context;
use serde_json::json;

use crate::Error;

/// Thin client for the external payment gateway. The gateway is an opaque
/// HTTP service; its JSON responses are relayed to the caller unmodified.
#[derive(Clone, Debug)]
pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
    callback_url: String,
    return_url: String,
}

/// Fields the gateway requires to start a transaction; all are mandatory.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct InitializePayment {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub amount: f64,
    pub currency: String,
    pub tx_ref: String,
}

impl InitializePayment {
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("currency", &self.currency),
            ("tx_ref", &self.tx_ref),
        ] {
            edir_api::validate_string(value).map_err(Error::Api)?;
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }
        Ok(())
    }
}

impl PaymentClient {
    pub fn new(
        base_url: String,
        secret: String,
        callback_url: String,
        return_url: String,
    ) -> PaymentClient {
        PaymentClient {
            http: reqwest::Client::new(),
            base_url,
            secret,
            callback_url,
            return_url,
        }
    }

    /// Reads `PAYMENT_*` environment variables, falling back to the hosted
    /// gateway defaults for everything but the secret.
    pub fn from_env() -> anyhow::Result<PaymentClient> {
        let base_url = std::env::var("PAYMENT_URL")
            .unwrap_or_else(|_| String::from("https://api.chapa.co/v1"));
        let secret =
            std::env::var("PAYMENT_SECRET").context("PAYMENT_SECRET must be set")?;
        let callback_url = std::env::var("PAYMENT_CALLBACK_URL")
            .unwrap_or_else(|_| String::from("http://localhost:5000/api/verify-payment/"));
        let return_url = std::env::var("PAYMENT_RETURN_URL")
            .unwrap_or_else(|_| String::from("http://localhost:3000/contributions/"));
        Ok(PaymentClient::new(base_url, secret, callback_url, return_url))
    }

    pub async fn initialize(&self, req: &InitializePayment) -> anyhow::Result<serde_json::Value> {
        let data = json!({
            "amount": req.amount,
            "currency": req.currency,
            "email": req.email,
            "first_name": req.first_name,
            "last_name": req.last_name,
            "tx_ref": req.tx_ref,
            "callback_url": format!("{}{}", self.callback_url, req.tx_ref),
            "return_url": format!("{}?tx_ref={}", self.return_url, req.tx_ref),
        });
        self.http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret)
            .json(&data)
            .send()
            .await
            .context("posting transaction initialization to the payment gateway")?
            .json()
            .await
            .context("parsing payment gateway response")
    }

    pub async fn verify(&self, tx_ref: &str) -> anyhow::Result<serde_json::Value> {
        self.http
            .get(format!("{}/transaction/verify/{}", self.base_url, tx_ref))
            .bearer_auth(&self.secret)
            .send()
            .await
            .with_context(|| format!("verifying transaction {:?} with the payment gateway", tx_ref))?
            .json()
            .await
            .context("parsing payment gateway response")
    }
}

#[cfg(test)]
mod tests {
    use edir_api::Error as ApiError;

    use super::*;

    fn request() -> InitializePayment {
        InitializePayment {
            email: String::from("abebe@example.com"),
            first_name: String::from("Abebe"),
            last_name: String::from("Bikila"),
            amount: 250.0,
            currency: String::from("ETB"),
            tx_ref: String::from("tx-0001"),
        }
    }

    #[test]
    fn accepts_complete_requests() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_blank_required_fields() {
        let mut req = request();
        req.currency = String::from("  ");
        match req.validate() {
            Err(Error::Api(ApiError::MissingField(field))) => assert_eq!(field, "currency"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }
}
