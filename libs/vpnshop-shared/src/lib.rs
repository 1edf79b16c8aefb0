use serde::{Deserialize, Serialize};

/// Wire format of the Platega merchant API.
pub mod platega {
    use super::*;

    pub const DEFAULT_BASE_URL: &str = "https://app.platega.io";
    pub const CREATE_TRANSACTION_PATH: &str = "/transaction/process";
    pub const TRANSACTION_PATH: &str = "/transaction";

    pub const MERCHANT_HEADER: &str = "X-MerchantId";
    pub const SECRET_HEADER: &str = "X-Secret";

    /// SBP QR code transfer.
    pub const METHOD_SBP_QR: i32 = 2;

    pub const STATUS_CONFIRMED: &str = "CONFIRMED";
    pub const STATUS_PENDING: &str = "PENDING";
    pub const STATUS_CANCELED: &str = "CANCELED";

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct PaymentDetails {
        pub amount: f64,
        pub currency: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateTransactionRequest {
        pub payment_method: i32,
        pub payment_details: PaymentDetails,
        pub description: String,
        #[serde(rename = "return")]
        pub return_url: String,
        pub failed_url: String,
        /// Merchant-side correlation value, echoed back in the callback.
        pub payload: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateTransactionResponse {
        #[serde(default)]
        pub redirect: Option<String>,
        #[serde(default)]
        pub redirect_url: Option<String>,
        #[serde(default)]
        pub transaction_id: Option<serde_json::Value>,
        #[serde(default)]
        pub id: Option<serde_json::Value>,
        #[serde(default)]
        pub status: Option<String>,
    }

    impl CreateTransactionResponse {
        /// `transactionId`, falling back to `id`.
        pub fn gateway_transaction_id(&self) -> Option<String> {
            self.transaction_id
                .as_ref()
                .and_then(id_to_string)
                .or_else(|| self.id.as_ref().and_then(id_to_string))
        }

        /// Hosted payment page, whichever field the gateway filled in.
        pub fn payment_url(&self) -> Option<&str> {
            non_blank(self.redirect.as_deref()).or_else(|| non_blank(self.redirect_url.as_deref()))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TransactionStatusResponse {
        #[serde(default)]
        pub id: Option<serde_json::Value>,
        #[serde(default)]
        pub status: Option<String>,
        #[serde(default)]
        pub payload: Option<String>,
    }

    /// Body of the webhook the gateway posts when a transaction settles.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CallbackPayload {
        #[serde(default)]
        pub id: Option<serde_json::Value>,
        #[serde(default)]
        pub status: Option<String>,
        #[serde(default)]
        pub payload: Option<String>,
        #[serde(default)]
        pub amount: Option<serde_json::Value>,
        #[serde(default)]
        pub currency: Option<String>,
        #[serde(default)]
        pub payment_method: Option<serde_json::Value>,
    }

    impl CallbackPayload {
        /// Gateway transaction id; the gateway sends it as a string, older
        /// integrations as a number.
        pub fn transaction_id(&self) -> Option<String> {
            id_to_string(self.id.as_ref()?)
        }
    }

    fn non_blank(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    fn id_to_string(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
