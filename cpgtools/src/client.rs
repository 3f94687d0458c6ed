use anyhow::{anyhow, Result};
use conference_payment_engine::{
    db_types::PaymentOption,
    order_objects::{PaymentSummary, SweepResult},
};
use conference_payment_server::{
    auth::ACCESS_TOKEN_HEADER,
    data_objects::{JsonResponse, OrderStatusResponse},
};
use ecpay_tools::TradeParams;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
    StatusCode,
};
use serde::de::DeserializeOwned;

/// A thin HTTP client for the conference payment server's API.
pub struct PaymentServerClient {
    client: Client,
    server: String,
    access_token: String,
}

impl PaymentServerClient {
    pub fn new(server: &str, access_token: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Conference Payment Server Client")
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow!("Failed to create the HTTP client. {e}"))?;
        Ok(Self { client, server: server.trim_end_matches('/').to_string(), access_token })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.server, path.trim_start_matches('/'))
    }

    pub async fn health(&self) -> Result<String> {
        let res = self.client.get(self.url("/health")).send().await?;
        Ok(res.text().await?)
    }

    pub async fn check_token(&self) -> Result<JsonResponse> {
        self.auth_get_request("/api/check_token").await
    }

    pub async fn payment_options(&self) -> Result<Vec<PaymentOption>> {
        self.auth_get_request("/api/payment_options").await
    }

    pub async fn my_orders(&self) -> Result<PaymentSummary> {
        self.auth_get_request("/api/orders").await
    }

    pub async fn orders_for(&self, user_id: &str) -> Result<PaymentSummary> {
        self.auth_get_request(&format!("/api/orders/{}", urlencoding::encode(user_id))).await
    }

    pub async fn query_payment(&self, trade_no: &str) -> Result<OrderStatusResponse> {
        self.auth_get_request(&format!("/api/payment/query/{trade_no}")).await
    }

    /// Reconciles every outstanding order, or only those of `user_id` if given.
    pub async fn reconcile(&self, user_id: Option<&str>) -> Result<SweepResult> {
        let path = match user_id {
            Some(id) => format!("/api/payment/reconcile/{}", urlencoding::encode(id)),
            None => "/api/payment/reconcile".to_string(),
        };
        self.auth_post_request(&path).await
    }

    /// Posts a payment result notification to `/gateway/callback`, the way the gateway would. The parameters must
    /// already be signed. Returns the server's acknowledgement text.
    pub async fn send_callback(&self, params: &TradeParams) -> Result<String> {
        let body = params.to_urlencoded();
        debug!("Sending notification: {body}");
        let res = self
            .client
            .post(self.url("/gateway/callback"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(anyhow!("The server rejected the notification: {}, {text}.", status.as_u16()))
        }
    }

    async fn auth_get_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let res =
            self.client.get(self.url(path)).header(ACCESS_TOKEN_HEADER, self.access_token.clone()).send().await?;
        Self::parse_response(path, res).await
    }

    async fn auth_post_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let res =
            self.client.post(self.url(path)).header(ACCESS_TOKEN_HEADER, self.access_token.clone()).send().await?;
        Self::parse_response(path, res).await
    }

    async fn parse_response<T: DeserializeOwned>(path: &str, res: reqwest::Response) -> Result<T> {
        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            code => {
                let msg = res.text().await?;
                Err(anyhow!("Error fetching {path}: {}, {msg}.", code.as_u16()))
            },
        }
    }
}
