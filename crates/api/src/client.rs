//! Bank REST API client
//!
//! The client owns one transport for its whole session and a bearer token
//! that is checked before every attempt of a data call, including retried
//! ones, and refreshed once it gets within five minutes of expiry. Login
//! failures are never retried.

use std::sync::Arc;
use std::time::Duration;

use bankrecon_common::Credentials;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::endpoints;
use crate::error::{ApiError, ApiResult};
use crate::retry::{HttpRetryPolicy, AUTH_MAX_RETRIES, DATA_MAX_RETRIES};
use crate::token::{Clock, SystemClock, Token};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Client lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Unauthenticated,
    Authenticated(Token),
    Closed,
}

pub struct ApiClient<T: Transport = ReqwestTransport> {
    base_url: String,
    credentials: Credentials,
    transport: Option<T>,
    state: Mutex<ClientState>,
    auth_retry: HttpRetryPolicy,
    data_retry: HttpRetryPolicy,
    clock: Arc<dyn Clock>,
}

impl ApiClient<ReqwestTransport> {
    /// Client over a pooled reqwest transport with the given request timeout
    pub fn connect(base_url: &str, credentials: Credentials, timeout: Duration) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::new(base_url, credentials, transport))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(base_url: &str, credentials: Credentials, transport: T) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        debug!("API client initialized for {}", base_url);
        Self {
            base_url,
            credentials,
            transport: Some(transport),
            state: Mutex::new(ClientState::Unauthenticated),
            auth_retry: HttpRetryPolicy::new(AUTH_MAX_RETRIES),
            data_retry: HttpRetryPolicy::new(DATA_MAX_RETRIES),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_retry_policies(mut self, auth: HttpRetryPolicy, data: HttpRetryPolicy) -> Self {
        self.auth_retry = auth;
        self.data_retry = data;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> ClientState {
        self.state.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.lock(), ClientState::Authenticated(_))
    }

    /// Release the transport. Further calls fail with [`ApiError::Closed`].
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("API client connection closed");
        }
        *self.state.get_mut() = ClientState::Closed;
    }

    fn transport(&self) -> ApiResult<&T> {
        self.transport.as_ref().ok_or(ApiError::Closed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and store a fresh token
    pub async fn authenticate(&mut self) -> ApiResult<()> {
        self.login().await.map(|_| ())
    }

    async fn login(&self) -> ApiResult<String> {
        if *self.state.lock() == ClientState::Closed {
            return Err(ApiError::Closed);
        }

        let url = self.url(endpoints::LOGIN);
        info!("Authenticating to {} as {}...", url, self.credentials.username);

        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        let username = self.credentials.username.clone();
        let transport = self.transport()?;

        let header = self
            .auth_retry
            .run("authenticate", move || {
                let request = HttpRequest::post(url.clone(), body.clone());
                let username = username.clone();
                async move {
                    let response = transport.send(request).await?;
                    if matches!(response.status, 401 | 403) {
                        error!("Authentication failed: invalid credentials for user {}", username);
                        return Err(ApiError::Authentication {
                            message: format!("Invalid credentials for user {}", username),
                            status: Some(response.status),
                        });
                    }
                    let response = check_status(response)?;
                    let payload: Value = response.json()?;
                    match payload.get("Authorization").and_then(Value::as_str) {
                        Some(header) if !header.is_empty() => Ok(header.to_string()),
                        _ => Err(ApiError::authentication(
                            "No Authorization header in login response",
                        )),
                    }
                }
            })
            .await?;

        let token = Token::from_authorization(&header, self.clock.now());
        let value = token.value().to_string();
        *self.state.lock() = ClientState::Authenticated(token);
        info!("Authentication successful (token expires in 1 hour)");
        Ok(value)
    }

    /// Current token value, logging in again when it is missing or about
    /// to expire
    pub async fn ensure_valid_token(&self) -> ApiResult<String> {
        let current = match &*self.state.lock() {
            ClientState::Closed => return Err(ApiError::Closed),
            ClientState::Authenticated(token) if token.is_usable_at(self.clock.now()) => {
                Some(token.value().to_string())
            }
            _ => None,
        };
        if let Some(value) = current {
            return Ok(value);
        }
        debug!("Token expired or missing, re-authenticating...");
        self.login().await
    }

    /// Every attempt re-checks the token, so a backoff that crosses the
    /// refresh buffer logs in again before the next request goes out.
    async fn fetch_json(&self, operation: &str, request: HttpRequest) -> ApiResult<Value> {
        self.data_retry
            .run(operation, || {
                let request = request.clone();
                async move {
                    let token = self.ensure_valid_token().await?;
                    let transport = self.transport()?;
                    let response =
                        check_status(transport.send(request.header("Authorization", token)).await?)?;
                    response.json::<Value>()
                }
            })
            .await
    }

    /// `GET /api/account`: the `Accounts` array of the response
    pub async fn list_accounts(&mut self) -> ApiResult<Vec<Value>> {
        let url = self.url(endpoints::ACCOUNTS);
        debug!("Fetching accounts from {}", url);

        let response = self.fetch_json("list_accounts", HttpRequest::get(url)).await?;
        let accounts = match response {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("Accounts") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        info!("Retrieved {} accounts from API", accounts.len());
        Ok(accounts)
    }

    /// `GET /api/account/{id}`
    pub async fn get_account_details(&mut self, account_id: &str) -> ApiResult<Value> {
        debug!("Fetching account details for {}", account_id);
        let url = self.url(&endpoints::account(account_id));
        self.fetch_json("get_account_details", HttpRequest::get(url))
            .await
    }

    /// Transactions for one account. Both bounds select the date-range
    /// query; otherwise the recent-activity query is used.
    pub async fn get_transactions(
        &mut self,
        account_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ApiResult<Vec<Value>> {
        let url = self.url(&endpoints::transactions(account_id));
        let request = match (start, end) {
            (Some(start), Some(end)) => {
                debug!("Fetching transactions for {} from {} to {}", account_id, start, end);
                HttpRequest::post(
                    url,
                    json!({
                        "startDate": start.format("%Y-%m-%d").to_string(),
                        "endDate": end.format("%Y-%m-%d").to_string(),
                    }),
                )
            }
            _ => {
                debug!("Fetching recent transactions for {}", account_id);
                HttpRequest::get(url)
            }
        };

        let response = self.fetch_json("get_transactions", request).await?;
        let transactions = unwrap_transactions(response);
        info!(
            "Retrieved {} transactions for account {}",
            transactions.len(),
            account_id
        );
        Ok(transactions)
    }
}

impl<T: Transport> Drop for ApiClient<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_status(response: HttpResponse) -> ApiResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::status(response.status, &response.body))
    }
}

/// Extract the transaction list from either response shape. The first key
/// in [`endpoints::TRANSACTION_KEYS`] holding a non-empty list wins; a bare
/// list is returned unchanged.
pub fn unwrap_transactions(response: Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => endpoints::TRANSACTION_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) if !items.is_empty() => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_policy, ScriptedTransport};
    use crate::token::ManualClock;
    use crate::transport::{Method, TransportError};
    use chrono::{TimeZone, Utc};

    fn client(transport: ScriptedTransport) -> (ApiClient<ScriptedTransport>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let client = ApiClient::new(
            "https://bank.test/",
            Credentials::new("admin", "admin"),
            transport,
        )
        .with_retry_policies(fast_policy(AUTH_MAX_RETRIES), fast_policy(DATA_MAX_RETRIES))
        .with_clock(clock.clone());
        (client, clock)
    }

    const LOGIN_OK: &str = r#"{"Authorization": "Bearer tok-1"}"#;

    #[test]
    fn test_unwrap_transactions_fallback_order() {
        let both = json!({"transactions": [1], "lastTenTransactions": [2]});
        assert_eq!(unwrap_transactions(both), vec![json!(1)]);

        let empty_first = json!({"transactions": [], "lastTenTransactions": [2]});
        assert_eq!(unwrap_transactions(empty_first), vec![json!(2)]);

        let pascal = json!({"Transactions": [3]});
        assert_eq!(unwrap_transactions(pascal), vec![json!(3)]);

        assert_eq!(unwrap_transactions(json!([4, 5])).len(), 2);
        assert!(unwrap_transactions(json!({"other": [1]})).is_empty());
        assert!(unwrap_transactions(json!("text")).is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_stores_stripped_token() {
        let transport = ScriptedTransport::new().respond(200, LOGIN_OK);
        let (mut client, _) = client(transport);

        client.authenticate().await.unwrap();
        assert!(client.is_authenticated());

        let requests = client.transport().unwrap().requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].url, "https://bank.test/api/login");
        assert_eq!(
            requests[0].body,
            Some(json!({"username": "admin", "password": "admin"}))
        );
    }

    #[tokio::test]
    async fn test_login_rejection_is_not_retried() {
        let transport = ScriptedTransport::new().respond(401, "denied").respond(200, LOGIN_OK);
        let (mut client, _) = client(transport);

        let err = client.authenticate().await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(client.transport().unwrap().requests().len(), 1);
        assert_eq!(client.state(), ClientState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_server_error_is_retried() {
        let transport = ScriptedTransport::new()
            .respond(500, "oops")
            .respond(200, LOGIN_OK);
        let (mut client, _) = client(transport);

        client.authenticate().await.unwrap();
        assert_eq!(client.transport().unwrap().requests().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_authorization_field() {
        let transport = ScriptedTransport::new().respond(200, r#"{"success": true}"#);
        let (mut client, _) = client(transport);
        assert!(client.authenticate().await.unwrap_err().is_authentication());
    }

    #[tokio::test]
    async fn test_data_call_logs_in_lazily_and_sends_raw_token() {
        let transport = ScriptedTransport::new()
            .respond(200, LOGIN_OK)
            .respond(200, r#"{"Accounts": [{"id": "800002"}, {"id": "800003"}]}"#);
        let (mut client, _) = client(transport);

        let accounts = client.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);

        let requests = client.transport().unwrap().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "https://bank.test/api/account");
        assert_eq!(
            requests[1].headers,
            vec![("Authorization".to_string(), "tok-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_token_refreshed_inside_buffer() {
        let transport = ScriptedTransport::new()
            .respond(200, LOGIN_OK)
            .respond(200, r#"{"accountId": "1"}"#)
            .respond(200, r#"{"accountId": "1"}"#)
            .respond(200, r#"{"Authorization": "Bearer tok-2"}"#)
            .respond(200, r#"{"accountId": "1"}"#);
        let (mut client, clock) = client(transport);

        client.get_account_details("1").await.unwrap();
        clock.advance(3000);
        client.get_account_details("1").await.unwrap();
        clock.advance(301);
        client.get_account_details("1").await.unwrap();

        let requests = client.transport().unwrap().requests();
        let logins = requests
            .iter()
            .filter(|r| r.url.ends_with("/api/login"))
            .count();
        assert_eq!(logins, 2);
        assert_eq!(
            requests[4].headers,
            vec![("Authorization".to_string(), "tok-2".to_string())]
        );
    }

    /// Each backoff wait moves the manual clock forward by a fixed step
    struct SteppingSleeper {
        clock: Arc<ManualClock>,
        step_secs: i64,
    }

    #[async_trait::async_trait]
    impl bankrecon_common::Sleeper for SteppingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.clock.advance(self.step_secs);
        }
    }

    #[tokio::test]
    async fn test_retry_after_backoff_refreshes_expiring_token() {
        let transport = ScriptedTransport::new()
            .respond(200, LOGIN_OK)
            .respond(500, "busy")
            .respond(200, r#"{"Authorization": "Bearer tok-2"}"#)
            .respond(200, r#"{"accountId": "1"}"#);
        let (client, clock) = client(transport);
        let data = HttpRetryPolicy::new(DATA_MAX_RETRIES).with_sleeper(Arc::new(SteppingSleeper {
            clock: clock.clone(),
            step_secs: 20,
        }));
        let mut client = client.with_retry_policies(fast_policy(AUTH_MAX_RETRIES), data);

        client.authenticate().await.unwrap();
        // 310s of validity left: usable for the first attempt only
        clock.advance(3290);
        client.get_account_details("1").await.unwrap();

        let requests = client.transport().unwrap().requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(
            requests[1].headers,
            vec![("Authorization".to_string(), "tok-1".to_string())]
        );
        assert!(requests[2].url.ends_with("/api/login"));
        assert_eq!(
            requests[3].headers,
            vec![("Authorization".to_string(), "tok-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_range_query_uses_post_and_recent_uses_get() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 4, 15).unwrap();
        let transport = ScriptedTransport::new()
            .respond(200, LOGIN_OK)
            .respond(200, r#"{"transactions": [{"id": "t1"}]}"#)
            .respond(200, r#"{"lastTenTransactions": [{"id": "t2"}, {"id": "t3"}]}"#);
        let (mut client, _) = client(transport);

        let ranged = client
            .get_transactions("800002", Some(start), Some(end))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 1);
        let recent = client
            .get_transactions("800002", Some(start), None)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let requests = client.transport().unwrap().requests();
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(
            requests[1].body,
            Some(json!({"startDate": "2025-02-01", "endDate": "2025-04-15"}))
        );
        assert_eq!(requests[2].method, Method::Get);
        assert_eq!(requests[2].url, "https://bank.test/api/account/800002/transactions");
    }

    #[tokio::test]
    async fn test_data_call_retries_connect_errors() {
        let transport = ScriptedTransport::new()
            .respond(200, LOGIN_OK)
            .fail(TransportError::connect("refused"))
            .fail(TransportError::connect("refused"))
            .respond(200, r#"{"Accounts": []}"#);
        let (mut client, _) = client(transport);

        assert!(client.list_accounts().await.unwrap().is_empty());
        assert_eq!(client.transport().unwrap().requests().len(), 4);
    }

    #[tokio::test]
    async fn test_closed_client_refuses_calls() {
        let (mut client, _) = client(ScriptedTransport::new());
        client.close();
        assert_eq!(client.state(), ClientState::Closed);
        assert!(matches!(client.list_accounts().await, Err(ApiError::Closed)));
        assert!(matches!(client.authenticate().await, Err(ApiError::Closed)));
    }
}
