//! Extension message handler

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::types::*;
use quicklogin_core::{Background, LoginError};

/// Dispatches extension messages to the background.
///
/// Every message gets a reply; failures become `{success: false, ...}`
/// rather than errors. Messages are handled one at a time.
#[derive(Clone)]
pub struct RequestHandler {
    background: Arc<Mutex<Background>>,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(background: Arc<Mutex<Background>>) -> Self {
        Self { background }
    }

    /// Handle a raw JSON message
    pub async fn handle(&self, message: Value) -> Response {
        match serde_json::from_value::<Request>(message) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!("Rejected malformed message: {}", e);
                StatusResponse::failed(LoginError::InvalidRequest(e.to_string()).to_string()).into()
            }
        }
    }

    /// Handle a parsed request
    pub async fn dispatch(&self, request: Request) -> Response {
        debug!("Handling action: {}", request.action());

        let mut background = self.background.lock().await;

        match request {
            Request::SetMasterKey {
                master_key,
                session_timeout,
            } => {
                background.set_master_key(&master_key, session_timeout).await;
                StatusResponse::ok().into()
            }

            Request::GetMasterKey => Response::MasterKey(background.master_key_info().await),

            Request::ClearMasterKey => {
                let cleared = background.clear_master_key().await;
                StatusResponse {
                    success: cleared,
                    error: None,
                    id: None,
                }
                .into()
            }

            Request::GetDecryptedAccounts { url } => {
                match background.decrypted_accounts(&url).await {
                    Ok(accounts) => AccountsResponse {
                        success: Some(true),
                        accounts,
                        error: None,
                    }
                    .into(),
                    Err(e) => {
                        debug!("getDecryptedAccounts failed: {}", e);
                        AccountsResponse {
                            success: Some(false),
                            accounts: Vec::new(),
                            error: None,
                        }
                        .into()
                    }
                }
            }

            Request::GetAllDecryptedAccounts => match background.all_decrypted_accounts().await {
                Ok(accounts) => AccountsResponse {
                    success: Some(true),
                    accounts,
                    error: None,
                }
                .into(),
                Err(e) => {
                    error!("getAllDecryptedAccounts failed: {}", e);
                    AccountsResponse {
                        success: Some(false),
                        accounts: Vec::new(),
                        error: Some(e.to_string()),
                    }
                    .into()
                }
            },

            Request::GetAccounts => match background.stored_accounts().await {
                Ok(accounts) => AccountsResponse {
                    success: None,
                    accounts,
                    error: None,
                }
                .into(),
                Err(e) => {
                    error!("getAccounts failed: {}", e);
                    AccountsResponse {
                        success: None,
                        accounts: Vec::new(),
                        error: Some(e.to_string()),
                    }
                    .into()
                }
            },

            Request::CountMatchingAccounts { url } => {
                match background.count_matching_accounts(&url).await {
                    Ok(count) => Response::Count(CountResponse { count }),
                    Err(e) => failure("countMatchingAccounts", e),
                }
            }

            Request::SaveAccount { account } => match background.save_account(account).await {
                Ok(id) => StatusResponse {
                    success: true,
                    error: None,
                    id: Some(id),
                }
                .into(),
                Err(e) => failure("saveAccount", e),
            },

            Request::UpdateAccount { account } => match background.update_account(account).await {
                Ok(()) => StatusResponse::ok().into(),
                Err(e) => failure("updateAccount", e),
            },

            Request::DeleteAccount { account_id } => {
                match background.delete_account(&account_id).await {
                    Ok(()) => StatusResponse::ok().into(),
                    Err(e) => failure("deleteAccount", e),
                }
            }

            Request::ChangeMasterKey { new_master_key } => {
                match background.change_master_key(&new_master_key).await {
                    Ok(()) => StatusResponse::ok().into(),
                    Err(e) => failure("changeMasterKey", e),
                }
            }

            Request::GetTabUrlInfo { url } => {
                Response::TabUrl(background.tab_url_info(url.as_deref()))
            }
        }
    }
}

fn failure(action: &str, e: LoginError) -> Response {
    error!("{} failed: {}", action, e);
    StatusResponse::failed(e.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicklogin_core::{MemoryArea, SettingsManager};
    use serde_json::json;
    use tempfile::TempDir;

    fn handler(dir: &TempDir) -> RequestHandler {
        let background = Background::with_areas(
            Arc::new(MemoryArea::new()),
            Arc::new(MemoryArea::new()),
            SettingsManager::new(dir.path()),
            Some("test-extension".to_string()),
        );
        RequestHandler::new(Arc::new(Mutex::new(background)))
    }

    async fn send(handler: &RequestHandler, message: Value) -> Value {
        serde_json::to_value(handler.handle(message).await).unwrap()
    }

    #[tokio::test]
    async fn test_master_key_messages() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        let reply = send(&handler, json!({"action": "getMasterKey"})).await;
        assert_eq!(reply["hasKey"], json!(false));

        let reply = send(
            &handler,
            json!({"action": "setMasterKey", "masterKey": "correct-key"}),
        )
        .await;
        assert_eq!(reply, json!({"success": true}));

        let reply = send(&handler, json!({"action": "getMasterKey"})).await;
        assert_eq!(reply["hasKey"], json!(true));
        assert_eq!(reply["masterKey"], json!("correct-key"));
        assert!(reply["setTime"].is_i64());

        let reply = send(&handler, json!({"action": "clearMasterKey"})).await;
        assert_eq!(reply, json!({"success": true}));
        let reply = send(&handler, json!({"action": "getMasterKey"})).await;
        assert_eq!(reply["hasKey"], json!(false));
    }

    #[tokio::test]
    async fn test_no_key_failures() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        let reply = send(
            &handler,
            json!({"action": "getDecryptedAccounts", "url": "https://a.com"}),
        )
        .await;
        assert_eq!(reply, json!({"success": false, "accounts": []}));

        let reply = send(&handler, json!({"action": "getAllDecryptedAccounts"})).await;
        assert_eq!(
            reply,
            json!({"success": false, "accounts": [], "error": "No master key"})
        );

        let reply = send(&handler, json!({"action": "changeMasterKey", "newMasterKey": "x"})).await;
        assert_eq!(reply, json!({"success": false, "error": "No master key"}));
    }

    #[tokio::test]
    async fn test_account_flow() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        send(&handler, json!({"action": "setMasterKey", "masterKey": "correct-key"})).await;

        let reply = send(
            &handler,
            json!({
                "action": "saveAccount",
                "account": {
                    "id": "1718000000000",
                    "url": "https://bank.com",
                    "username": "alice",
                    "password": "p@ss"
                }
            }),
        )
        .await;
        assert_eq!(reply, json!({"success": true, "id": "1718000000000"}));

        let reply = send(
            &handler,
            json!({"action": "getDecryptedAccounts", "url": "https://bank.com/login"}),
        )
        .await;
        assert_eq!(reply["success"], json!(true));
        assert_eq!(reply["accounts"][0]["username"], json!("alice"));
        assert_eq!(reply["accounts"][0]["password"], json!("p@ss"));
        assert_eq!(reply["accounts"][0]["decryptionFailed"], json!(false));

        let reply = send(&handler, json!({"action": "getAccounts"})).await;
        assert!(reply.get("success").is_none());
        assert_eq!(reply["accounts"][0]["encrypted"], json!(true));
        assert!(reply["accounts"][0].get("decryptionFailed").is_none());

        let reply = send(
            &handler,
            json!({"action": "countMatchingAccounts", "url": "https://bank.com/x"}),
        )
        .await;
        assert_eq!(reply, json!({"count": 1}));

        let reply = send(
            &handler,
            json!({
                "action": "updateAccount",
                "account": {
                    "id": "missing",
                    "url": "https://bank.com",
                    "username": "u",
                    "password": "p"
                }
            }),
        )
        .await;
        assert_eq!(reply["success"], json!(false));
        assert!(reply["error"].as_str().unwrap().contains("missing"));

        for _ in 0..2 {
            let reply = send(
                &handler,
                json!({"action": "deleteAccount", "accountId": "1718000000000"}),
            )
            .await;
            assert_eq!(reply, json!({"success": true}));
        }
        let reply = send(&handler, json!({"action": "getAccounts"})).await;
        assert_eq!(reply, json!({"accounts": []}));
    }

    #[tokio::test]
    async fn test_change_master_key() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        send(&handler, json!({"action": "setMasterKey", "masterKey": "old"})).await;
        send(
            &handler,
            json!({
                "action": "saveAccount",
                "account": {"url": "https://a.com", "username": "u", "password": "p"}
            }),
        )
        .await;

        let reply = send(
            &handler,
            json!({"action": "changeMasterKey", "newMasterKey": "new"}),
        )
        .await;
        assert_eq!(reply, json!({"success": true}));

        let reply = send(&handler, json!({"action": "getAllDecryptedAccounts"})).await;
        assert_eq!(reply["accounts"][0]["password"], json!("p"));
        let reply = send(&handler, json!({"action": "getMasterKey"})).await;
        assert_eq!(reply["masterKey"], json!("new"));
    }

    #[tokio::test]
    async fn test_tab_url_info() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        let reply = send(
            &handler,
            json!({"action": "getTabUrlInfo", "url": "chrome://extensions"}),
        )
        .await;
        assert_eq!(reply["isSupported"], json!(false));
        assert_eq!(reply["displayText"], json!("Unsupported page"));

        let reply = send(&handler, json!({"action": "getTabUrlInfo"})).await;
        assert_eq!(reply["displayText"], json!("No URL"));
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        let reply = send(&handler, json!({"action": "nope"})).await;
        assert_eq!(reply["success"], json!(false));
        assert!(reply["error"].as_str().unwrap().starts_with("Invalid request"));
    }
}
