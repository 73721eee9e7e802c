//! Extension message types
//!
//! Requests are JSON objects keyed by `action`, the same shape the
//! extension's popups and content script send to the background.

use quicklogin_core::{CredentialRecord, MasterKeyInfo, TabUrlInfo};
use serde::{Deserialize, Serialize};

/// An incoming extension message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    SetMasterKey {
        #[serde(default)]
        master_key: String,
        /// Milliseconds
        #[serde(default)]
        session_timeout: Option<i64>,
    },
    GetMasterKey,
    ClearMasterKey,
    GetDecryptedAccounts {
        #[serde(default)]
        url: String,
    },
    GetAllDecryptedAccounts,
    GetAccounts,
    CountMatchingAccounts {
        #[serde(default)]
        url: String,
    },
    SaveAccount {
        account: CredentialRecord,
    },
    UpdateAccount {
        account: CredentialRecord,
    },
    #[serde(rename_all = "camelCase")]
    DeleteAccount {
        account_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ChangeMasterKey {
        #[serde(default)]
        new_master_key: String,
    },
    GetTabUrlInfo {
        #[serde(default)]
        url: Option<String>,
    },
}

impl Request {
    /// The action name, for logging
    pub fn action(&self) -> &'static str {
        match self {
            Request::SetMasterKey { .. } => "setMasterKey",
            Request::GetMasterKey => "getMasterKey",
            Request::ClearMasterKey => "clearMasterKey",
            Request::GetDecryptedAccounts { .. } => "getDecryptedAccounts",
            Request::GetAllDecryptedAccounts => "getAllDecryptedAccounts",
            Request::GetAccounts => "getAccounts",
            Request::CountMatchingAccounts { .. } => "countMatchingAccounts",
            Request::SaveAccount { .. } => "saveAccount",
            Request::UpdateAccount { .. } => "updateAccount",
            Request::DeleteAccount { .. } => "deleteAccount",
            Request::ChangeMasterKey { .. } => "changeMasterKey",
            Request::GetTabUrlInfo { .. } => "getTabUrlInfo",
        }
    }
}

/// `{success, error?, id?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Id of a newly saved account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            id: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            id: None,
        }
    }
}

/// `{success?, accounts, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsResponse {
    /// Absent on `getAccounts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub accounts: Vec<CredentialRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{count}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Any reply sent back to the extension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Status(StatusResponse),
    Accounts(AccountsResponse),
    MasterKey(MasterKeyInfo),
    Count(CountResponse),
    TabUrl(TabUrlInfo),
}

impl From<StatusResponse> for Response {
    fn from(r: StatusResponse) -> Self {
        Response::Status(r)
    }
}

impl From<AccountsResponse> for Response {
    fn from(r: AccountsResponse) -> Self {
        Response::Accounts(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_actions() {
        let request: Request = serde_json::from_value(json!({
            "action": "setMasterKey",
            "masterKey": "k",
            "sessionTimeout": 60000
        }))
        .unwrap();
        assert!(matches!(
            request,
            Request::SetMasterKey {
                ref master_key,
                session_timeout: Some(60000),
            } if master_key == "k"
        ));

        let request: Request =
            serde_json::from_value(json!({"action": "deleteAccount", "accountId": "42"})).unwrap();
        assert!(matches!(request, Request::DeleteAccount { ref account_id } if account_id == "42"));

        let request: Request = serde_json::from_value(json!({"action": "getMasterKey"})).unwrap();
        assert_eq!(request.action(), "getMasterKey");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(serde_json::from_value::<Request>(json!({"action": "launchMissiles"})).is_err());
        assert!(serde_json::from_value::<Request>(json!({"masterKey": "k"})).is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_value(Response::from(StatusResponse::ok())).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(Response::from(AccountsResponse {
                success: Some(false),
                accounts: Vec::new(),
                error: Some("No master key".to_string()),
            }))
            .unwrap(),
            json!({"success": false, "accounts": [], "error": "No master key"})
        );
        assert_eq!(
            serde_json::to_value(Response::Count(CountResponse { count: 3 })).unwrap(),
            json!({"count": 3})
        );
    }
}
