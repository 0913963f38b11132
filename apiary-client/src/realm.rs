//! Realm records (directory-service integration)

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Realm {
    /// NetBIOS name; the remote identity of the record
    pub name: String,
    pub fqdn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<RealmServiceAccount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealmServiceAccount {
    pub username: String,
    pub password: String,
}

impl Client {
    pub async fn get_realm(&self, name: &str) -> Result<Realm, Error> {
        self.get_json(&format!("realm/{}", name)).await
    }

    pub async fn create_realm(&self, realm: &Realm) -> Result<(), Error> {
        self.post_empty("realms", realm).await
    }

    pub async fn update_realm(&self, realm: &Realm) -> Result<(), Error> {
        self.put_empty(&format!("realm/{}", realm.name), realm).await
    }

    pub async fn delete_realm(&self, name: &str) -> Result<(), Error> {
        self.delete_path(&format!("realm/{}", name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_serializes_camel_case() {
        let realm = Realm {
            name: "CORP".to_string(),
            fqdn: "corp.example.com".to_string(),
            service_account: Some(RealmServiceAccount {
                username: "svc-join".to_string(),
                password: "hunter2".to_string(),
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&realm).unwrap();
        assert_eq!(value["serviceAccount"]["username"], "svc-join");
        assert!(value.get("enabled").is_none());
    }
}
