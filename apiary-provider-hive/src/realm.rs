//! Realm reconciliation
//!
//! Realms are identified by their NetBIOS name; there is no separate
//! remote ID. The directory service echoes only name and FQDN back.

use apiary_client::realm::{Realm, RealmServiceAccount};
use apiary_core::provider::ProviderResult;
use apiary_core::resource::{RealmSpec, ResourceId, ResourceSpec, State};

use crate::provider::{HiveProvider, api_error};

fn realm_from_spec(spec: &RealmSpec) -> Realm {
    let service_account = match (&spec.username, &spec.password) {
        (None, None) => None,
        (username, password) => Some(RealmServiceAccount {
            username: username.clone().unwrap_or_default(),
            password: password.clone().unwrap_or_default(),
        }),
    };
    Realm {
        name: spec.name.clone(),
        fqdn: spec.fqdn.clone(),
        enabled: spec.enabled,
        verified: spec.verified,
        tags: spec.tags.clone(),
        service_account,
    }
}

fn state_from_realm(id: &ResourceId, realm: &Realm) -> State {
    let observed = RealmSpec {
        name: realm.name.clone(),
        fqdn: realm.fqdn.clone(),
        enabled: realm.enabled,
        verified: realm.verified,
        tags: realm.tags.clone(),
        username: None,
        password: None,
    };
    State::existing(id.clone(), ResourceSpec::Realm(observed)).with_identifier(realm.name.clone())
}

impl HiveProvider {
    pub(crate) async fn read_realm(&self, id: &ResourceId) -> ProviderResult<State> {
        match self.client.get_realm(&id.name).await {
            Ok(realm) => Ok(state_from_realm(id, &realm)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(api_error("failed to read realm", e, id)),
        }
    }

    pub(crate) async fn create_realm(
        &self,
        id: &ResourceId,
        spec: &RealmSpec,
    ) -> ProviderResult<State> {
        tracing::info!(realm = %spec.name, fqdn = %spec.fqdn, "creating realm");
        self.client
            .create_realm(&realm_from_spec(spec))
            .await
            .map_err(|e| api_error("failed to create realm", e, id))?;
        self.read_realm(id).await
    }

    pub(crate) async fn update_realm(
        &self,
        id: &ResourceId,
        spec: &RealmSpec,
    ) -> ProviderResult<State> {
        // Credentials are write-once; updates only carry name and FQDN.
        let realm = Realm {
            name: spec.name.clone(),
            fqdn: spec.fqdn.clone(),
            ..Default::default()
        };
        self.client
            .update_realm(&realm)
            .await
            .map_err(|e| api_error("failed to update realm", e, id))?;
        self.read_realm(id).await
    }

    pub(crate) async fn delete_realm(&self, id: &ResourceId) -> ProviderResult<()> {
        match self.client.get_realm(&id.name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("failed to read realm", e, id)),
        }
        self.client
            .delete_realm(&id.name)
            .await
            .map_err(|e| api_error("failed to delete realm", e, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{fast_provider, mock_auth};
    use apiary_core::resource::ResourceKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> RealmSpec {
        RealmSpec {
            name: "CORP".to_string(),
            fqdn: "corp.example.com".to_string(),
            enabled: None,
            verified: None,
            tags: vec![],
            username: Some("svc-join".to_string()),
            password: Some("hunter2".to_string()),
        }
    }

    fn id() -> ResourceId {
        ResourceId::new(ResourceKind::Realm, "CORP")
    }

    #[test]
    fn service_account_built_from_credentials() {
        let realm = realm_from_spec(&spec());
        let account = realm.service_account.unwrap();
        assert_eq!(account.username, "svc-join");
        assert_eq!(account.password, "hunter2");

        let mut anonymous = spec();
        anonymous.username = None;
        anonymous.password = None;
        assert!(realm_from_spec(&anonymous).service_account.is_none());
    }

    #[tokio::test]
    async fn create_posts_credentials_and_reads_back() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/realms"))
            .and(body_partial_json(json!({
                "name": "CORP",
                "serviceAccount": {"username": "svc-join", "password": "hunter2"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/realm/CORP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "CORP", "fqdn": "corp.example.com", "enabled": true
            })))
            .mount(&server)
            .await;

        let state = provider.create_realm(&id(), &spec()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("CORP"));
        // Credentials never come back in observed state.
        match state.observed.unwrap() {
            ResourceSpec::Realm(observed) => {
                assert!(observed.password.is_none());
                assert_eq!(observed.fqdn, "corp.example.com");
            }
            other => panic!("unexpected observed spec {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_translates_404_to_absent() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/realm/CORP"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": 404, "message": "realm not found"})),
            )
            .mount(&server)
            .await;

        let state = provider.read_realm(&id()).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn delete_of_absent_realm_succeeds() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/realm/CORP"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": 404, "message": "realm not found"})),
            )
            .mount(&server)
            .await;

        provider.delete_realm(&id()).await.unwrap();
    }
}
