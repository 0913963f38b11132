//! Guest pool reconciliation
//!
//! VDI pools clone guests from a template. The template supplies the
//! OS, the display driver, and the cpu/memory defaults for anything the
//! manifest leaves unset.

use apiary_client::pool::{GuestProfile, POOL_TYPE_VDI, Pool};
use apiary_client::template::Template;
use apiary_core::provider::ProviderResult;
use apiary_core::resource::{Computed, GuestPoolSpec, ResourceId, ResourceSpec, State};

use crate::provider::{HiveProvider, api_error};

pub(crate) fn pool_from_spec(spec: &GuestPoolSpec, id: Option<&str>) -> Pool {
    Pool {
        id: id.unwrap_or_default().to_string(),
        name: spec.name.clone(),
        pool_type: POOL_TYPE_VDI.to_string(),
        seed: spec.seed.clone(),
        profile_id: spec.profile.clone(),
        storage_id: spec.storage_id.clone(),
        storage_type: spec.storage_type.clone(),
        density: spec.density.to_vec(),
        inject_agent: true,
        state: None,
        guest_profile: Some(GuestProfile {
            gpu: spec.gpu,
            persistent: spec.persistent,
            template_name: Some(spec.template.clone()),
            cpu: spec.cpu.map(|c| vec![c, c]).unwrap_or_default(),
            mem: spec.memory.map(|m| vec![m, m]).unwrap_or_default(),
            ..Default::default()
        }),
        backup: None,
    }
}

pub(crate) fn spec_from_pool(pool: &Pool) -> GuestPoolSpec {
    let profile = pool.guest_profile.clone().unwrap_or_default();
    GuestPoolSpec {
        name: pool.name.clone(),
        density: [
            pool.density.first().copied().unwrap_or_default(),
            pool.density.get(1).copied().unwrap_or_default(),
        ],
        cpu: profile.cpu.first().copied(),
        memory: profile.mem.first().copied(),
        gpu: profile.gpu,
        persistent: profile.persistent,
        template: profile.template_name.unwrap_or_default(),
        profile: pool.profile_id.clone(),
        seed: pool.seed.clone(),
        storage_type: pool.storage_type.clone(),
        storage_id: pool.storage_id.clone(),
    }
}

/// Fill in whatever the manifest left to the template
fn apply_template_defaults(pool: &mut Pool, template: &Template) {
    if let Some(profile) = pool.guest_profile.as_mut() {
        profile.os = template.os.clone();
        profile.vga = template.display_driver.clone();
        if profile.cpu.len() != 2 {
            profile.cpu = vec![template.vcpu, template.vcpu];
        }
        if profile.mem.len() != 2 {
            profile.mem = vec![template.mem, template.mem];
        }
    }
}

fn state_from_pool(id: &ResourceId, pool: &Pool) -> State {
    State::existing(id.clone(), ResourceSpec::GuestPool(spec_from_pool(pool)))
        .with_identifier(pool.id.clone())
        .with_computed(Computed {
            state: pool.state.clone(),
            ..Default::default()
        })
}

impl HiveProvider {
    pub(crate) async fn read_guest_pool(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        match self.client.get_pool(identifier).await {
            Ok(pool) => Ok(state_from_pool(id, &pool)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(api_error("failed to read guest pool", e, id)),
        }
    }

    pub(crate) async fn create_guest_pool(
        &self,
        id: &ResourceId,
        spec: &GuestPoolSpec,
    ) -> ProviderResult<State> {
        let template = self
            .client
            .get_template(&spec.template)
            .await
            .map_err(|e| api_error("failed to fetch template", e, id))?;

        let mut pool = pool_from_spec(spec, None);
        apply_template_defaults(&mut pool, &template);

        tracing::info!(pool = %spec.name, template = %spec.template, "creating guest pool");
        self.client
            .create_pool(&pool)
            .await
            .map_err(|e| api_error("failed to create guest pool", e, id))?;

        let created = self
            .client
            .get_pool_by_name(&spec.name)
            .await
            .map_err(|e| api_error("created pool not found by name", e, id))?;

        self.read_guest_pool(id, Some(&created.id)).await
    }

    pub(crate) async fn update_guest_pool(
        &self,
        id: &ResourceId,
        identifier: &str,
        spec: &GuestPoolSpec,
    ) -> ProviderResult<State> {
        let pool = pool_from_spec(spec, Some(identifier));
        self.client
            .update_pool(&pool)
            .await
            .map_err(|e| api_error("failed to update guest pool", e, id))?;
        self.read_guest_pool(id, Some(identifier)).await
    }

    pub(crate) async fn delete_guest_pool(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<()> {
        let Some(identifier) = identifier else {
            return Ok(());
        };
        match self.client.get_pool(identifier).await {
            Ok(_) => {}
            // Already gone counts as deleted.
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("failed to read guest pool", e, id)),
        }
        self.client
            .delete_pool(identifier)
            .await
            .map_err(|e| api_error("failed to delete guest pool", e, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{fast_provider, mock_auth};
    use apiary_core::resource::ResourceKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> GuestPoolSpec {
        GuestPoolSpec {
            name: "vdi".to_string(),
            density: [2, 10],
            cpu: None,
            memory: None,
            gpu: false,
            persistent: true,
            template: "win10-gold".to_string(),
            profile: "default".to_string(),
            seed: "vdi-seed".to_string(),
            storage_type: "disk".to_string(),
            storage_id: "disk".to_string(),
        }
    }

    fn id() -> ResourceId {
        ResourceId::new(ResourceKind::GuestPool, "vdi")
    }

    #[test]
    fn round_trip_preserves_pinned_fields() {
        let mut pinned = spec();
        pinned.cpu = Some(4);
        pinned.memory = Some(8192);

        let wire = pool_from_spec(&pinned, Some("p1"));
        assert_eq!(wire.pool_type, "vdi");
        assert!(wire.inject_agent);

        let back = spec_from_pool(&wire);
        assert_eq!(back, pinned);
    }

    #[test]
    fn template_defaults_fill_unset_sizing() {
        let mut pool = pool_from_spec(&spec(), None);
        apply_template_defaults(
            &mut pool,
            &Template {
                name: "win10-gold".to_string(),
                os: Some("win10".to_string()),
                vcpu: 4,
                mem: 8192,
                display_driver: Some("qxl".to_string()),
                state: None,
            },
        );

        let profile = pool.guest_profile.unwrap();
        assert_eq!(profile.cpu, vec![4, 4]);
        assert_eq!(profile.mem, vec![8192, 8192]);
        assert_eq!(profile.os.as_deref(), Some("win10"));
        assert_eq!(profile.vga.as_deref(), Some("qxl"));
    }

    #[tokio::test]
    async fn create_resolves_id_by_name_and_reads_back() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/template/win10-gold"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "win10-gold", "os": "win10", "vcpu": 4, "mem": 8192,
                "displayDriver": "qxl"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "p1", "name": "vdi", "type": "vdi", "density": [2, 10], "injectAgent": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pool/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1", "name": "vdi", "type": "vdi", "seed": "vdi-seed",
                "profileId": "default", "storageId": "disk", "storageType": "disk",
                "density": [2, 10], "injectAgent": true, "state": "running",
                "guestProfile": {
                    "gpu": false, "persistent": true, "templateName": "win10-gold",
                    "cpu": [4, 4], "mem": [8192, 8192]
                }
            })))
            .mount(&server)
            .await;

        let state = provider.create_guest_pool(&id(), &spec()).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("p1"));
        assert_eq!(state.computed.state.as_deref(), Some("running"));

        // Template-defaulted sizing is echoed back without counting as drift.
        let observed = state.observed.unwrap();
        assert!(ResourceSpec::GuestPool(spec())
            .changed_fields(&observed)
            .is_empty());
    }

    #[tokio::test]
    async fn delete_of_absent_pool_succeeds() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/pool/p1"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": 404, "message": "pool not found"})),
            )
            .mount(&server)
            .await;

        provider.delete_guest_pool(&id(), Some("p1")).await.unwrap();
    }
}
