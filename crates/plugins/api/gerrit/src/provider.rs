//! [`ReviewProvider`] implementation for Gerrit.

use async_trait::async_trait;
use gerrit_review_core::{
    ChangeId, ChangeView, GerritConfig, PatchsetDiffResult, PatchsetRef, Result,
    ReviewProvider, ReviewRequest, ReviewResult,
};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::GerritApi;
use crate::auth::{self, Session};
use crate::client::GerritClient;
use crate::{change, compare, review};

/// Gerrit provider. The authenticated session is established on first use
/// and shared by every later call.
#[derive(Debug)]
pub struct GerritProvider {
    config: GerritConfig,
    client: GerritClient,
    session: OnceCell<Session>,
}

impl GerritProvider {
    pub fn new(config: GerritConfig) -> Result<Self> {
        let client = GerritClient::new(&config)?;
        Ok(Self {
            config,
            client,
            session: OnceCell::new(),
        })
    }

    /// Build a provider from the config file and `GERRIT_*` environment.
    pub fn from_env() -> Result<Self> {
        Self::new(GerritConfig::from_env()?)
    }

    pub fn config(&self) -> &GerritConfig {
        &self.config
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                debug!(base_url = self.client.base_url(), "Authenticating against Gerrit");
                auth::authenticate(&self.client, &self.config).await
            })
            .await
    }

    async fn api(&self) -> Result<GerritApi<'_>> {
        Ok(GerritApi::new(&self.client, self.session().await?))
    }
}

#[async_trait]
impl ReviewProvider for GerritProvider {
    fn provider_name(&self) -> &'static str {
        "gerrit"
    }

    async fn fetch_change(
        &self,
        change_id: &str,
        patchset_number: Option<&str>,
        include_comments: bool,
    ) -> Result<ChangeView> {
        let target = PatchsetRef::parse(change_id, patchset_number)?;
        let api = self.api().await?;
        change::fetch_change(&api, self.config.excluded(), &target, include_comments).await
    }

    async fn fetch_patchset_diff(
        &self,
        change_id: &str,
        base_patchset: &str,
        target_patchset: &str,
        file_path: Option<&str>,
    ) -> Result<PatchsetDiffResult> {
        let change_id = ChangeId::new(change_id)?;
        // Identical sides never touch the network, not even to authenticate.
        if base_patchset.trim() == target_patchset.trim() {
            return Ok(PatchsetDiffResult::empty(
                change_id.as_str(),
                base_patchset,
                target_patchset,
            ));
        }
        let api = self.api().await?;
        compare::fetch_patchset_diff(
            &api,
            self.config.excluded(),
            change_id.as_str(),
            base_patchset,
            target_patchset,
            file_path,
        )
        .await
    }

    async fn submit_review(
        &self,
        change_id: &str,
        patchset_number: Option<&str>,
        request: ReviewRequest,
    ) -> Result<ReviewResult> {
        let target = PatchsetRef::parse(change_id, patchset_number)?;
        review::build_review_input(&request)?;
        let api = self.api().await?;
        review::submit_review(&api, &target, &request).await
    }
}

// =============================================================================
// Tests
// =============================================================================
