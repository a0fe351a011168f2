//! Distributed Firewall lifecycle for a single VDC.
//!
//! The update protocol is check-then-update: [`DistributedFirewall::check`]
//! captures the section and its ETag, callers edit the section, and
//! [`DistributedFirewall::update`] writes it back with `If-Match`. A rejected
//! update is never retried here; re-run `check` and try again.

use crate::client::{VcdClient, XmlRequest};
use crate::models::{ConcurrencyToken, RuleSection};
use crate::Result;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};
use url::Url;
use vcd_core::urn::vdc_urn_to_id;
use vcd_core::Error;

/// Path used to enable and delete the DFW of a VDC.
pub const DFW_VDC_PATH: &str = "/network/firewall/vdc/";

/// Path of the layer-3 section holding a VDC's rules.
pub const DFW_SECTION_PATH: &str = "/network/firewall/globalroot-0/config/layer3sections/";

const TRANSPORT_ERROR: &str = "error reaching DFW endpoint: {}";

/// DFW controller for one VDC.
///
/// Owns the working copy of the rule section and the concurrency token from
/// the last successful check or update. Not meant to be driven concurrently;
/// serialize access externally if needed.
pub struct DistributedFirewall {
    client: VcdClient,
    section: RuleSection,
    token: Option<ConcurrencyToken>,
}

impl DistributedFirewall {
    /// Create a controller with an empty section and no token.
    #[must_use]
    pub fn new(client: VcdClient) -> Self {
        Self {
            client,
            section: RuleSection::default(),
            token: None,
        }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &VcdClient {
        &self.client
    }

    /// The working copy of the rule section.
    #[must_use]
    pub fn section(&self) -> &RuleSection {
        &self.section
    }

    /// Mutable access to the working copy, for edits before [`update`](Self::update).
    pub fn section_mut(&mut self) -> &mut RuleSection {
        &mut self.section
    }

    /// Replace the working copy.
    pub fn set_section(&mut self, section: RuleSection) {
        self.section = section;
    }

    /// Token captured by the last successful check or update.
    #[must_use]
    pub fn concurrency_token(&self) -> Option<&ConcurrencyToken> {
        self.token.as_ref()
    }

    /// Set the token explicitly, e.g. [`ConcurrencyToken::unconditional`] for a
    /// blind write.
    pub fn set_concurrency_token(&mut self, token: ConcurrencyToken) {
        self.token = Some(token);
    }

    /// Forget the current token.
    pub fn clear_concurrency_token(&mut self) {
        self.token = None;
    }

    /// URL used by [`enable`](Self::enable).
    pub fn enable_url(&self, vdc: &str) -> Result<Url> {
        let id = vdc_urn_to_id(vdc);
        self.build_url(&format!("{DFW_VDC_PATH}{id}?append=true"), "DFW activation")
    }

    /// URL used by [`check`](Self::check) and [`update`](Self::update).
    pub fn section_url(&self, vdc: &str) -> Result<Url> {
        let id = vdc_urn_to_id(vdc);
        self.build_url(&format!("{DFW_SECTION_PATH}{id}"), "DFW section")
    }

    /// URL used by [`delete`](Self::delete).
    pub fn delete_url(&self, vdc: &str) -> Result<Url> {
        let id = vdc_urn_to_id(vdc);
        self.build_url(&format!("{DFW_VDC_PATH}{id}"), "DFW delete")
    }

    fn build_url(&self, path: &str, purpose: &str) -> Result<Url> {
        self.client.resolve(path).map_err(|err| {
            Error::InvalidEndpoint(format!("Error building url for {purpose}: {err}"))
        })
    }

    /// Enable the DFW for `vdc` (URN or bare id).
    ///
    /// Enabling is additive, so repeated calls succeed. The resulting state is
    /// not verified; follow with [`check`](Self::check) if needed. Returns the
    /// URL that was called.
    pub async fn enable(&self, vdc: &str) -> Result<Url> {
        let url = self.enable_url(vdc)?;
        debug!(%url, "Enable distributed firewall");

        let request = XmlRequest::new(Method::POST, url.clone(), "error enabling DFW: {}");
        let response = self.client.execute(request).await?;
        debug!(status = %response.status(), "Enable distributed firewall response");

        Ok(url)
    }

    /// Check whether the DFW is enabled for `vdc`.
    ///
    /// On `200` the section is loaded into the working copy and the response
    /// ETag becomes the concurrency token (unconditional when the header is
    /// missing). `404` and any `400` mean "not enabled".
    /// Any other status is an error and leaves the token untouched.
    pub async fn check(&mut self, vdc: &str) -> Result<bool> {
        let url = self.section_url(vdc)?;
        debug!(%url, "Check distributed firewall");

        let request = XmlRequest::new(Method::GET, url, TRANSPORT_ERROR);
        let (response, section) = match self
            .client
            .execute_decoded::<RuleSection>(request)
            .await
        {
            Ok(result) => result,
            Err(Error::Api(err)) => {
                debug!(%err, "Distributed firewall not configured");
                return Ok(false);
            }
            Err(Error::BadRequest(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        match response.status() {
            StatusCode::OK => {
                if let Some(section) = section {
                    self.section = section;
                }
                self.token = Some(response.etag().unwrap_or_default());
                debug!(token = ?self.token, "ETag after check");
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(response.unexpected_status("Unexpected status checking DFW")),
        }
    }

    /// Write the working copy of the section for `vdc`.
    ///
    /// Requires a token from a prior [`check`](Self::check) (or one set
    /// explicitly); fails with [`Error::MissingConcurrencyToken`] otherwise,
    /// without contacting the backend. The token is consumed: on `200` it is
    /// replaced by the response ETag (unconditional when missing), on any
    /// failure it is discarded.
    pub async fn update(&mut self, vdc: &str) -> Result<()> {
        if self.token.is_none() {
            return Err(Error::MissingConcurrencyToken(format!(
                "check the DFW of `{vdc}` before updating it"
            )));
        }

        let url = self.section_url(vdc)?;
        let request = XmlRequest::new(Method::PUT, url.clone(), TRANSPORT_ERROR)
            .with_payload(&self.section)?;

        let token = self.token.take().unwrap_or_default();
        debug!(%url, %token, "Update distributed firewall");
        let request = request.with_if_match(token);

        let (response, section) = self
            .client
            .execute_decoded::<RuleSection>(request)
            .await
            .map_err(|err| {
                warn!(%err, "DFW update failed, concurrency token discarded");
                err
            })?;

        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "DFW update rejected, concurrency token discarded");
            return Err(response.unexpected_status("Updating firewall was not successful"));
        }

        if let Some(section) = section {
            self.section = section;
        }
        self.token = Some(response.etag().unwrap_or_default());
        debug!(token = ?self.token, "ETag after update");

        Ok(())
    }

    /// Disable the DFW for `vdc`. Succeeds only on `204`; the token is
    /// cleared since the section no longer exists.
    pub async fn delete(&mut self, vdc: &str) -> Result<()> {
        let url = self.delete_url(vdc)?;
        debug!(%url, "Delete distributed firewall");

        let request = XmlRequest::new(Method::DELETE, url, TRANSPORT_ERROR);
        let response = self.client.execute(request).await?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(response.unexpected_status("Deleting firewall was not successful"));
        }

        self.token = None;
        Ok(())
    }
}
