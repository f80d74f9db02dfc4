//! Credential resolution for target accounts

use skyaudit_core::{
    ApiOptions, AssumeRoleRequest, CloudProvider, Credentials, Result, Session,
    Settings, DEFAULT_CROSS_ACCOUNT_ROLE,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// How member-account credentials are obtained
#[derive(Debug, Clone)]
pub struct RoleSettings {
    /// Explicitly configured role; `None` uses the default role and lets the
    /// caller's own account run on ambient credentials
    pub role: Option<String>,

    /// Account used for organization calls and as the hop into members
    pub org_admin_account_id: Option<String>,

    /// Retries of throttled role assumptions
    pub retry_attempts: u32,

    /// First retry delay, doubled on every attempt
    pub retry_backoff: Duration,

    /// Per-call API timeout for sessions
    pub api_timeout: Duration,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            role: None,
            org_admin_account_id: None,
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(200),
            api_timeout: Duration::from_secs(30),
        }
    }
}

impl RoleSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            role: settings.cross_account_role.clone(),
            org_admin_account_id: settings.org_admin_account_id.clone(),
            retry_attempts: settings.retry_attempts,
            retry_backoff: settings.retry_backoff,
            api_timeout: settings.api_timeout,
        }
    }

    pub fn role_name(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_CROSS_ACCOUNT_ROLE)
    }
}

/// Produces sessions for target accounts
///
/// The caller identity is learned once. When an admin account is configured
/// its credentials are obtained on first use, by an organization call or a
/// member assumption, and every member assumption is made through them.
pub struct CredentialResolver {
    provider: Arc<dyn CloudProvider>,
    settings: RoleSettings,
    caller_account_id: String,
    ambient: Arc<Credentials>,
    admin: Mutex<Option<Arc<Credentials>>>,
}

impl CredentialResolver {
    /// Learn the caller identity
    pub fn discover(provider: Arc<dyn CloudProvider>, settings: RoleSettings) -> Result<Self> {
        let ambient = provider.ambient_credentials()?;
        let caller_account_id = provider.caller_identity(&ambient)?;
        debug!("Caller identity: {}", caller_account_id);

        Ok(Self {
            provider,
            settings,
            caller_account_id,
            ambient: Arc::new(ambient),
            admin: Mutex::new(None),
        })
    }

    pub fn caller_account_id(&self) -> &str {
        &self.caller_account_id
    }

    pub fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    pub fn settings(&self) -> &RoleSettings {
        &self.settings
    }

    /// Account whose credentials are used for organization calls
    pub fn admin_account_id(&self) -> &str {
        self.settings
            .org_admin_account_id
            .as_deref()
            .unwrap_or(&self.caller_account_id)
    }

    /// Whether organization calls need a hop out of the caller's account
    fn needs_admin_hop(&self) -> bool {
        self.admin_account_id() != self.caller_account_id
    }

    /// Credentials for organization calls, assuming into the admin account
    /// on first use
    pub fn admin_credentials(&self) -> Result<Arc<Credentials>> {
        if !self.needs_admin_hop() {
            return Ok(Arc::clone(&self.ambient));
        }

        // Held across the assumption so concurrent workers share one hop
        let mut admin = self.admin.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(credentials) = admin.as_ref() {
            return Ok(Arc::clone(credentials));
        }

        let admin_id = self.admin_account_id();
        debug!("Assuming into organization admin account {}", admin_id);
        let credentials = Arc::new(self.assume_with_retry(&self.ambient, admin_id)?);
        *admin = Some(Arc::clone(&credentials));
        Ok(credentials)
    }

    /// Credentials for one account
    pub fn credentials_for(&self, account_id: &str) -> Result<Arc<Credentials>> {
        if self.settings.role.is_none() {
            if account_id == self.caller_account_id {
                return Ok(Arc::clone(&self.ambient));
            }
            if account_id == self.admin_account_id() {
                return self.admin_credentials();
            }
        }

        let via = self.admin_credentials()?;
        self.assume_with_retry(&via, account_id).map(Arc::new)
    }

    /// Session bound to one account and region
    pub fn resolve(&self, account_id: &str, region: &str) -> Result<Session> {
        let credentials = self.credentials_for(account_id)?;
        let options = ApiOptions {
            timeout: Some(self.settings.api_timeout),
        };
        let api = self
            .provider
            .resource_api(&credentials, region, options)
            .map_err(|e| e.for_account(account_id).in_region(region))?;

        Ok(Session::new(account_id, region, credentials, api))
    }

    fn assume_with_retry(&self, via: &Credentials, account_id: &str) -> Result<Credentials> {
        let role_arn = format!("arn:aws:iam::{}:role/{}", account_id, self.settings.role_name());
        let session_name = format!("skyaudit-{}", account_id);
        let request = AssumeRoleRequest {
            role_arn: &role_arn,
            session_name: &session_name,
        };

        let mut delay = self.settings.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.provider.assume_role(via, &request) {
                Ok(credentials) => {
                    debug!("Assumed {} via {}", role_arn, via.account_id);
                    return Ok(credentials);
                }
                Err(e) if e.kind().is_transient() && attempt < self.settings.retry_attempts => {
                    attempt += 1;
                    warn!(
                        "Assuming {} was throttled, retry {}/{} in {:?}",
                        role_arn, attempt, self.settings.retry_attempts, delay
                    );
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(e) => return Err(e.for_account(account_id)),
            }
        }
    }
}
