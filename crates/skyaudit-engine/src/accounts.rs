//! Target account enumeration

use crate::credentials::CredentialResolver;
use skyaudit_core::{Account, AuditError, FailureKind, OrganizationInfo, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// Which accounts a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only the caller's own account
    Single,
    /// Every active account of the organization
    Organization,
}

/// Result of enumeration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountSet {
    /// Active accounts, sorted by id and deduplicated
    pub active: Vec<Account>,
    /// Suspended, closing, or closed accounts
    pub inactive: Vec<Account>,
}

impl AccountSet {
    pub fn active_ids(&self) -> Vec<String> {
        self.active.iter().map(|a| a.id.clone()).collect()
    }
}

/// Produces the set of target accounts
pub struct AccountEnumerator<'a> {
    resolver: &'a CredentialResolver,
}

impl<'a> AccountEnumerator<'a> {
    pub fn new(resolver: &'a CredentialResolver) -> Self {
        Self { resolver }
    }

    /// Check organization access before any listing or scheduling
    pub fn validate_access(&self) -> Result<OrganizationInfo> {
        let admin = self.resolver.admin_account_id();
        let credentials = self.resolver.admin_credentials()?;
        self.resolver
            .provider()
            .describe_organization(&credentials)
            .map_err(|e| e.for_account(admin))
    }

    /// Enumerate target accounts
    pub fn enumerate(&self, mode: ScanMode) -> Result<AccountSet> {
        match mode {
            ScanMode::Single => Ok(AccountSet {
                active: vec![Account::active(self.resolver.caller_account_id())],
                inactive: Vec::new(),
            }),
            ScanMode::Organization => {
                let org = self.validate_access()?;
                info!("Listing accounts of organization {}", org.id);
                self.list_all()
            }
        }
    }

    fn list_all(&self) -> Result<AccountSet> {
        let provider = self.resolver.provider();
        let credentials = self.resolver.admin_credentials()?;
        let admin = self.resolver.admin_account_id();

        let mut accounts = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = provider
                .list_accounts(&credentials, next_token.as_deref())
                .map_err(|e| e.for_account(admin))?;
            pages += 1;
            debug!("Account page {}: {} accounts", pages, page.accounts.len());
            accounts.extend(page.accounts);

            match page.next_token {
                None => break,
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(AuditError::cloud(
                            FailureKind::Unknown,
                            format!("account listing repeated page token '{}'", token),
                        )
                        .for_account(admin));
                    }
                    next_token = Some(token);
                }
            }
        }

        let (mut active, mut inactive): (Vec<_>, Vec<_>) =
            accounts.into_iter().partition(Account::is_active);
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active.dedup_by(|a, b| a.id == b.id);
        inactive.sort_by(|a, b| a.id.cmp(&b.id));
        inactive.dedup_by(|a, b| a.id == b.id);

        info!(
            "Found {} active accounts ({} inactive) in {} pages",
            active.len(),
            inactive.len(),
            pages
        );

        Ok(AccountSet { active, inactive })
    }
}
