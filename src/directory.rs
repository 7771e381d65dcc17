use crate::config::DirectorySettings;
use anyhow::{bail, Context, Result};
use ldap3::{ldap_escape, LdapConn, Scope, SearchEntry};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of looking up a single login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Directory confirmed the person; canonical upper-case identifier
    Found(String),
    /// Directory answered and has no such login
    NotFound,
    /// Directory could not be asked (transport or protocol failure)
    Failed(String),
}

/// Directory-service capability: login → identifier, plus the domain identifier.
///
/// [`LdapDirectory`] is the implementation backed by an Active Directory domain controller.
pub trait Directory {
    /// Identifier of the directory domain, embedded in every access record.
    fn resolve_domain_identifier(&mut self) -> Result<String>;

    fn resolve_login(&mut self, login: &str) -> LookupOutcome;
}

/// Canonical text form used for every identifier this tool produces.
pub fn canonical_identifier(id: Uuid) -> String {
    id.hyphenated().to_string().to_uppercase()
}

/// Fresh random identifier.
pub fn new_identifier() -> String {
    canonical_identifier(Uuid::new_v4())
}

/// Active Directory session established by a simple bind.
pub struct LdapDirectory {
    conn: LdapConn,
    base_dn: String,
}

impl LdapDirectory {
    /// Authenticates against the configured domain controller.
    pub fn connect(settings: &DirectorySettings, password: &str) -> Result<Self> {
        if settings.url.is_empty() || settings.base_dn.is_empty() {
            bail!("Directory url and base_dn must be configured");
        }
        let mut conn = LdapConn::new(&settings.url)
            .with_context(|| format!("Failed to connect to directory at {}", settings.url))?;
        conn.simple_bind(&settings.bind_user, password)
            .and_then(|res| res.success())
            .with_context(|| format!("Directory bind failed for {}", settings.bind_user))?;
        info!(url = %settings.url, user = %settings.bind_user, "Directory session established");
        Ok(Self {
            conn,
            base_dn: settings.base_dn.clone(),
        })
    }

    fn first_guid(&mut self, filter: &str) -> Result<Option<String>> {
        let (entries, _) = self
            .conn
            .search(&self.base_dn, Scope::Subtree, filter, vec!["objectGUID"])
            .and_then(|res| res.success())
            .with_context(|| format!("Directory search failed: {}", filter))?;

        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let entry = SearchEntry::construct(entry);
        // objectGUID is binary; it only lands in `attrs` if the bytes happen to be valid UTF-8
        let raw = entry
            .bin_attrs
            .get("objectGUID")
            .and_then(|v| v.first().cloned())
            .or_else(|| {
                entry
                    .attrs
                    .get("objectGUID")
                    .and_then(|v| v.first())
                    .map(|s| s.as_bytes().to_vec())
            });
        match raw {
            Some(bytes) => Ok(Some(guid_from_directory_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Directory GUIDs are stored in mixed-endian (little-endian first three fields) order.
pub fn guid_from_directory_bytes(bytes: &[u8]) -> Result<String> {
    let id = Uuid::from_slice_le(bytes)
        .with_context(|| format!("objectGUID has {} bytes, expected 16", bytes.len()))?;
    Ok(canonical_identifier(id))
}

impl Directory for LdapDirectory {
    fn resolve_domain_identifier(&mut self) -> Result<String> {
        match self.first_guid("(objectClass=domainDNS)")? {
            Some(guid) => {
                info!(domain = %guid, "Resolved domain identifier");
                Ok(guid)
            }
            None => bail!("Domain object not found under {}", self.base_dn),
        }
    }

    fn resolve_login(&mut self, login: &str) -> LookupOutcome {
        let filter = format!("(sAMAccountName={})", ldap_escape(login));
        match self.first_guid(&filter) {
            Ok(Some(guid)) => LookupOutcome::Found(guid),
            Ok(None) => {
                debug!(login, "Login not present in directory");
                LookupOutcome::NotFound
            }
            Err(e) => LookupOutcome::Failed(format!("{:#}", e)),
        }
    }
}
