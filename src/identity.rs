use crate::directory::{new_identifier, Directory, LookupOutcome};
use crate::models::{PersonRecord, UnresolvedEntry};
use tracing::{debug, warn};

/// How identifiers are decided for the whole run.
pub enum IdentityPolicy<'d> {
    /// Keep identifiers from the input, generate the missing ones
    Local,
    /// The directory is authoritative; fall back to local identifiers when it has no answer
    Directory(&'d mut dyn Directory),
}

/// Assigns identifiers to records and keeps the run-wide unresolved list.
pub struct IdentityResolver<'d> {
    policy: IdentityPolicy<'d>,
    unresolved: Vec<UnresolvedEntry>,
    generated: usize,
}

fn keep_or_generate(existing: String, generated: &mut usize) -> String {
    if existing.is_empty() {
        *generated += 1;
        new_identifier()
    } else {
        existing
    }
}

impl<'d> IdentityResolver<'d> {
    pub fn new(policy: IdentityPolicy<'d>) -> Self {
        Self {
            policy,
            unresolved: Vec::new(),
            generated: 0,
        }
    }

    pub fn local() -> Self {
        Self::new(IdentityPolicy::Local)
    }

    pub fn with_directory(directory: &'d mut dyn Directory) -> Self {
        Self::new(IdentityPolicy::Directory(directory))
    }

    /// Fills in `record.identifier` according to the policy.
    pub fn resolve(&mut self, record: &mut PersonRecord) {
        let existing = record.identifier.trim().to_string();

        let directory = match &mut self.policy {
            IdentityPolicy::Local => {
                record.identifier = keep_or_generate(existing, &mut self.generated);
                return;
            }
            IdentityPolicy::Directory(directory) => directory,
        };

        if record.login.is_empty() {
            // Nothing to confirm against the directory
            record.identifier = keep_or_generate(existing, &mut self.generated);
            return;
        }

        match directory.resolve_login(&record.login) {
            LookupOutcome::Found(id) => {
                if !existing.is_empty() && existing != id {
                    debug!(login = %record.login, old = %existing, new = %id, "Directory identifier replaces input");
                }
                record.identifier = id;
                return;
            }
            LookupOutcome::NotFound => {}
            LookupOutcome::Failed(reason) => {
                warn!(login = %record.login, %reason, "Directory lookup failed; treating as not found");
            }
        }

        record.identifier = keep_or_generate(existing, &mut self.generated);
        self.unresolved.push(UnresolvedEntry {
            login: record.login.clone(),
            name: record.name.clone(),
            identifier: record.identifier.clone(),
        });
    }

    /// Identifiers synthesized so far in this run.
    pub fn generated_count(&self) -> usize {
        self.generated
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Unresolved entries of the whole run, stable-sorted by login.
    pub fn into_unresolved(self) -> Vec<UnresolvedEntry> {
        let mut entries = self.unresolved;
        entries.sort_by(|a, b| a.login.cmp(&b.login));
        entries
    }
}
