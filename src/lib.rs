//! cimgen: personnel CSV to CIM/RDF model conversion
//!
//! Every `*.csv` file in a working directory is turned into two RDF/XML documents:
//!
//! 1. **Access model** -- one `cim:Principal` per person with login, domain, roles and groups
//! 2. **Energy model** -- one `cim:Person` per person with split name parts, contacts,
//!    position and authorities, plus a linked short-name `cim:Name`
//!
//! Each person gets a stable identifier. In directory mode the identifier is looked up
//! by login in Active Directory; people the directory does not know keep (or receive) a
//! local identifier and are listed in an audit file. Resolved identifiers are written
//! back into the input so later runs reuse them.
//!
//! # Pipeline
//!
//! - **Encoding detection** -- byte-order mark sniffing with a legacy Cyrillic fallback
//! - **Reading** -- delimiter detection from the header line, explicit record mapping
//! - **Identity resolution** -- local or directory-backed policy, unresolved bookkeeping
//! - **Rendering** -- structured XML writer, escaping handled by quick-xml
//! - **Writing** -- in-place CSV rewrite in the configured encoding, audit CSV
//!
//! # Key Modules
//!
//! - [`encoding`] -- BOM detection and decoding (including UTF-32)
//! - [`reader`] -- Delimited input parsing
//! - [`models`] -- `PersonRecord`, header mapping, name and list splitting
//! - [`directory`] -- Directory capability trait and LDAP implementation
//! - [`identity`] -- Identifier policy and unresolved list
//! - [`xml`] -- RDF writer helpers shared by both renderers
//! - [`access`] -- Access (sysconfig) model renderer
//! - [`energy`] -- Energy model renderer
//! - [`writer`] -- Input rewrite and audit file
//! - [`pipeline`] -- Run orchestration with per-file error isolation
//! - [`logging`] -- Console subscriber and per-file log dispatchers
//! - [`stats`] -- Run counters
//! - [`config`] -- JSON configuration and constants
//!
//! # Example Usage
//!
//! ```bash
//! # Local identifiers, operator-supplied domain identifier
//! cimgen --mode local --domain-guid 7C1A...E2 --dir ./people
//!
//! # Directory lookups (password from the environment)
//! CIMGEN_DIRECTORY_PASSWORD=... cimgen --mode directory -v
//! ```

pub mod access;
pub mod config;
pub mod directory;
pub mod encoding;
pub mod energy;
pub mod identity;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod stats;
pub mod writer;
pub mod xml;
