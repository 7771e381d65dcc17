use crate::access;
use crate::config::{AppConfig, SAMPLE_FILE_NAME};
use crate::directory::Directory;
use crate::energy;
use crate::identity::IdentityResolver;
use crate::logging;
use crate::models::FieldMap;
use crate::reader;
use crate::stats::RunStats;
use crate::writer;
use crate::xml::DocumentHeader;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

/// How identities are established for this run.
pub enum RunMode<'d> {
    /// Identifiers come from the input; the operator supplies the domain identifier
    Local { domain_id: String },
    /// An authenticated directory session supplies both
    Directory(&'d mut dyn Directory),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub work_dir: PathBuf,
    /// Write a log file per input under the configured log directory
    pub file_logs: bool,
    /// Console level used inside per-file log scopes
    pub console_level: Level,
}

impl RunOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            file_logs: true,
            console_level: Level::WARN,
        }
    }
}

/// Progress notifications for a front-end running the pipeline on a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    FilesDiscovered(usize),
    FileStarted { name: String, index: usize },
    FileFinished { name: String, outcome: FileOutcome },
    AuditWritten { path: PathBuf, entries: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Both documents written and the input rewritten
    Converted { records: usize },
    /// No row had a display name; nothing written
    NoRecords,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub files_converted: usize,
    pub files_failed: usize,
    pub records: usize,
    /// Rows dropped for a blank name
    pub rows_skipped: usize,
    pub unresolved: usize,
    pub audit_file: Option<PathBuf>,
}

/// Drives a run: mode setup, file discovery, per-file conversion and the audit.
///
/// Failures while establishing the run (domain identifier, configuration) abort
/// before any file is touched. Failures inside one file are logged and the run
/// moves on; whatever that file already wrote stays on disk.
pub struct Pipeline<'c> {
    config: &'c AppConfig,
    options: RunOptions,
    events: Option<Sender<RunEvent>>,
    stats: Arc<RunStats>,
}

impl<'c> Pipeline<'c> {
    pub fn new(config: &'c AppConfig, options: RunOptions) -> Self {
        Self {
            config,
            options,
            events: None,
            stats: Arc::new(RunStats::new()),
        }
    }

    pub fn with_events(mut self, events: Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // A front-end that went away does not stop the run
            let _ = tx.send(event);
        }
    }

    pub fn run(&self, mode: RunMode<'_>) -> Result<RunSummary> {
        self.config.validate()?;

        let (domain_id, mut resolver) = match mode {
            RunMode::Local { domain_id } => {
                let domain_id = domain_id.trim().to_uppercase();
                if domain_id.is_empty() {
                    bail!("A domain identifier is required in local mode");
                }
                info!(domain = %domain_id, "Using operator-supplied domain identifier");
                (domain_id, IdentityResolver::local())
            }
            RunMode::Directory(directory) => {
                let domain_id = directory
                    .resolve_domain_identifier()
                    .context("Failed to resolve domain identifier")?;
                info!(domain = %domain_id, "Using directory domain identifier");
                (domain_id, IdentityResolver::with_directory(directory))
            }
        };

        let files = discover_files(&self.options.work_dir, &self.config.output.audit_file)?;
        self.emit(RunEvent::FilesDiscovered(files.len()));
        let mut summary = RunSummary {
            files_found: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            warn!(dir = %self.options.work_dir.display(), "No CSV files to process");
            return Ok(summary);
        }

        for (index, path) in files.iter().enumerate() {
            let name = file_name(path);
            self.emit(RunEvent::FileStarted {
                name: name.clone(),
                index,
            });

            let result = self.in_file_scope(path, || {
                let result = self.process_file(path, &domain_id, &mut resolver);
                if let Err(e) = &result {
                    error!(file = %name, "Processing failed: {:#}", e);
                }
                result
            });

            let outcome = match result {
                Ok(0) => FileOutcome::NoRecords,
                Ok(records) => {
                    summary.files_converted += 1;
                    summary.records += records;
                    FileOutcome::Converted { records }
                }
                Err(e) => {
                    summary.files_failed += 1;
                    FileOutcome::Failed(format!("{:#}", e))
                }
            };
            self.emit(RunEvent::FileFinished { name, outcome });
        }

        let unresolved = resolver.into_unresolved();
        summary.unresolved = unresolved.len();
        summary.rows_skipped = self.stats.skipped() as usize;

        let audit_path = self.options.work_dir.join(&self.config.output.audit_file);
        match writer::write_audit(&audit_path, &unresolved) {
            Ok(true) => {
                warn!(path = %audit_path.display(), entries = unresolved.len(), "Logins not found in directory saved");
                self.emit(RunEvent::AuditWritten {
                    path: audit_path.clone(),
                    entries: unresolved.len(),
                });
                summary.audit_file = Some(audit_path);
            }
            Ok(false) => {}
            Err(e) => error!("Failed to write audit file: {:#}", e),
        }

        info!(
            converted = summary.files_converted,
            failed = summary.files_failed,
            records = summary.records,
            "Run complete"
        );
        Ok(summary)
    }

    /// Runs `f` with events mirrored into the file's own log when file logs are on.
    fn in_file_scope<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        if !self.options.file_logs {
            return f();
        }
        let log_dir = self.options.work_dir.join(&self.config.output.log_dir);
        match logging::file_dispatch(&log_dir, path, self.options.console_level) {
            Ok((dispatch, _)) => tracing::dispatcher::with_default(&dispatch, f),
            Err(e) => {
                warn!("Per-file log unavailable: {:#}", e);
                f()
            }
        }
    }

    /// Converts one input file; returns the number of records written.
    fn process_file(
        &self,
        path: &Path,
        domain_id: &str,
        resolver: &mut IdentityResolver<'_>,
    ) -> Result<usize> {
        let name = file_name(path);
        info!(file = %name, "Processing started");

        let table = reader::read_file(path, self.config.input_encoding(), self.config.delimiter()?)?;
        info!(
            encoding = %table.encoding,
            delimiter = %(table.delimiter as char),
            rows = table.rows.len(),
            "Input read"
        );

        let fields = FieldMap::from_headers(&table.headers)
            .with_context(|| format!("Unrecognized header in {}", name))?;

        let generated_before = resolver.generated_count();
        let mut records = Vec::with_capacity(table.rows.len());
        for (line, row) in table.rows.iter().enumerate() {
            match fields.record(line, row) {
                Some(mut record) => {
                    resolver.resolve(&mut record);
                    records.push(record);
                }
                None => debug!(row = line + 1, "Skipped row without name"),
            }
        }
        let skipped = table.rows.len() - records.len();
        self.stats.add_skipped(skipped as u64);
        self.stats
            .add_generated((resolver.generated_count() - generated_before) as u64);

        if records.is_empty() {
            info!(file = %name, skipped, "No rows with a name; nothing written");
            return Ok(0);
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path.parent().unwrap_or(Path::new("."));
        let access_path = dir.join(format!("{}{}", stem, self.config.output.access_xml_suffix));
        let energy_path = dir.join(format!("{}{}", stem, self.config.output.energy_xml_suffix));

        let access_xml = access::render(
            &records,
            domain_id,
            &self.config.xml.access_model_id,
            &DocumentHeader::now(&self.config.xml.access_model_version),
        )?;
        let energy_xml = energy::render(
            &records,
            &DocumentHeader::now(&self.config.xml.energy_model_version),
        )?;
        fs::write(&access_path, access_xml)
            .with_context(|| format!("Failed to write {}", access_path.display()))?;
        fs::write(&energy_path, energy_xml)
            .with_context(|| format!("Failed to write {}", energy_path.display()))?;
        info!(
            access = %access_path.display(),
            energy = %energy_path.display(),
            records = records.len(),
            "XML written"
        );

        writer::rewrite_input(
            path,
            &table,
            &records,
            fields.identifier_column(),
            self.config.output_encoding(),
        )?;
        info!(
            file = %name,
            unresolved_so_far = resolver.unresolved_count(),
            "Input rewritten with identifiers"
        );

        self.stats.add_records(records.len() as u64);
        Ok(records.len())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `*.csv` files in `dir`, excluding the sample template and the audit file, sorted by name.
pub fn discover_files(dir: &Path, audit_file: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let name = file_name(&path);
        if is_csv && name != SAMPLE_FILE_NAME && name != audit_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovery_skips_sample_audit_and_other_files() -> Result<()> {
        let dir = TempDir::new()?;
        for name in ["b.csv", "A.CSV", "Sample.csv", "not_in_AD.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "name\n")?;
        }
        fs::create_dir(dir.path().join("sub.csv"))?;

        let files: Vec<String> = discover_files(dir.path(), "not_in_AD.csv")?
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(files, vec!["A.CSV", "b.csv"]);
        Ok(())
    }

    #[test]
    fn local_mode_requires_domain_identifier() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let pipeline = Pipeline::new(&config, RunOptions::new(dir.path()));
        let result = pipeline.run(RunMode::Local {
            domain_id: "  ".to_string(),
        });
        assert!(result.is_err());
    }
}
