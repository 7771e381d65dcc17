use crate::models::PersonRecord;
use crate::xml::{DocumentHeader, RdfWriter, NS_MD, NS_RDF};
use anyhow::{Context, Result};

/// Monitel access (sysconfig) schema
pub const NS_ACCESS: &str = "http://monitel.com/2021/schema-access#";

/// Renders the access model: one `cim:Principal` per person, all bound to one domain.
pub fn render(
    records: &[PersonRecord],
    domain_id: &str,
    model_id: &str,
    header: &DocumentHeader,
) -> Result<String> {
    let mut w = RdfWriter::new();
    w.declaration()?;
    w.processing_instruction("iec61970-552 version=\"2.0\"")?;
    w.processing_instruction("floatExporter 1")?;
    w.open(
        "rdf:RDF",
        &[
            ("xmlns:rdf", NS_RDF),
            ("xmlns:md", NS_MD),
            ("xmlns:cim", NS_ACCESS),
        ],
    )?;
    w.full_model(model_id, header, "Access", true)?;

    for record in records {
        principal(&mut w, record, domain_id)
            .with_context(|| format!("Failed to render principal {}", record.identifier))?;
    }

    w.close("rdf:RDF")?;
    w.finish()
}

fn principal(w: &mut RdfWriter, record: &PersonRecord, domain_id: &str) -> Result<()> {
    w.open_about("cim:Principal", &record.identifier)?;
    w.text("cim:IdentifiedObject.name", &record.name)?;
    w.resource("cim:Principal.Domain", domain_id)?;
    w.text("cim:Principal.isEnabled", "true")?;
    w.text("cim:Principal.login", &record.login)?;
    if !record.parent_access.is_empty() {
        w.resource("cim:IdentifiedObject.ParentObject", &record.parent_access)?;
    }
    for role in record.role_refs() {
        w.resource("cim:Principal.Roles", role)?;
    }
    for group in record.group_refs() {
        w.resource("cim:Principal.Groups", group)?;
    }
    w.close("cim:Principal")
}
