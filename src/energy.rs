use crate::config::{ABBREVIATION_NAME_TYPE, ENERGY_MODEL_ID};
use crate::directory::new_identifier;
use crate::models::PersonRecord;
use crate::xml::{DocumentHeader, RdfWriter, NS_MD, NS_ME, NS_RDF};
use anyhow::{Context, Result};

const NS_CIM16: &str = "http://iec.ch/TC57/2014/CIM-schema-cim16#";
const NS_CIM17: &str = "http://iec.ch/TC57/2014/CIM-schema-cim17#";
const NS_RH: &str = "http://rushydro.ru/2015/schema-cim16#";
const NS_SO: &str = "http://so-ups.ru/2015/schema-cim16#";

/// Renders the energy model: a `cim:Person` and its short-name `cim:Name` per record.
pub fn render(records: &[PersonRecord], header: &DocumentHeader) -> Result<String> {
    let mut w = RdfWriter::new();
    w.declaration()?;
    w.open(
        "rdf:RDF",
        &[
            ("xmlns:md", NS_MD),
            ("xmlns:cim", NS_CIM16),
            ("xmlns:cim17", NS_CIM17),
            ("xmlns:me", NS_ME),
            ("xmlns:rh", NS_RH),
            ("xmlns:so", NS_SO),
            ("xmlns:rdf", NS_RDF),
        ],
    )?;
    w.full_model(ENERGY_MODEL_ID, header, "CIM16", false)?;

    for record in records {
        person(&mut w, record)
            .with_context(|| format!("Failed to render person {}", record.identifier))?;
    }

    w.close("rdf:RDF")?;
    w.finish()
}

fn person(w: &mut RdfWriter, record: &PersonRecord) -> Result<()> {
    let parts = record.name_parts();
    let name_id = new_identifier();

    w.open_about("cim:Person", &record.identifier)?;
    w.text("cim:IdentifiedObject.name", &record.name)?;
    w.resource("cim:IdentifiedObject.Names", &name_id)?;
    w.resource("me:IdentifiedObject.ParentObject", &record.parent_energy)?;

    if !record.email.is_empty() {
        w.open("cim:Person.electronicAddress", &[])?;
        w.open("cim:ElectronicAddress", &[])?;
        w.text("cim:ElectronicAddress.email1", &record.email)?;
        w.close("cim:ElectronicAddress")?;
        w.close("cim:Person.electronicAddress")?;
    }

    // Name parts are always present, possibly empty
    w.text("cim:Person.firstName", parts.first)?;
    w.text("cim:Person.lastName", parts.last)?;
    w.text("cim:Person.mName", parts.middle)?;

    if !record.mobile_phone.is_empty() {
        w.open("cim:Person.mobilePhone", &[])?;
        w.open("cim:TelephoneNumber", &[])?;
        w.text("cim:TelephoneNumber.localNumber", &record.mobile_phone)?;
        w.close("cim:TelephoneNumber")?;
        w.close("cim:Person.mobilePhone")?;
    }
    if !record.position.is_empty() {
        w.resource("me:Person.Position", &record.position)?;
    }
    if !record.electrical_safety_level.is_empty() {
        w.resource("me:Person.ElectricalSafetyLevel", &record.electrical_safety_level)?;
    }
    for authority in record.authority_refs() {
        w.resource("me:Person.OperationalAuthorities", authority)?;
    }
    w.close("cim:Person")?;

    w.open_about("cim:Name", &name_id)?;
    w.text("cim:Name.name", &parts.abbreviation())?;
    w.resource("cim:Name.IdentifiedObject", &record.identifier)?;
    w.resource("cim:Name.NameType", ABBREVIATION_NAME_TYPE)?;
    w.close("cim:Name")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> PersonRecord {
        PersonRecord {
            identifier: "P-1".to_string(),
            name: "Иванов Иван Петрович".to_string(),
            email: "ivanov@example.org".to_string(),
            mobile_phone: "+7 900 000-00-00".to_string(),
            position: "POS".to_string(),
            electrical_safety_level: "ESL".to_string(),
            operational_authorities: "a1!!a2".to_string(),
            parent_energy: "ORG".to_string(),
            ..Default::default()
        }
    }

    fn name_entity_id(xml: &str) -> String {
        let marker = "<cim:Name rdf:about=\"#_";
        let start = xml.find(marker).unwrap() + marker.len();
        xml[start..start + 36].to_string()
    }

    #[test]
    fn renders_full_person() -> Result<()> {
        let xml = render(&[full()], &DocumentHeader::now("1.0"))?;
        assert!(xml.contains("<md:FullModel rdf:about=\"#_energy\">"));
        assert!(xml.contains("<me:Model.name>CIM16</me:Model.name>"));
        assert!(xml.contains("<cim:Person rdf:about=\"#_P-1\">"));
        assert!(xml.contains("<cim:Person.lastName>Иванов</cim:Person.lastName>"));
        assert!(xml.contains("<cim:Person.firstName>Иван</cim:Person.firstName>"));
        assert!(xml.contains("<cim:Person.mName>Петрович</cim:Person.mName>"));
        assert!(xml.contains(
            "<cim:ElectronicAddress.email1>ivanov@example.org</cim:ElectronicAddress.email1>"
        ));
        assert!(xml.contains("<cim:TelephoneNumber.localNumber>+7 900 000-00-00</cim:TelephoneNumber.localNumber>"));
        assert!(xml.contains("<me:Person.Position rdf:resource=\"#_POS\"/>"));
        assert!(xml.contains("<me:Person.ElectricalSafetyLevel rdf:resource=\"#_ESL\"/>"));
        assert_eq!(xml.matches("<me:Person.OperationalAuthorities ").count(), 2);
        assert!(xml.contains("<me:IdentifiedObject.ParentObject rdf:resource=\"#_ORG\"/>"));
        assert!(xml.contains("<cim:Name.name>Иванов И.П.</cim:Name.name>"));
        assert!(xml.contains("<cim:Name.IdentifiedObject rdf:resource=\"#_P-1\"/>"));
        Ok(())
    }

    #[test]
    fn name_entity_is_linked_and_distinct() -> Result<()> {
        let xml = render(&[full()], &DocumentHeader::now("1.0"))?;
        let name_id = name_entity_id(&xml);
        assert_ne!(name_id, "P-1");
        assert!(xml.contains(&format!(
            "<cim:IdentifiedObject.Names rdf:resource=\"#_{}\"/>",
            name_id
        )));
        Ok(())
    }

    #[test]
    fn optional_blocks_omitted_but_name_parts_kept() -> Result<()> {
        let rec = PersonRecord {
            identifier: "P-2".to_string(),
            name: "Смирнов".to_string(),
            ..Default::default()
        };
        let xml = render(&[rec], &DocumentHeader::now("1.0"))?;
        assert!(!xml.contains("electronicAddress"));
        assert!(!xml.contains("mobilePhone"));
        assert!(!xml.contains("Person.Position"));
        assert!(!xml.contains("ElectricalSafetyLevel"));
        assert!(!xml.contains("OperationalAuthorities"));
        assert!(xml.contains("<cim:Person.firstName></cim:Person.firstName>"));
        assert!(xml.contains("<cim:Person.mName></cim:Person.mName>"));
        assert!(xml.contains("<cim:Name.name>Смирнов</cim:Name.name>"));
        Ok(())
    }
}
