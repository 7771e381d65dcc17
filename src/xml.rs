use anyhow::Result;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// RDF namespace shared by both documents
pub const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
/// IEC 61970-552 model description namespace
pub const NS_MD: &str = "http://iec.ch/TC57/61970-552/ModelDescription/1#";
/// Monitel CIM16 extensions (`me:`)
pub const NS_ME: &str = "http://monitel.com/2014/schema-cim16#";

/// Header values common to every generated document.
#[derive(Debug, Clone)]
pub struct DocumentHeader {
    pub created: DateTime<Utc>,
    pub model_version: String,
}

impl DocumentHeader {
    pub fn now(model_version: &str) -> Self {
        Self {
            created: Utc::now(),
            model_version: model_version.to_string(),
        }
    }

    /// Generation instant to whole seconds with a literal `Z`.
    pub fn created_text(&self) -> String {
        self.created.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// `#_<id>` form used for every `rdf:about` / `rdf:resource`.
pub fn rdf_ref(id: &str) -> String {
    format!("#_{}", id)
}

/// Thin element-tree builder over the quick-xml writer.
///
/// Text and attribute values are escaped by the writer.
pub struct RdfWriter {
    writer: Writer<Vec<u8>>,
}

impl RdfWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    pub fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    pub fn processing_instruction(&mut self, content: &str) -> Result<()> {
        self.writer
            .write_event(Event::PI(BytesText::from_escaped(content)))?;
        Ok(())
    }

    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    /// Opens an element whose identity is `rdf:about="#_<id>"`.
    pub fn open_about(&mut self, name: &str, id: &str) -> Result<()> {
        let about = rdf_ref(id);
        self.open(name, &[("rdf:about", about.as_str())])
    }

    pub fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Leaf element with text content; always emitted even when `text` is empty.
    pub fn text(&mut self, name: &str, text: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        // An empty text event keeps the indenter from breaking `<a></a>` over two lines
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Leaf element with text and extra attributes.
    pub fn text_with(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.open(name, attrs)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Empty element pointing at another object: `<name rdf:resource="#_<id>"/>`.
    pub fn resource(&mut self, name: &str, id: &str) -> Result<()> {
        let target = rdf_ref(id);
        let mut el = BytesStart::new(name);
        el.push_attribute(("rdf:resource", target.as_str()));
        self.writer.write_event(Event::Empty(el))?;
        Ok(())
    }

    /// `md:FullModel` block shared by both documents; `model_name` carries its own `xmlns:me`
    /// when the root does not declare it.
    pub fn full_model(
        &mut self,
        model_id: &str,
        header: &DocumentHeader,
        model_name: &str,
        inline_me_namespace: bool,
    ) -> Result<()> {
        self.open_about("md:FullModel", model_id)?;
        self.text("md:Model.created", &header.created_text())?;
        self.text("md:Model.version", &header.model_version)?;
        if inline_me_namespace {
            self.text_with("me:Model.name", &[("xmlns:me", NS_ME)], model_name)?;
        } else {
            self.text("me:Model.name", model_name)?;
        }
        self.close("md:FullModel")
    }

    pub fn finish(self) -> Result<String> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

impl Default for RdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_has_whole_seconds_and_z() {
        let header = DocumentHeader {
            created: Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap(),
            model_version: "1.0".to_string(),
        };
        assert_eq!(header.created_text(), "2024-03-05T07:08:09Z");
    }

    #[test]
    fn escapes_text_and_attributes() -> Result<()> {
        let mut w = RdfWriter::new();
        w.open_about("cim:Person", "a\"b")?;
        w.text("cim:IdentifiedObject.name", "Tom & <Jerry>")?;
        w.close("cim:Person")?;
        let xml = w.finish()?;
        assert!(xml.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(xml.contains("rdf:about=\"#_a&quot;b\""));
        Ok(())
    }

    #[test]
    fn empty_text_still_emits_element() -> Result<()> {
        let mut w = RdfWriter::new();
        w.text("cim:Person.mName", "")?;
        let xml = w.finish()?;
        assert_eq!(xml, "<cim:Person.mName></cim:Person.mName>");
        Ok(())
    }

    #[test]
    fn resource_is_self_closing() -> Result<()> {
        let mut w = RdfWriter::new();
        w.resource("cim:Principal.Roles", "R1")?;
        assert_eq!(w.finish()?, "<cim:Principal.Roles rdf:resource=\"#_R1\"/>");
        Ok(())
    }
}
