//! package.xml manifests.
//!
//! Only the parts the change-set workflow uses are modelled: the XML
//! declaration, the `Package` namespace, its `types` entries and the API
//! `version`. Unknown elements are ignored on read.

use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::io;

pub const MANIFEST_FILE: &str = "package.xml";
pub const DEFAULT_XML_VERSION: &str = "1.0";
pub const DEFAULT_ENCODING: &str = "UTF-8";
pub const DEFAULT_XMLNS: &str = "http://soap.sforce.com/2006/04/metadata";
pub const DEFAULT_API_VERSION: &str = "53.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestType {
    pub name: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub xml_version: Option<String>,
    pub encoding: Option<String>,
    pub xmlns: Option<String>,
    pub version: Option<String>,
    pub types: Vec<ManifestType>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Members,
    Name,
    Version,
}

impl PackageManifest {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = io::read_file(path, "read package manifest")?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn parse(xml: &str, label: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut manifest = PackageManifest::default();
        let mut stack: Vec<String> = Vec::new();
        let mut current_type: Option<ManifestType> = None;
        let mut field: Option<Field> = None;
        let mut text = String::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;

            match event {
                Event::Decl(decl) => {
                    let version = decl
                        .version()
                        .map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;
                    manifest.xml_version = Some(String::from_utf8_lossy(&version).into_owned());
                    if let Some(encoding) = decl.encoding() {
                        let encoding = encoding.map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;
                        manifest.encoding = Some(String::from_utf8_lossy(&encoding).into_owned());
                    }
                }
                Event::Start(start) => {
                    let name = local_name(&start);
                    match (stack.as_slice(), name.as_str()) {
                        ([], "Package") => manifest.xmlns = xmlns(&start, label)?,
                        ([package], "types") if package == "Package" => {
                            current_type = Some(ManifestType::default());
                        }
                        ([package], "version") if package == "Package" => field = Some(Field::Version),
                        ([package, types], "members") if package == "Package" && types == "types" => {
                            field = Some(Field::Members)
                        }
                        ([package, types], "name") if package == "Package" && types == "types" => {
                            field = Some(Field::Name)
                        }
                        _ => {}
                    }
                    text.clear();
                    stack.push(name);
                }
                Event::Empty(start) => {
                    if stack.is_empty() && local_name(&start) == "Package" {
                        manifest.xmlns = xmlns(&start, label)?;
                    }
                }
                Event::Text(content) => {
                    let unescaped = content
                        .unescape()
                        .map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Event::CData(content) => {
                    text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
                Event::End(_) => {
                    let closed = stack.pop();
                    match field.take() {
                        Some(Field::Version) => manifest.version = Some(std::mem::take(&mut text)),
                        Some(Field::Members) => {
                            if let Some(entry) = current_type.as_mut() {
                                entry.members.push(std::mem::take(&mut text));
                            }
                        }
                        Some(Field::Name) => {
                            if let Some(entry) = current_type.as_mut() {
                                entry.name = Some(std::mem::take(&mut text));
                            }
                        }
                        None => {
                            if closed.as_deref() == Some("types") && stack.len() == 1 {
                                if let Some(entry) = current_type.take() {
                                    manifest.types.push(entry);
                                }
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::manifest_invalid_xml(label, format!("unclosed element <{}>", stack.join("><"))));
        }

        Ok(manifest)
    }

    /// Component type to members, skipping entries without a name or members.
    pub fn components(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.types.iter().filter_map(|entry| match &entry.name {
            Some(name) if !entry.members.is_empty() => Some((name.as_str(), entry.members.as_slice())),
            _ => None,
        })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "<?xml version=\"{}\" encoding=\"{}\"?>\n",
            escape(self.xml_version.as_deref().unwrap_or(DEFAULT_XML_VERSION)),
            escape(self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING)),
        ));
        out.push_str(&format!(
            "<Package xmlns=\"{}\">\n",
            escape(self.xmlns.as_deref().unwrap_or(DEFAULT_XMLNS))
        ));
        for entry in &self.types {
            out.push_str("  <types>\n");
            for member in &entry.members {
                out.push_str(&format!("    <members>{}</members>\n", escape(member.as_str())));
            }
            if let Some(name) = &entry.name {
                out.push_str(&format!("    <name>{}</name>\n", escape(name.as_str())));
            }
            out.push_str("  </types>\n");
        }
        if let Some(version) = &self.version {
            out.push_str(&format!("  <version>{}</version>\n", escape(version.as_str())));
        }
        out.push_str("</Package>\n");
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        io::write_file(path, &self.to_xml(), "write package manifest")
    }
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn xmlns(start: &BytesStart, label: &str) -> Result<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;
        if attribute.key.as_ref() == b"xmlns" {
            let value = attribute
                .unescape_value()
                .map_err(|e| Error::manifest_invalid_xml(label, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
