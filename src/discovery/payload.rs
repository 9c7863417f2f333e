use crate::error::{Error, Result};
use crate::server::ServerRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const SERVER_ELEMENT: &[u8] = b"smtInfo";
const FINGERPRINT: &str = "fingerprint";
const SERVER_IP: &str = "SMTserverIP";
const SERVER_NAME: &str = "SMTserverName";

/// Every field the metadata endpoint must provide.
pub const METADATA_FIELDS: [&str; 3] = [FINGERPRINT, SERVER_IP, SERVER_NAME];

/// Decode a region server response:
///
/// ```xml
/// <regionSMTdata>
///   <smtInfo fingerprint="AA:BB" SMTserverIP="10.0.0.1" SMTserverName="smt.example.com"/>
/// </regionSMTdata>
/// ```
///
/// Malformed XML, an `smtInfo` element missing an attribute, or a document
/// without any `smtInfo` element is an error.
pub fn parse_region_xml(xml: &str) -> Result<Vec<ServerRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut servers = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element))
                if element.local_name().as_ref() == SERVER_ELEMENT =>
            {
                let mut fingerprint = None;
                let mut ip = None;
                let mut fqdn = None;

                for attribute in element.attributes() {
                    let attribute = attribute.map_err(|e| Error::Xml(e.to_string()))?;
                    let value = attribute
                        .unescape_value()
                        .map_err(|e| Error::Xml(e.to_string()))?
                        .trim()
                        .to_string();
                    match attribute.key.local_name().as_ref() {
                        b"fingerprint" => fingerprint = Some(value),
                        b"SMTserverIP" => ip = Some(value),
                        b"SMTserverName" => fqdn = Some(value),
                        _ => {}
                    }
                }

                let missing = [(FINGERPRINT, &fingerprint), (SERVER_IP, &ip), (SERVER_NAME, &fqdn)]
                    .iter()
                    .find(|(_, v)| v.as_deref().map(str::is_empty).unwrap_or(true))
                    .map(|(name, _)| *name);
                if let Some(name) = missing {
                    return Err(Error::Xml(format!("smtInfo element lacks '{}'", name)));
                }

                servers.push(ServerRecord::new(
                    ip.unwrap_or_default(),
                    fqdn.unwrap_or_default(),
                    fingerprint.unwrap_or_default(),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if servers.is_empty() {
        return Err(Error::Xml("no smtInfo element in response".to_string()));
    }

    Ok(servers)
}

/// Decode the metadata endpoint's JSON body. A missing or empty field is
/// reported as [`Error::MissingMetadataField`].
pub fn parse_metadata_json(body: &str) -> Result<ServerRecord> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Discovery(format!("invalid metadata response: {}", e)))?;

    let field = |name: &str| -> Result<String> {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or_else(|| Error::MissingMetadataField(name.to_string()))
    };

    let fingerprint = field(FINGERPRINT)?;
    let ip = field(SERVER_IP)?;
    let fqdn = field(SERVER_NAME)?;

    Ok(ServerRecord::new(ip, fqdn, fingerprint))
}
