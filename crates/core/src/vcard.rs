//! vCard 3.0 / 4.0 contact parsing.
//!
//! Contact cards skip language-model extraction: each accepted contact maps
//! straight to one `INDIVIDUAL` entity with a fixed, high confidence.

use crate::models::{ContactRecord, EntityType, ExtractedEntity};
use serde_json::{json, Map, Value};

/// Confidence attached to contact-derived entities. Structured fields are far
/// more reliable than free-text extraction.
pub const CONTACT_CONFIDENCE: f64 = 0.9;

/// Parses a single contact. Every recognized property in `vcf_content` is
/// applied, so the result may carry an empty display name.
pub fn parse_vcf(vcf_content: &str) -> ContactRecord {
    let mut contact = ContactRecord::default();

    for line in unfold_lines(vcf_content) {
        apply_property(&mut contact, &line);
    }

    contact
}

/// Parses a file that may hold many contacts. Contacts without a display
/// name are dropped.
pub fn parse_vcf_file(content: &str) -> Vec<ContactRecord> {
    let mut contacts = Vec::new();
    let mut current: Option<ContactRecord> = None;

    for line in unfold_lines(content) {
        if line.eq_ignore_ascii_case("BEGIN:VCARD") {
            if let Some(unterminated) = current.take() {
                push_named(&mut contacts, unterminated);
            }
            current = Some(ContactRecord::default());
        } else if line.eq_ignore_ascii_case("END:VCARD") {
            if let Some(finished) = current.take() {
                push_named(&mut contacts, finished);
            }
        } else if let Some(contact) = current.as_mut() {
            apply_property(contact, &line);
        }
    }

    if let Some(unterminated) = current {
        push_named(&mut contacts, unterminated);
    }

    contacts
}

fn push_named(contacts: &mut Vec<ContactRecord>, contact: ContactRecord) {
    if is_named(&contact) {
        contacts.push(contact);
    }
}

/// Contacts without a display name are never emitted as entities.
pub fn is_named(contact: &ContactRecord) -> bool {
    !contact.display_name.trim().is_empty()
}

/// Joins RFC 6350 continuation lines and drops blank lines. A fold may fall
/// anywhere, so only the single leading space or tab of a continuation is
/// removed and logical lines are trimmed once complete.
fn unfold_lines(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in content.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(continuation) = raw.strip_prefix([' ', '\t']) {
            if let Some(previous) = lines.last_mut() {
                previous.push_str(continuation);
                continue;
            }
        }

        if !raw.trim().is_empty() {
            lines.push(raw.to_string());
        }
    }

    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn apply_property(contact: &mut ContactRecord, line: &str) {
    let Some((raw_key, value)) = line.split_once(':') else {
        return;
    };

    // `item1.EMAIL;TYPE=HOME` -> `EMAIL`
    let key = raw_key.split(';').next().unwrap_or_default();
    let key = key.rsplit('.').next().unwrap_or(key).trim().to_ascii_uppercase();
    let value = value.trim();

    match key.as_str() {
        "FN" => contact.display_name = value.to_string(),
        "N" => {
            let parts: Vec<&str> = value.split(';').collect();
            if parts.len() >= 2 {
                contact.surname = non_empty(parts[0]);
                contact.given_names = non_empty(parts[1]);
            }
        }
        "BDAY" => contact.birth_date = Some(value.to_string()),
        "EMAIL" => contact.email = Some(value.to_string()),
        "TEL" => contact.phone = Some(value.to_string()),
        "NOTE" => contact.note = Some(value.to_string()),
        _ => {}
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl From<ContactRecord> for ExtractedEntity {
    fn from(contact: ContactRecord) -> Self {
        let mut data = Map::new();
        data.insert("display_name".to_string(), json!(contact.display_name));
        data.insert("given_names".to_string(), optional(contact.given_names));
        data.insert("surname".to_string(), optional(contact.surname));
        data.insert("birth_date".to_string(), optional(contact.birth_date));
        data.insert("email".to_string(), optional(contact.email));
        data.insert("phone".to_string(), optional(contact.phone));
        data.insert("note".to_string(), optional(contact.note));

        ExtractedEntity::new(EntityType::Individual, data, CONTACT_CONFIDENCE)
    }
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
