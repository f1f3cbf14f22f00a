//! Organisation extraction for the version upgrade.
//!
//! Older releases embed full organisation objects wherever one plays a
//! role. The upgrade promotes each into a top-level `parties` array and
//! leaves an `{id, name}` reference behind, accumulating the roles an
//! organisation plays across its embeddings.

use serde_json::{Map, Value};

/// Identifying fields hashed, in this order, when an organisation carries
/// neither an `id` nor a scheme-qualified identifier. The order is fixed:
/// changing it changes every generated id.
const IDENTITY_FIELDS: &[&[&str]] = &[
    &["identifier", "scheme"],
    &["identifier", "id"],
    &["identifier", "legalName"],
    &["identifier", "uri"],
    &["name"],
    &["address", "streetAddress"],
    &["address", "locality"],
    &["address", "region"],
    &["address", "postalCode"],
    &["address", "countryName"],
    &["contactPoint", "name"],
    &["contactPoint", "email"],
    &["contactPoint", "telephone"],
    &["contactPoint", "faxNumber"],
    &["contactPoint", "url"],
];

/// Accumulates the extracted parties of one release.
#[derive(Debug, Default)]
pub struct PartyLedger {
    parties: Vec<Value>,
}

impl PartyLedger {
    pub fn new() -> PartyLedger {
        PartyLedger::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    /// Promote `organization` into the parties array under `role` and
    /// return the reference that replaces the embedding.
    pub fn reference(&mut self, organization: &Value, role: &str) -> Value {
        let id = organization_id(organization);
        let name = organization.get("name").cloned();

        match self
            .parties
            .iter_mut()
            .find(|party| party.get("id") == Some(&id))
        {
            Some(party) => {
                if differs(party, organization) {
                    tracing::warn!(
                        target: "ocdsmeld::upgrade",
                        id = %render(&id),
                        "organisations with the same id differ; keeping the first"
                    );
                }
                if let Some(roles) = party.get_mut("roles").and_then(Value::as_array_mut) {
                    let role_value = Value::String(role.to_string());
                    if !roles.contains(&role_value) {
                        roles.push(role_value);
                    }
                }
            }
            None => {
                let mut party = Map::new();
                party.insert("id".to_string(), id.clone());
                if let Some(fields) = organization.as_object() {
                    for (key, value) in fields {
                        if key != "id" {
                            party.insert(key.clone(), value.clone());
                        }
                    }
                }
                party.insert(
                    "roles".to_string(),
                    Value::Array(vec![Value::String(role.to_string())]),
                );
                self.parties.push(Value::Object(party));
            }
        }

        let mut reference = Map::new();
        reference.insert("id".to_string(), id);
        if let Some(name) = name {
            if !name.is_null() {
                reference.insert("name".to_string(), name);
            }
        }
        Value::Object(reference)
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.parties)
    }
}

/// An organisation's stable identity: its own `id` if present, else
/// `{scheme}-{id}` from its identifier, else a hash of its identifying
/// fields.
fn organization_id(organization: &Value) -> Value {
    if let Some(id) = organization.get("id") {
        if !id.is_null() {
            return id.clone();
        }
    }

    let identifier = organization.get("identifier");
    let scheme = identifier
        .and_then(|i| i.get("scheme"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let scheme_id = identifier
        .and_then(|i| i.get("id"))
        .filter(|id| id.is_string() || id.is_number());
    if let (Some(scheme), Some(id)) = (scheme, scheme_id) {
        return Value::String(format!("{}-{}", scheme, render(id)));
    }

    Value::String(identity_hash(organization))
}

/// Blake3 over the unit-separator-joined identity fields, truncated to
/// twelve hex characters.
fn identity_hash(organization: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, field_path) in IDENTITY_FIELDS.iter().enumerate() {
        if i > 0 {
            hasher.update(&[0x1f]);
        }
        let mut node = Some(organization);
        for key in *field_path {
            node = node.and_then(|value| value.get(key));
        }
        if let Some(value) = node {
            if !value.is_null() {
                hasher.update(render(value).as_bytes());
            }
        }
    }
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..6])
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether the stored party and a newly encountered embedding disagree on
/// any field other than identity bookkeeping.
fn differs(party: &Value, organization: &Value) -> bool {
    let (Some(party), Some(organization)) = (party.as_object(), organization.as_object()) else {
        return false;
    };
    organization.iter().any(|(key, value)| {
        key != "id" && key != "roles" && party.get(key).map_or(true, |stored| stored != value)
    })
}
