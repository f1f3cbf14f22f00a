//! Deterministic upgrade from the older schema version to the current one.
//!
//! Applied uniformly to release packages, record packages, records and bare
//! releases. No downgrade exists; asking for one fails.

pub mod organizations;

use crate::error::UpgradeError;
use crate::schema::{minor_version, CURRENT_VERSION, OLDEST_VERSION};
use organizations::PartyLedger;
use serde_json::{Map, Value};

/// Upgrade `data` in place from minor version `from` to `to`.
pub fn upgrade(data: &mut Value, from: &str, to: &str) -> Result<(), UpgradeError> {
    let from = minor_version(from);
    let to = minor_version(to);
    if from == to {
        return Ok(());
    }
    if (from, to) != (OLDEST_VERSION, CURRENT_VERSION) {
        return Err(match (parse_version(from), parse_version(to)) {
            (Some(older), Some(newer)) if older > newer => UpgradeError::Downgrade {
                from: from.to_string(),
                to: to.to_string(),
            },
            _ => UpgradeError::UnsupportedPath {
                from: from.to_string(),
                to: to.to_string(),
            },
        });
    }

    match classify(data) {
        Shape::RecordPackage => {
            if let Some(records) = data.get_mut("records").and_then(Value::as_array_mut) {
                for record in records {
                    upgrade_record(record);
                }
            }
            stamp_version(data, to);
        }
        Shape::ReleasePackage => {
            if let Some(releases) = data.get_mut("releases").and_then(Value::as_array_mut) {
                for release in releases {
                    upgrade_release(release);
                }
            }
            stamp_version(data, to);
        }
        Shape::Record => upgrade_record(data),
        Shape::Release => upgrade_release(data),
    }
    Ok(())
}

enum Shape {
    RecordPackage,
    ReleasePackage,
    Record,
    Release,
}

fn classify(data: &Value) -> Shape {
    let object = data.as_object();
    let has = |key: &str| object.map_or(false, |map| map.contains_key(key));
    if has("records") {
        Shape::RecordPackage
    } else if has("ocid") && has("releases") {
        Shape::Record
    } else if has("releases") {
        Shape::ReleasePackage
    } else {
        Shape::Release
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn upgrade_record(record: &mut Value) {
    if let Some(releases) = record.get_mut("releases").and_then(Value::as_array_mut) {
        for release in releases {
            // Linked releases are references, not upgrade subjects.
            let linked = release.get("url").is_some();
            if !linked {
                upgrade_release(release);
            }
        }
    }
    if let Some(compiled) = record.get_mut("compiledRelease") {
        upgrade_release(compiled);
    }
    // versionedRelease is not release-shaped; it stays as published.
}

/// Apply the sub-transforms to one release, in order: organisation
/// extraction, amendment renames, transaction renames, empty-array pruning.
fn upgrade_release(release: &mut Value) {
    let Some(object) = release.as_object_mut() else {
        return;
    };
    let mut ledger = PartyLedger::new();

    let buyer = object.get("buyer").filter(|buyer| buyer.is_object()).cloned();
    if let Some(buyer) = buyer {
        let reference = ledger.reference(&buyer, "buyer");
        object.insert("buyer".to_string(), reference);
    }

    if let Some(tender) = object.get_mut("tender").and_then(Value::as_object_mut) {
        let entity = tender
            .get("procuringEntity")
            .filter(|entity| entity.is_object())
            .cloned();
        if let Some(entity) = entity {
            let reference = ledger.reference(&entity, "procuringEntity");
            tender.insert("procuringEntity".to_string(), reference);
        }
        if let Some(tenderers) = tender.get_mut("tenderers").and_then(Value::as_array_mut) {
            for tenderer in tenderers {
                if tenderer.is_object() {
                    let reference = ledger.reference(tenderer, "tenderer");
                    *tenderer = reference;
                }
            }
        }
        move_amendment(tender);
    }

    if let Some(awards) = object.get_mut("awards").and_then(Value::as_array_mut) {
        for award in awards {
            if let Some(award) = award.as_object_mut() {
                replace_suppliers(award, &mut ledger);
                move_amendment(award);
            }
        }
    }

    if let Some(contracts) = object.get_mut("contracts").and_then(Value::as_array_mut) {
        for contract in contracts {
            if let Some(contract) = contract.as_object_mut() {
                replace_suppliers(contract, &mut ledger);
                move_amendment(contract);
                upgrade_transactions(contract, &mut ledger);
            }
        }
    }

    if !ledger.is_empty() {
        object.insert("parties".to_string(), ledger.into_value());
    }
    prune_empty_arrays(release);
}

fn replace_suppliers(object: &mut Map<String, Value>, ledger: &mut PartyLedger) {
    if let Some(suppliers) = object.get_mut("suppliers").and_then(Value::as_array_mut) {
        for supplier in suppliers {
            if supplier.is_object() {
                let reference = ledger.reference(supplier, "supplier");
                *supplier = reference;
            }
        }
    }
}

/// `amendment` becomes an entry of the sibling `amendments` array,
/// preserving existing entries and de-duplicating.
fn move_amendment(object: &mut Map<String, Value>) {
    let Some(amendment) = object.remove("amendment") else {
        return;
    };
    if amendment.is_null() {
        return;
    }
    let amendments = object
        .entry("amendments".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(entries) = amendments {
        if !entries.contains(&amendment) {
            entries.push(amendment);
        }
    }
}

fn upgrade_transactions(contract: &mut Map<String, Value>, ledger: &mut PartyLedger) {
    let Some(transactions) = contract
        .get_mut("implementation")
        .and_then(|implementation| implementation.get_mut("transactions"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for transaction in transactions {
        let Some(transaction) = transaction.as_object_mut() else {
            continue;
        };
        if let Some(amount) = transaction.remove("amount") {
            transaction.entry("value".to_string()).or_insert(amount);
        }
        if let Some(provider) = transaction.remove("providerOrganization") {
            if !provider.is_null() {
                let organization = identifier_organization(provider);
                let reference = ledger.reference(&organization, "payer");
                transaction.insert("payer".to_string(), reference);
            }
        }
        if let Some(receiver) = transaction.remove("receiverOrganization") {
            if !receiver.is_null() {
                let organization = identifier_organization(receiver);
                let reference = ledger.reference(&organization, "payee");
                transaction.insert("payee".to_string(), reference);
            }
        }
    }
}

/// Older transactions point at bare identifiers; wrap one as an
/// organisation so it can join `parties`.
fn identifier_organization(identifier: Value) -> Value {
    let mut organization = Map::new();
    if let Some(legal_name) = identifier.get("legalName") {
        if !legal_name.is_null() {
            organization.insert("name".to_string(), legal_name.clone());
        }
    }
    organization.insert("identifier".to_string(), identifier);
    Value::Object(organization)
}

/// Remove empty arrays to avoid type ambiguity downstream.
fn prune_empty_arrays(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let doomed: Vec<String> = map
                .iter()
                .filter(|(_, child)| matches!(child, Value::Array(items) if items.is_empty()))
                .map(|(key, _)| key.clone())
                .collect();
            for key in doomed {
                map.remove(&key);
            }
            for child in map.values_mut() {
                prune_empty_arrays(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                prune_empty_arrays(item);
            }
        }
        _ => {}
    }
}

/// Set the package's version and float it to the top.
fn stamp_version(package: &mut Value, to: &str) {
    if let Some(map) = package.as_object_mut() {
        let rest = std::mem::take(map);
        map.insert("version".to_string(), Value::String(to.to_string()));
        for (key, value) in rest {
            if key != "version" {
                map.insert(key, value);
            }
        }
    }
}
