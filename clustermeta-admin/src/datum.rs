//! Converting between row values and metadata.

use crate::config::IdentifierFormat;
use crate::error::{AdminError, AdminResult};
use clustermeta_cluster::{ClusterMetadata, Interruptor};
use clustermeta_types::{DatabaseId, Name, ServerId};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;

pub(crate) type Row = Map<String, Value>;

pub(crate) fn check_interrupted(interruptor: &Interruptor) -> AdminResult<()> {
    if interruptor.is_cancelled() {
        Err(AdminError::Interrupted)
    } else {
        Ok(())
    }
}

/// Parses a primary key as a resource id. A key that isn't a UUID string
/// can't name any resource.
pub(crate) fn parse_id<T: FromStr>(primary_key: &Value) -> Option<T> {
    primary_key.as_str().and_then(|s| s.parse().ok())
}

pub(crate) fn expect_object<'a>(value: &'a Value, what: &str) -> AdminResult<&'a Row> {
    value
        .as_object()
        .ok_or_else(|| AdminError::Validation(format!("expected {what} to be an object, got {value}")))
}

/// Checks that `row` has every key in `required`, and no key outside
/// `required` and `optional`.
pub(crate) fn check_keys(
    row: &Row,
    what: &str,
    required: &[&str],
    optional: &[&str],
) -> AdminResult<()> {
    if let Some(missing) = required.iter().find(|key| !row.contains_key(**key)) {
        return Err(AdminError::Validation(format!(
            "{what} is missing required field `{missing}`"
        )));
    }
    if let Some(extra) = row
        .keys()
        .find(|key| !required.contains(&key.as_str()) && !optional.contains(&key.as_str()))
    {
        return Err(AdminError::Validation(format!(
            "{what} has unexpected field `{extra}`"
        )));
    }
    Ok(())
}

pub(crate) fn field<'a>(row: &'a Row, key: &str) -> &'a Value {
    row.get(key).unwrap_or(&Value::Null)
}

pub(crate) fn to_str<'a>(value: &'a Value, what: &str) -> AdminResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| AdminError::Validation(format!("expected {what} to be a string, got {value}")))
}

pub(crate) fn to_array<'a>(value: &'a Value, what: &str) -> AdminResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| AdminError::Validation(format!("expected {what} to be an array, got {value}")))
}

pub(crate) fn to_name(value: &Value, what: &str) -> AdminResult<Name> {
    Ok(Name::new(to_str(value, what)?)?)
}

pub(crate) fn to_name_set(value: &Value, what: &str) -> AdminResult<BTreeSet<Name>> {
    let mut names = BTreeSet::new();
    for item in to_array(value, what)? {
        let name = to_name(item, what)?;
        if !names.insert(name.clone()) {
            return Err(AdminError::Validation(format!("{what} contains `{name}` twice")));
        }
    }
    Ok(names)
}

pub(crate) fn name_set_to_datum(names: &BTreeSet<Name>) -> Value {
    Value::Array(names.iter().map(|n| Value::from(n.as_str())).collect())
}

/// Renders a server reference. A server that has left the cluster has no
/// name to show; it renders as `null` in name format.
pub(crate) fn server_to_datum(
    server: ServerId,
    format: IdentifierFormat,
    snapshot: &ClusterMetadata,
) -> Value {
    match format {
        IdentifierFormat::Uuid => Value::from(server.to_string()),
        IdentifierFormat::Name => snapshot
            .servers()
            .get(&server)
            .map_or(Value::Null, |s| Value::from(s.name().as_str())),
    }
}

pub(crate) fn database_to_datum(
    database: DatabaseId,
    format: IdentifierFormat,
    snapshot: &ClusterMetadata,
) -> Value {
    match format {
        IdentifierFormat::Uuid => Value::from(database.to_string()),
        IdentifierFormat::Name => snapshot
            .databases()
            .get(&database)
            .map_or(Value::Null, |db| Value::from(db.name().as_str())),
    }
}

/// Resolves a server reference to a live server.
pub(crate) fn server_from_datum(
    value: &Value,
    format: IdentifierFormat,
    snapshot: &ClusterMetadata,
) -> AdminResult<ServerId> {
    match format {
        IdentifierFormat::Uuid => {
            let raw = to_str(value, "a server id")?;
            let id = ServerId::parse(raw)
                .map_err(|_| AdminError::Validation(format!("`{raw}` is not a valid server id")))?;
            if snapshot.servers().contains_key(&id) {
                Ok(id)
            } else {
                Err(AdminError::Conflict(format!("server `{id}` does not exist")))
            }
        }
        IdentifierFormat::Name => {
            let name = to_name(value, "a server name")?;
            unique(snapshot.server_ids_named(&name), "server", &name)
        }
    }
}

/// Resolves a database reference to a live database.
pub(crate) fn database_from_datum(
    value: &Value,
    format: IdentifierFormat,
    snapshot: &ClusterMetadata,
) -> AdminResult<DatabaseId> {
    match format {
        IdentifierFormat::Uuid => {
            let raw = to_str(value, "a database id")?;
            let id = DatabaseId::parse(raw)
                .map_err(|_| AdminError::Validation(format!("`{raw}` is not a valid database id")))?;
            if snapshot.databases().contains_key(&id) {
                Ok(id)
            } else {
                Err(AdminError::Conflict(format!("database `{id}` does not exist")))
            }
        }
        IdentifierFormat::Name => {
            let name = to_name(value, "a database name")?;
            unique(snapshot.database_ids_named(&name), "database", &name)
        }
    }
}

fn unique<T: Copy>(ids: Vec<T>, kind: &str, name: &Name) -> AdminResult<T> {
    match ids.as_slice() {
        [id] => Ok(*id),
        [] => Err(AdminError::Conflict(format!("{kind} `{name}` does not exist"))),
        _ => Err(AdminError::Conflict(format!(
            "{kind} name `{name}` is ambiguous; there are multiple {kind}s with that name"
        ))),
    }
}
