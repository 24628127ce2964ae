//! # CLI Command Implementations
//!
//! Each `cmd_*` function opens one `Session`, runs the caller-side checks the
//! store leaves to its callers, performs the operation and prints the result
//! as text or JSON.
//!
//! The checks live in plain functions over a `RecordHandle` so they can be
//! exercised without a terminal.

use crate::config::{Backend, Settings};
use ratio_core::{
    Entity, ExportFormat, ExportOptions, FieldOption, FieldValue, RatioError, RdfFormat,
    RecordHandle, RecordId, SchemaCatalog, Session, Term, Validity,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

// =============================================================================
// MESSAGES
// =============================================================================

pub const MSG_FUNCTIONAL: &str = "You cannot add more than one value to this field.";
pub const MSG_DESCRIBED_VALUE: &str = "You have to use add-entity to add a described individual";
pub const MSG_DESCRIBED_CHANGE: &str =
    "You have to use set-label to change the label of a described individual";
pub const MSG_DESCRIBED_OPTION: &str = "Use add-entity to add entities to a described field.";
pub const MSG_NO_CUSTOM_OPTIONS: &str = "Adding options to this field is not allowed.";
pub const MSG_NO_ENTITIES: &str = "You are not allowed to add entities to this field.";
pub const MSG_NO_DELETE: &str = "You are not allowed to delete this entity.";
pub const MSG_NO_RELABEL: &str = "You are not allowed to change the label of this entity.";
pub const MSG_EMPTY_LABEL: &str = "Label cannot be empty.";
pub const MSG_EMPTY_NAME: &str = "Record name cannot be empty.";

fn not_allowed(message: &str) -> RatioError {
    RatioError::NotAllowed(message.to_string())
}

// =============================================================================
// CALLER-SIDE CHECKS
// =============================================================================

/// Append an empty value unless the field is described, or functional and
/// already filled.
pub fn add_value(
    record: &mut RecordHandle<'_>,
    entity: &Term,
    property: &Term,
) -> Result<u64, RatioError> {
    let field = record.field(entity, property)?;
    if field.is_described {
        return Err(not_allowed(MSG_DESCRIBED_VALUE));
    }
    if field.is_functional && field.has_values() {
        return Err(not_allowed(MSG_FUNCTIONAL));
    }
    record.new_value(entity, property)
}

/// Change the value at `index`, appending first when `index` is the free
/// index. The append goes through the same checks as `add_value`.
pub fn set_value(
    record: &mut RecordHandle<'_>,
    entity: &Term,
    property: &Term,
    index: u64,
    raw: &str,
) -> Result<Validity, RatioError> {
    if record.schema().is_described(property) {
        return Err(not_allowed(MSG_DESCRIBED_CHANGE));
    }
    if index == record.free_index(entity, property)? {
        add_value(record, entity, property)?;
    }
    record.change_value(entity, property, index, raw)
}

pub fn set_label(
    record: &mut RecordHandle<'_>,
    entity: &Term,
    label: &str,
) -> Result<(), RatioError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(not_allowed(MSG_EMPTY_LABEL));
    }
    if !record.is_individual_deletable(entity) {
        return Err(not_allowed(MSG_NO_RELABEL));
    }
    record.change_label(entity, label)
}

/// A new described child of `parent` through `property`.
///
/// Returns the index it was attached at, the entity and the properties whose
/// option lists now include it.
pub fn add_entity(
    record: &mut RecordHandle<'_>,
    parent: &Term,
    property: &Term,
    label: &str,
) -> Result<(u64, Entity, BTreeSet<Term>), RatioError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(not_allowed(MSG_EMPTY_LABEL));
    }
    let schema = record.schema();
    if !schema.is_described(property) || !schema.is_deletable(property) {
        return Err(not_allowed(MSG_NO_ENTITIES));
    }
    if schema.is_functional(property) && !record.sorted_values(parent, property).is_empty() {
        return Err(not_allowed(MSG_FUNCTIONAL));
    }
    let range = schema
        .range(property)
        .cloned()
        .ok_or_else(|| RatioError::PropertyNotFound(property.lexical().to_string()))?;

    let index = record.free_index(parent, property)?;
    let (entity, option_fields) = record.new_individual(&range, label, Some((parent, property)))?;
    Ok((index, entity, option_fields))
}

/// A custom option of the range of `property`, kept in the schema unless
/// `local`; selected at `(entity, index)` when given.
pub fn add_option(
    record: &mut RecordHandle<'_>,
    property: &Term,
    label: &str,
    select: Option<(&Term, u64)>,
    local: bool,
) -> Result<(FieldOption, BTreeSet<Term>, Option<u64>), RatioError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(not_allowed(MSG_EMPTY_LABEL));
    }
    let schema = record.schema();
    if schema.is_described(property) {
        return Err(not_allowed(MSG_DESCRIBED_OPTION));
    }
    if !schema.allows_custom_options(property) {
        return Err(not_allowed(MSG_NO_CUSTOM_OPTIONS));
    }
    let range = schema
        .range(property)
        .cloned()
        .ok_or_else(|| RatioError::PropertyNotFound(property.lexical().to_string()))?;

    let (option, option_fields) = if local {
        record.new_option(&range, label)?
    } else {
        record.new_schema_option(&range, label)?
    };

    let selected = match select {
        Some((entity, mut index)) => {
            if index == record.free_index(entity, property)? {
                index = record.new_value(entity, property)?;
            }
            record.change_value(entity, property, index, option.uri.lexical())?;
            Some(index)
        }
        None => None,
    };
    Ok((option, option_fields, selected))
}

pub fn delete_entity(
    record: &mut RecordHandle<'_>,
    entity: &Term,
) -> Result<BTreeSet<Term>, RatioError> {
    if !record.is_individual_deletable(entity) {
        return Err(not_allowed(MSG_NO_DELETE));
    }
    record.delete_individual_recursive(entity)
}

// =============================================================================
// SESSION AND INPUT
// =============================================================================

/// Open the configured backend and register the configured identity.
pub fn open_session(settings: &Settings) -> Result<Session, RatioError> {
    let mut session = match settings.backend {
        Backend::Redb => Session::with_redb(&settings.database)?,
        Backend::Memory => Session::in_memory()?,
    };
    if let Some(identity) = &settings.identity {
        session.register_identity(&identity.name, &identity.uri)?;
    }
    debug!(backend = %settings.backend, database = %settings.database.display(), "session opened");
    Ok(session)
}

fn read_file(path: &Path) -> Result<String, RatioError> {
    std::fs::read_to_string(path)
        .map_err(|e| RatioError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

/// Explicit format, else the file extension, else Turtle.
fn rdf_format(path: &Path, explicit: Option<&str>) -> Result<RdfFormat, RatioError> {
    Ok(explicit
        .map(str::parse::<RdfFormat>)
        .transpose()?
        .or_else(|| RdfFormat::from_path(path))
        .unwrap_or(RdfFormat::Turtle))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// RENDERING
// =============================================================================

/// Indented text tree of `entity` and its described children.
#[must_use]
pub fn render_entity(schema: &SchemaCatalog, entity: &Entity) -> String {
    let mut out = String::new();
    render_into(&mut out, schema, entity, 0);
    out
}

fn render_into(out: &mut String, schema: &SchemaCatalog, entity: &Entity, depth: usize) {
    let pad = "  ".repeat(depth);
    out.push_str(&format!(
        "{} ({}) {}\n",
        entity.label,
        entity.class_label,
        schema.compact(entity.uri.lexical())
    ));
    for field in &entity.fields {
        out.push_str(&format!("{pad}  {}:", field.label));
        if !field.has_values() {
            out.push_str(" -\n");
            continue;
        }
        out.push('\n');
        for (index, value) in field.sorted_values() {
            out.push_str(&format!("{pad}    [{index}] "));
            match value {
                FieldValue::Unset => out.push_str("(empty)\n"),
                FieldValue::Literal(literal) => out.push_str(&format!("{}\n", literal.value)),
                FieldValue::Option(option) => out.push_str(&format!(
                    "{} {}\n",
                    option.label,
                    schema.compact(option.uri.lexical())
                )),
                FieldValue::Entity(child) => render_into(out, schema, child, depth + 2),
            }
        }
    }
}

fn uris(terms: &BTreeSet<Term>) -> Vec<&str> {
    terms.iter().map(Term::lexical).collect()
}

// =============================================================================
// DATABASE COMMANDS
// =============================================================================

/// Create the database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), RatioError> {
    if settings.backend == Backend::Redb && force && settings.database.exists() {
        std::fs::remove_file(&settings.database).map_err(|e| {
            RatioError::IoError(format!(
                "Cannot remove '{}': {}",
                settings.database.display(),
                e
            ))
        })?;
    }
    let session = open_session(settings)?;
    let records = session.records()?.len();

    if settings.json_mode {
        print_json(&serde_json::json!({
            "database": settings.database.to_string_lossy(),
            "backend": settings.backend.to_string(),
            "persistent": session.backend().is_persistent(),
            "records": records,
        }));
        return Ok(());
    }

    println!("Ratio database ready");
    println!("====================");
    println!("Database: {}", settings.database.display());
    println!("Backend:  {}", settings.backend);
    println!("Records:  {records}");
    Ok(())
}

/// Replace the schema.
pub fn cmd_load_schema(
    settings: &Settings,
    file: &Path,
    format: Option<&str>,
) -> Result<(), RatioError> {
    let format = rdf_format(file, format)?;
    let data = read_file(file)?;
    let mut session = open_session(settings)?;
    let count = session.load_schema(&data, format)?;
    let classes = session.schema().classes().len();

    if settings.json_mode {
        print_json(&serde_json::json!({ "triples": count, "classes": classes }));
    } else {
        println!("Loaded {count} schema triples ({classes} classes) from {}", file.display());
    }
    Ok(())
}

/// List records, or the deleted ones.
pub fn cmd_records(settings: &Settings, deleted: bool) -> Result<(), RatioError> {
    let session = open_session(settings)?;
    let records = if deleted {
        session.deleted_records()?
    } else {
        session.records()?
    };

    if settings.json_mode {
        let list: Vec<_> = records
            .iter()
            .map(|(id, info)| {
                serde_json::json!({
                    "id": id.0,
                    "name": info.name,
                    "finished": info.finished,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(list));
        return Ok(());
    }

    if records.is_empty() {
        println!("No records");
    }
    for (id, info) in records {
        let status = if info.finished { "finished" } else { "open" };
        println!("{id:>6}  {status:<8}  {}", info.name);
    }
    Ok(())
}

pub fn cmd_rename_record(settings: &Settings, record: u64, name: &str) -> Result<(), RatioError> {
    if name.trim().is_empty() {
        return Err(not_allowed(MSG_EMPTY_NAME));
    }
    let mut session = open_session(settings)?;
    session.rename_record(RecordId(record), name)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "id": record, "name": name }));
    } else {
        println!("Renamed record {record} to {name}");
    }
    Ok(())
}

/// Mark a record finished, or open again with `finished == false`.
pub fn cmd_set_finished(
    settings: &Settings,
    record: u64,
    finished: bool,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    session.set_finished(RecordId(record), finished)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "id": record, "finished": finished }));
    } else if finished {
        println!("Record {record} finished");
    } else {
        println!("Record {record} reopened");
    }
    Ok(())
}

/// Hide a record from listings; its contents are kept.
pub fn cmd_delete_record(settings: &Settings, record: u64) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    session.delete_record(RecordId(record))?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "id": record, "deleted": true }));
    } else {
        println!("Deleted record {record} (restore-record {record} brings it back)");
    }
    Ok(())
}

pub fn cmd_restore_record(settings: &Settings, record: u64) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    session.restore_record(RecordId(record))?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "id": record, "deleted": false }));
    } else {
        println!("Restored record {record}");
    }
    Ok(())
}

/// Create a record, seeded from `template` when given.
pub fn cmd_new_record(
    settings: &Settings,
    name: &str,
    template: Option<&Path>,
) -> Result<(), RatioError> {
    let script = template.map(read_file).transpose()?;
    let mut session = open_session(settings)?;
    let id = session.create_record(name, script.as_deref())?;
    let root = session.record(id)?.root_uri();

    if settings.json_mode {
        print_json(&serde_json::json!({
            "id": id.0,
            "name": name,
            "root": root.as_ref().map(Term::lexical),
        }));
    } else {
        println!("Created record {id} ({name})");
        if let Some(root) = root {
            println!("Root: {}", root.lexical());
        }
    }
    Ok(())
}

// =============================================================================
// RECORD COMMANDS
// =============================================================================

/// Print the root tree, or one entity.
pub fn cmd_show(settings: &Settings, record: u64, entity: Option<&str>) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let tree = match entity {
        Some(name) => {
            let uri = handle.schema().expand(name)?;
            handle.entity(&uri)?.into_owned()
        }
        None => handle.root()?.clone(),
    };

    if settings.json_mode {
        let value = serde_json::to_value(&tree)
            .map_err(|e| RatioError::SerializationError(e.to_string()))?;
        print_json(&value);
    } else {
        print!("{}", render_entity(handle.schema(), &tree));
    }
    Ok(())
}

pub fn cmd_add_value(
    settings: &Settings,
    record: u64,
    entity: &str,
    property: &str,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let entity = handle.schema().expand(entity)?;
    let property = handle.schema().expand(property)?;
    let index = add_value(&mut handle, &entity, &property)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "index": index }));
    } else {
        println!("Added value {index}");
    }
    Ok(())
}

pub fn cmd_set_value(
    settings: &Settings,
    record: u64,
    entity: &str,
    property: &str,
    index: u64,
    value: &str,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let entity = handle.schema().expand(entity)?;
    let property = handle.schema().expand(property)?;
    let validity = set_value(&mut handle, &entity, &property, index, value)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "index": index, "validity": validity.message() }));
        return Ok(());
    }
    match validity {
        Validity::Valid => println!("Value {index} set"),
        Validity::Invalid(message) => println!("Value {index} rejected: {message}"),
    }
    Ok(())
}

pub fn cmd_set_label(
    settings: &Settings,
    record: u64,
    entity: &str,
    label: &str,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let entity = handle.schema().expand(entity)?;
    set_label(&mut handle, &entity, label)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "entity": entity.lexical(), "label": label.trim() }));
    } else {
        println!("Relabelled {}", entity.lexical());
    }
    Ok(())
}

pub fn cmd_add_entity(
    settings: &Settings,
    record: u64,
    parent: &str,
    property: &str,
    label: &str,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let parent = handle.schema().expand(parent)?;
    let property = handle.schema().expand(property)?;
    let (index, entity, option_fields) = add_entity(&mut handle, &parent, &property, label)?;

    if settings.json_mode {
        let value = serde_json::to_value(&entity)
            .map_err(|e| RatioError::SerializationError(e.to_string()))?;
        print_json(&serde_json::json!({
            "index": index,
            "entity": value,
            "functional": handle.schema().is_functional(&property),
            "option_fields": uris(&option_fields),
        }));
        return Ok(());
    }

    println!("Created {} at index {index}", entity.uri.lexical());
    for field in option_fields {
        println!("Now selectable in {}", handle.schema().compact(field.lexical()));
    }
    Ok(())
}

pub fn cmd_add_option(
    settings: &Settings,
    record: u64,
    property: &str,
    label: &str,
    select: Option<(&str, u64)>,
    local: bool,
) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let property = handle.schema().expand(property)?;
    let target = match select {
        Some((entity, index)) => Some((handle.schema().expand(entity)?, index)),
        None => None,
    };
    let (option, option_fields, index) = add_option(
        &mut handle,
        &property,
        label,
        target.as_ref().map(|(entity, index)| (entity, *index)),
        local,
    )?;

    if settings.json_mode {
        print_json(&serde_json::json!({
            "option_uri": option.uri.lexical(),
            "option_label": option.label,
            "option_fields": uris(&option_fields),
            "index": index,
        }));
        return Ok(());
    }

    println!("Created option {} ({})", option.label, option.uri.lexical());
    if let Some(index) = index {
        println!("Selected at index {index}");
    }
    Ok(())
}

pub fn cmd_delete(settings: &Settings, record: u64, entity: &str) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let entity = handle.schema().expand(entity)?;
    let deleted = delete_entity(&mut handle, &entity)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "deleted": uris(&deleted) }));
        return Ok(());
    }

    println!("Deleted {} entities", deleted.len());
    for uri in &deleted {
        println!("  {}", uri.lexical());
    }
    Ok(())
}

pub fn cmd_undo_delete(settings: &Settings, record: u64, entity: &str) -> Result<(), RatioError> {
    let mut session = open_session(settings)?;
    let mut handle = session.record(RecordId(record))?;
    let entity = handle.schema().expand(entity)?;
    let restored = handle.undo_delete_individual(&entity)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "restored": restored }));
    } else if restored == 0 {
        println!("Nothing to restore for {}", entity.lexical());
    } else {
        println!("Restored {restored} triples");
    }
    Ok(())
}

pub fn cmd_load_data(
    settings: &Settings,
    record: u64,
    file: &Path,
    format: Option<&str>,
) -> Result<(), RatioError> {
    let format = rdf_format(file, format)?;
    let data = read_file(file)?;
    let mut session = open_session(settings)?;
    let count = session.record(RecordId(record))?.load_data(&data, format)?;

    if settings.json_mode {
        print_json(&serde_json::json!({ "triples": count }));
    } else {
        println!("Loaded {count} triples into record {record}");
    }
    Ok(())
}

pub fn cmd_run_script(settings: &Settings, record: u64, file: &Path) -> Result<(), RatioError> {
    let script = read_file(file)?;
    let mut session = open_session(settings)?;
    let names = session
        .record(RecordId(record))?
        .execute_instructions(&script)?;

    if settings.json_mode {
        let map: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .map(|(name, uri)| (name.clone(), serde_json::Value::from(uri.lexical())))
            .collect();
        print_json(&serde_json::Value::Object(map));
        return Ok(());
    }

    for (name, uri) in &names {
        println!("{name} = {}", uri.lexical());
    }
    Ok(())
}

pub fn cmd_export(
    settings: &Settings,
    record: u64,
    output: Option<&Path>,
    format: &str,
    include_schema: bool,
) -> Result<(), RatioError> {
    let options = ExportOptions {
        format: format.parse::<ExportFormat>()?,
        include_schema,
    };
    let mut session = open_session(settings)?;
    let text = session.record(RecordId(record))?.export(&options)?;

    match output {
        Some(path) => {
            std::fs::write(path, &text).map_err(|e| {
                RatioError::IoError(format!("Cannot write '{}': {}", path.display(), e))
            })?;
            if settings.json_mode {
                print_json(&serde_json::json!({
                    "output": path.to_string_lossy(),
                    "format": options.format.to_string(),
                    "bytes": text.len(),
                }));
            } else {
                println!("Exported record {record} to {}", path.display());
            }
        }
        None => print!("{text}"),
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_falls_back_to_extension_then_turtle() {
        assert_eq!(
            rdf_format(Path::new("a.nt"), None).unwrap(),
            RdfFormat::NTriples
        );
        assert_eq!(
            rdf_format(Path::new("a.nt"), Some("rdfxml")).unwrap(),
            RdfFormat::RdfXml
        );
        assert_eq!(
            rdf_format(Path::new("schema"), None).unwrap(),
            RdfFormat::Turtle
        );
        assert!(rdf_format(Path::new("a.ttl"), Some("json")).is_err());
    }

    #[test]
    fn not_allowed_displays_the_message() {
        assert_eq!(not_allowed(MSG_NO_DELETE).to_string(), MSG_NO_DELETE);
    }
}
