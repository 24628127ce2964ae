//! # Template Instructions
//!
//! A line-oriented script that seeds a new record:
//!
//! ```text
//! @prefix ex: <http://example.org/trial#> .
//! # comments and blank lines are ignored
//! trial = root(ex:Trial, "Trial {id}")
//! arm = addIndividual(ex:Arm, "Arm A", trial, ex:hasArm)
//! ```
//!
//! `{id}` is replaced with the record id before the script runs. Names bound
//! by `name = ...` live for one invocation; using an unbound name is an
//! error. Every error names the 1-based line and its text.

use crate::knowledge::GraphStore;
use crate::schema::SchemaCatalog;
use crate::storage::TripleStore;
use crate::{Namespace, RatioError, RecordId, Term};
use std::collections::BTreeMap;
use tracing::debug;

/// Interpreter state for one script run.
#[derive(Debug, Clone)]
pub struct InstructionInterpreter {
    record: RecordId,
    prefixes: BTreeMap<String, String>,
    names: BTreeMap<String, Term>,
}

enum Command {
    Root {
        class: Term,
        label: String,
    },
    AddIndividual {
        class: Term,
        label: String,
        parent: String,
        property: Term,
    },
}

impl InstructionInterpreter {
    /// Start with the given prefixes bound.
    #[must_use]
    pub fn new(record: RecordId, namespaces: &[Namespace]) -> Self {
        Self {
            record,
            prefixes: namespaces
                .iter()
                .map(|ns| (ns.prefix.clone(), ns.uri.clone()))
                .collect(),
            names: BTreeMap::new(),
        }
    }

    /// Names bound so far.
    #[must_use]
    pub fn names(&self) -> &BTreeMap<String, Term> {
        &self.names
    }

    #[must_use]
    pub fn into_names(self) -> BTreeMap<String, Term> {
        self.names
    }

    /// Interpret `script` line by line against `graph`.
    pub fn run(
        &mut self,
        graph: &mut GraphStore,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        script: &str,
    ) -> Result<(), RatioError> {
        let script = script.replace("{id}", &self.record.to_string());

        for (number, raw) in script.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fail = |message: String| RatioError::Instruction {
                line: number + 1,
                text: line.to_string(),
                message,
            };

            if let Some(rest) = line.strip_prefix("@prefix") {
                let (prefix, uri) = parse_prefix(rest).map_err(fail)?;
                self.prefixes.insert(prefix, uri);
                continue;
            }

            let (name, command) = self.parse_statement(line).map_err(fail)?;
            let uri = match command {
                Command::Root { class, label } => graph
                    .new_root(store, schema, &class, &label)
                    .map_err(|e| lookup_as_instruction(e, &fail))?
                    .uri,
                Command::AddIndividual {
                    class,
                    label,
                    parent,
                    property,
                } => {
                    let parent_uri = self
                        .names
                        .get(&parent)
                        .cloned()
                        .ok_or_else(|| fail(format!("undefined name '{parent}'")))?;
                    graph
                        .new_individual(
                            store,
                            schema,
                            &class,
                            &label,
                            Some((&parent_uri, &property)),
                        )
                        .map_err(|e| lookup_as_instruction(e, &fail))?
                        .0
                        .uri
                }
            };
            debug!(record = %self.record, name = %name, uri = %uri, "instruction bound name");
            self.names.insert(name, uri);
        }
        Ok(())
    }

    fn parse_statement(&self, line: &str) -> Result<(String, Command), String> {
        let (name, call) = line
            .split_once('=')
            .ok_or_else(|| "expected 'name = command(...)'".to_string())?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(format!("invalid name '{name}'"));
        }

        let call = call.trim();
        let (command, args) = call
            .split_once('(')
            .and_then(|(cmd, rest)| rest.strip_suffix(')').map(|args| (cmd.trim(), args)))
            .ok_or_else(|| "expected 'command(arguments)'".to_string())?;
        let args = split_args(args)?;

        let command = match (command, args.as_slice()) {
            ("root", [class, label]) => Command::Root {
                class: self.parse_term(class)?,
                label: parse_label(label)?,
            },
            ("addIndividual", [class, label, parent, property]) => Command::AddIndividual {
                class: self.parse_term(class)?,
                label: parse_label(label)?,
                parent: parent.clone(),
                property: self.parse_term(property)?,
            },
            ("root", _) => return Err("root takes (class, \"label\")".to_string()),
            ("addIndividual", _) => {
                return Err(
                    "addIndividual takes (class, \"label\", parent, property)".to_string(),
                );
            }
            (other, _) => return Err(format!("unknown command '{other}'")),
        };
        Ok((name.to_string(), command))
    }

    /// `<uri>` or `prefix:local`.
    fn parse_term(&self, token: &str) -> Result<Term, String> {
        if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            return Term::parse_uri(inner).map_err(|e| e.to_string());
        }
        let (prefix, local) = token
            .split_once(':')
            .ok_or_else(|| format!("expected a URI, found '{token}'"))?;
        let base = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| format!("unknown prefix '{prefix}'"))?;
        Ok(Term::uri(format!("{base}{local}")))
    }
}

/// Report lookup failures against the offending line; keep the rest.
fn lookup_as_instruction<F>(error: RatioError, fail: &F) -> RatioError
where
    F: Fn(String) -> RatioError,
{
    if error.is_lookup() {
        fail(error.to_string())
    } else {
        error
    }
}

/// ` p: <uri> .`
fn parse_prefix(rest: &str) -> Result<(String, String), String> {
    let rest = rest.trim().trim_end_matches('.').trim_end();
    let (prefix, uri) = rest
        .split_once(':')
        .ok_or_else(|| "expected '@prefix p: <uri> .'".to_string())?;
    let uri = uri
        .trim()
        .strip_prefix('<')
        .and_then(|u| u.strip_suffix('>'))
        .ok_or_else(|| "prefix URI must be written as <uri>".to_string())?;
    Ok((prefix.trim().to_string(), uri.to_string()))
}

/// Split on commas outside double quotes. Escapes are kept for `parse_label`.
fn split_args(args: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in args.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => out.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated string".to_string());
    }
    if !current.trim().is_empty() || !out.is_empty() {
        out.push(current.trim().to_string());
    }
    Ok(out)
}

/// `"text"` with `\"` and `\\` escapes.
fn parse_label(token: &str) -> Result<String, String> {
    let inner = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted label, found '{token}'"))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => return Err("dangling escape in label".to_string()),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
