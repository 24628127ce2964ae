//! # Ratio CLI Module
//!
//! This module implements the CLI interface for Ratio.
//!
//! ## Available Commands
//!
//! - `init` - Create the database
//! - `load-schema` - Replace the schema from an RDF file
//! - `records` - List records (or the deleted ones)
//! - `new-record` - Create a record, seeded from a template
//! - `rename-record` - Rename a record
//! - `finish` - Mark a record finished, or reopen it
//! - `delete-record` - Hide a record
//! - `restore-record` - Bring a deleted record back
//! - `show` - Print a record tree or one entity
//! - `add-value` - Append an empty value to a field
//! - `set-value` - Change a value (appends at the free index)
//! - `set-label` - Relabel an entity
//! - `add-entity` - Create a described child entity
//! - `add-option` - Create a custom option, optionally selecting it
//! - `delete` - Delete an entity and its described children
//! - `undo-delete` - Restore a deleted entity
//! - `load-data` - Replace a record's contents from RDF
//! - `run-script` - Execute a template script against a record
//! - `export` - Write a record as Turtle or N-Triples

mod commands;

use crate::config::{Backend, Config, Settings};
use clap::{Parser, Subcommand};
use ratio_core::RatioError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Ratio - capture structured facts through ontology-driven forms
#[derive(Parser, Debug)]
#[command(name = "ratio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "ratio.toml")]
    pub config: PathBuf,

    /// Path to the database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides the configuration file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
///
/// Entities, properties and classes are given as `prefix:local` using the
/// schema's prefixes, as `<uri>` or as a plain URI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database
    Init {
        /// Remove an existing database first
        #[arg(short, long)]
        force: bool,
    },

    /// Replace the schema from an RDF file
    LoadSchema {
        /// Schema file (Turtle, N-Triples or RDF/XML)
        file: PathBuf,

        /// Input format; guessed from the extension when omitted
        #[arg(short = 't', long)]
        format: Option<String>,
    },

    /// List records
    Records {
        /// List deleted records instead
        #[arg(long)]
        deleted: bool,
    },

    /// Create a record
    NewRecord {
        /// Record name
        name: String,

        /// Template script (overrides the configured template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Create the record empty even if a template is configured
        #[arg(long, conflicts_with = "template")]
        empty: bool,
    },

    /// Rename a record
    RenameRecord { record: u64, name: String },

    /// Mark a record finished
    Finish {
        record: u64,

        /// Mark it open again
        #[arg(long)]
        reopen: bool,
    },

    /// Hide a record from listings
    DeleteRecord { record: u64 },

    /// Bring a deleted record back
    RestoreRecord { record: u64 },

    /// Print a record tree, or a single entity
    Show {
        record: u64,

        /// Entity to print instead of the root
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Append an empty value to a field
    AddValue {
        record: u64,
        entity: String,
        property: String,
    },

    /// Change the value at an index
    SetValue {
        record: u64,
        entity: String,
        property: String,
        index: u64,
        value: String,
    },

    /// Relabel an entity
    SetLabel {
        record: u64,
        entity: String,
        label: String,
    },

    /// Create a described child entity under a parent field
    AddEntity {
        record: u64,
        parent: String,
        property: String,
        label: String,
    },

    /// Create a custom option for a field
    AddOption {
        record: u64,
        property: String,
        label: String,

        /// Also select the option on this entity
        #[arg(short, long, requires = "index")]
        entity: Option<String>,

        /// Value index to select the option at
        #[arg(short, long, requires = "entity")]
        index: Option<u64>,

        /// Keep the option in the record instead of the schema
        #[arg(long)]
        local: bool,
    },

    /// Delete an entity and everything it describes
    Delete { record: u64, entity: String },

    /// Restore a deleted entity
    UndoDelete { record: u64, entity: String },

    /// Replace a record's contents from an RDF file
    LoadData {
        record: u64,
        file: PathBuf,

        /// Input format; guessed from the extension when omitted
        #[arg(short = 't', long)]
        format: Option<String>,
    },

    /// Execute a template script against a record
    RunScript { record: u64, file: PathBuf },

    /// Export a record
    Export {
        record: u64,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (turtle, ntriples)
        #[arg(short = 't', long, default_value = "turtle")]
        format: String,

        /// Include the schema triples
        #[arg(long)]
        include_schema: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), RatioError> {
    let config = Config::load(&cli.config)?;
    let settings = Settings::resolve(config, cli.database, cli.backend, cli.json_mode);

    match cli.command {
        Commands::Init { force } => cmd_init(&settings, force),
        Commands::LoadSchema { file, format } => {
            cmd_load_schema(&settings, &file, format.as_deref())
        }
        Commands::Records { deleted } => cmd_records(&settings, deleted),
        Commands::NewRecord {
            name,
            template,
            empty,
        } => {
            let template = if empty {
                None
            } else {
                template.or_else(|| settings.template.clone())
            };
            cmd_new_record(&settings, &name, template.as_deref())
        }
        Commands::RenameRecord { record, name } => cmd_rename_record(&settings, record, &name),
        Commands::Finish { record, reopen } => cmd_set_finished(&settings, record, !reopen),
        Commands::DeleteRecord { record } => cmd_delete_record(&settings, record),
        Commands::RestoreRecord { record } => cmd_restore_record(&settings, record),
        Commands::Show { record, entity } => cmd_show(&settings, record, entity.as_deref()),
        Commands::AddValue {
            record,
            entity,
            property,
        } => cmd_add_value(&settings, record, &entity, &property),
        Commands::SetValue {
            record,
            entity,
            property,
            index,
            value,
        } => cmd_set_value(&settings, record, &entity, &property, index, &value),
        Commands::SetLabel {
            record,
            entity,
            label,
        } => cmd_set_label(&settings, record, &entity, &label),
        Commands::AddEntity {
            record,
            parent,
            property,
            label,
        } => cmd_add_entity(&settings, record, &parent, &property, &label),
        Commands::AddOption {
            record,
            property,
            label,
            entity,
            index,
            local,
        } => cmd_add_option(
            &settings,
            record,
            &property,
            &label,
            entity.as_deref().zip(index),
            local,
        ),
        Commands::Delete { record, entity } => cmd_delete(&settings, record, &entity),
        Commands::UndoDelete { record, entity } => cmd_undo_delete(&settings, record, &entity),
        Commands::LoadData {
            record,
            file,
            format,
        } => cmd_load_data(&settings, record, &file, format.as_deref()),
        Commands::RunScript { record, file } => cmd_run_script(&settings, record, &file),
        Commands::Export {
            record,
            output,
            format,
            include_schema,
        } => cmd_export(&settings, record, output.as_deref(), &format, include_schema),
    }
}

// =============================================================================
// TESTS
// =============================================================================
