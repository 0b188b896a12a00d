//! Semstore CLI - Command-line interface for the dual-store semantic layer

use clap::{Parser, Subcommand};
use semstore::config::{self, SemstoreConfig};
use semstore::import::{self, ErrorPolicy, ImportMode};
use semstore::rdf::file::FileTripleStore;
use semstore::ui::{self, Icons};
use semstore::{ObjectKind, PushValue, QueryOptions, SemanticStore, Source};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "semstore")]
#[command(version = "0.0.1")]
#[command(about = "Dual-store semantic source persistence - SQLite rows mirrored into an RDF triple store")]
#[command(long_about = r#"
Semstore keeps URI-identified sources with open-ended predicate attributes
in SQLite, mirrored into an RDF triple store on every save:
  • Lazy, dirty-tracked per-predicate attribute caches
  • Batched prefetching across many sources in one query
  • Diff-based triple-store sync that only touches edited predicates

Example usage:
  semstore init
  semstore push --uri "http://example.org/moby" --predicate "http://example.org/title" "Moby Dick@en"
  semstore find --predicate "http://example.org/title" "Moby Dick@en"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config and create the store directory
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show statistics across both stores
    Stats,

    /// Show one source and all of its attributes
    Show {
        /// Source URI, or a plain name under the config's base_uri
        uri: String,
    },

    /// Print the values of one predicate on a source
    Get {
        /// Source URI
        uri: String,

        /// Predicate URI
        #[arg(short, long)]
        predicate: String,
    },

    /// Append a value to a predicate
    Push {
        /// Source URI or plain name (created on first push)
        uri: String,

        /// Predicate URI
        #[arg(short, long)]
        predicate: String,

        /// The value; a literal unless --as-uri is given
        value: String,

        /// Treat the value as a reference to another source
        #[arg(long)]
        as_uri: bool,
    },

    /// Replace a predicate's values with a single value
    Set {
        /// Source URI or plain name (created on first set)
        uri: String,

        /// Predicate URI
        #[arg(short, long)]
        predicate: String,

        /// The value; a literal unless --as-uri is given
        value: String,

        /// Treat the value as a reference to another source
        #[arg(long)]
        as_uri: bool,
    },

    /// Remove one value, or every value with --all
    Remove {
        /// Source URI
        uri: String,

        /// Predicate URI
        #[arg(short, long)]
        predicate: String,

        /// The value to remove; a literal unless --as-uri is given
        value: Option<String>,

        /// Treat the value as a reference to another source
        #[arg(long)]
        as_uri: bool,

        /// Drop the whole predicate immediately, in both stores
        #[arg(short, long)]
        all: bool,
    },

    /// Delete a source and its owned dependents from both stores
    Destroy {
        /// Source URI
        uri: String,
    },

    /// Find sources holding a predicate/value pair
    Find {
        /// Predicate URI
        #[arg(short, long)]
        predicate: String,

        /// The value to match; URI-shaped values match source objects
        value: String,

        /// Force the object interpretation (source or literal)
        #[arg(short, long)]
        kind: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Find sources by their type predicate
    FindType {
        /// Type URI
        type_uri: String,
    },

    /// Find the sources a subject points at through a predicate
    Inverse {
        /// Predicate URI
        #[arg(short, long)]
        predicate: String,

        /// Object source URI
        uri: String,
    },

    /// Rebuild triple-store data from the relational rows
    Resync {
        /// Resync one source; omit for the whole store
        uri: Option<String>,
    },

    /// Import a JSON file of source records
    Import {
        /// Path to the records file
        file: PathBuf,

        /// How records interact with existing sources (skip, add, update, overwrite)
        #[arg(short, long, default_value = "skip")]
        mode: String,

        /// Collect per-record errors instead of aborting the batch
        #[arg(long)]
        continue_on_error: bool,

        /// Skip triple-store sync during the batch, resync once at the end
        #[arg(long)]
        fast: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Commands::Init { force } = &cli.command {
        return init(cli.config.as_deref(), *force);
    }

    let loaded = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let mut ctx = open_store(&loaded)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Stats => {
            let stats = ctx.stats()?;
            ui::header("Semstore Statistics");
            let rows = [
                ("Sources", stats.sources.to_string()),
                ("Relations", stats.relations.to_string()),
                ("Literals", stats.literals.to_string()),
                ("Triples (RDF)", stats.triples.to_string()),
                ("Queries issued", stats.queries.to_string()),
            ];
            println!("{}", ui::table::stats_table(&rows));
        }

        Commands::Show { uri } => {
            let uri = loaded.resolve_uri(&uri)?;
            let mut source = ctx.get(&uri)?;
            ui::status(Icons::PACKAGE, "uri", source.uri().as_str());
            ui::status(Icons::GEAR, "kind", source.kind());
            if let Some(id) = source.id() {
                let predicates = ctx.relational().predicates_for(id)?;
                for predicate in predicates {
                    ui::section(&predicate);
                    for value in source.values(&ctx, &predicate)? {
                        println!("  {value}");
                    }
                }
            }
        }

        Commands::Get { uri, predicate } => {
            let uri = loaded.resolve_uri(&uri)?;
            let mut source = ctx.get(&uri)?;
            let values = source.values(&ctx, &predicate)?;
            if values.is_empty() {
                println!("{}", ui::dim("(no values)"));
            }
            for value in values {
                println!("{value}");
            }
        }

        Commands::Push { uri, predicate, value, as_uri } => {
            let uri = loaded.resolve_uri(&uri)?;
            let mut source = get_or_create(&ctx, &uri)?;
            source.push(&ctx, &predicate, push_value(&value, as_uri)?)?;
            source.save(&mut ctx)?;
            ui::success(&format!("pushed onto {predicate} of {uri}"));
        }

        Commands::Set { uri, predicate, value, as_uri } => {
            let uri = loaded.resolve_uri(&uri)?;
            let mut source = get_or_create(&ctx, &uri)?;
            source.set(&ctx, &predicate, push_value(&value, as_uri)?)?;
            source.save(&mut ctx)?;
            ui::success(&format!("set {predicate} on {uri}"));
        }

        Commands::Remove { uri, predicate, value, as_uri, all } => {
            let uri = loaded.resolve_uri(&uri)?;
            let mut source = ctx.get(&uri)?;
            if all {
                source.remove_all(&mut ctx, &predicate)?;
                ui::success(&format!("cleared {predicate}"));
            } else {
                let Some(value) = value else {
                    anyhow::bail!("pass a value to remove, or --all to clear the predicate");
                };
                if source.remove_value(&ctx, &predicate, push_value(&value, as_uri)?)? {
                    source.save(&mut ctx)?;
                    ui::success(&format!("removed from {predicate}"));
                } else {
                    ui::warn("no matching value");
                }
            }
        }

        Commands::Destroy { uri } => {
            let uri = loaded.resolve_uri(&uri)?;
            let source = ctx.get(&uri)?;
            source.destroy(&mut ctx)?;
            println!("{} destroyed {}", Icons::DEL, uri);
        }

        Commands::Find { predicate, value, kind, limit } => {
            let mut options = QueryOptions::new();
            if let Some(kind) = kind {
                options = options.with_kind(ObjectKind::from_str(&kind)?);
            }
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            let found = ctx.find_through(&predicate, &value, &options)?;
            print_sources(&found);
        }

        Commands::FindType { type_uri } => {
            let found = ctx.find_by_type(&type_uri, &QueryOptions::new())?;
            print_sources(&found);
        }

        Commands::Inverse { predicate, uri } => {
            let uri = loaded.resolve_uri(&uri)?;
            let found = ctx.find_through_inverse(&predicate, &uri, &QueryOptions::new())?;
            print_sources(&found);
        }

        Commands::Resync { uri } => {
            match uri {
                Some(uri) => {
                    let uri = loaded.resolve_uri(&uri)?;
                    ctx.resync(&uri)?;
                    ui::success(&format!("resynced {uri}"));
                }
                None => {
                    let spinner = ui::Spinner::new("Rebuilding triple store...");
                    let exported = ctx.resync_all()?;
                    spinner.finish_with_message(&format!("resynced {exported} sources"));
                }
            }
        }

        Commands::Import { file, mode, continue_on_error, fast } => {
            let records = import::read_records(&file)?;
            let mode = ImportMode::from_str(&mode)?;
            ui::header(&format!("Importing {} records ({mode})", records.len()));

            if fast {
                ctx.set_autosync(false);
            }
            let mut progress = ui::ImportProgress::new();
            let mut errors = Vec::new();
            let policy = if continue_on_error {
                ErrorPolicy::Collect(&mut errors)
            } else {
                ErrorPolicy::FailFast
            };
            let stats = import::import_records(&mut ctx, &records, mode, policy, &mut progress)?;
            if fast {
                ctx.set_autosync(true);
                let spinner = ui::Spinner::new("Resyncing triple store...");
                let exported = ctx.resync_all()?;
                spinner.finish_with_message(&format!("resynced {exported} sources"));
            }

            for error in &errors {
                ui::error(&error.to_string());
            }
            ui::success(&format!("Import complete: {stats}"));
        }
    }

    Ok(())
}

fn init(config_path: Option<&std::path::Path>, force: bool) -> anyhow::Result<()> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(config::default_config_path);
    let base = std::env::current_dir()?;

    let starter = SemstoreConfig {
        database: Some(
            config::default_database_path_in(&base)
                .display()
                .to_string(),
        ),
        rdf_store: Some(config::default_rdf_path_in(&base).display().to_string()),
        ..Default::default()
    };
    config::write_config(&path, &starter, force)?;
    config::ensure_db_dir(&config::default_database_path_in(&base))?;
    config::ensure_gitignore(&base)?;

    ui::success(&format!("wrote {}", path.display()));
    Ok(())
}

fn open_store(loaded: &SemstoreConfig) -> anyhow::Result<SemanticStore> {
    let base = std::env::current_dir()?;
    let db_path = loaded
        .database
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config::default_database_path_in(&base));
    let rdf_path = loaded
        .rdf_store
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config::default_rdf_path_in(&base));

    config::ensure_db_dir(&db_path)?;
    config::ensure_db_dir(&rdf_path)?;

    let rdf = FileTripleStore::open(&rdf_path)?;
    let registry = config::registry_from(loaded);
    let mut ctx = SemanticStore::open(&db_path, Box::new(rdf), registry)?;
    if let Some(autosync) = loaded.autosync {
        ctx.set_autosync(autosync);
    }
    if let Some(limit) = loaded.prefetch_limit {
        ctx.set_prefetch_limit(limit);
    }
    Ok(ctx)
}

fn get_or_create(ctx: &SemanticStore, uri: &str) -> anyhow::Result<Source> {
    Ok(match ctx.try_get(uri)? {
        Some(source) => source,
        None => ctx.create(uri)?,
    })
}

fn push_value(value: &str, as_uri: bool) -> anyhow::Result<PushValue> {
    Ok(if as_uri {
        PushValue::uri(value)?
    } else {
        PushValue::literal(value)
    })
}

fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        println!("{} No sources found.", Icons::CROSS);
    } else {
        for source in sources {
            println!("- [{}] {}", source.kind(), source.uri());
        }
    }
}
