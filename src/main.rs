//! seedtrace CLI - Command line interface for the seed-lot genealogy engine

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use seedtrace::{
    ExportFormat, GenealogyConfig, GenealogyEngine, GenerationLevel, LotStatus, LotSummary,
    MemoryLotStore, NewLot, RelationOptions, Result, StoreConfig, TreeNode, UpdateRelationOptions,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seedtrace")]
#[command(author, version, about = "Seed-lot genealogy and traceability", long_about = None)]
struct Cli {
    /// Genealogy configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty lot store
    Init {
        /// Path to the store file
        store: String,
    },

    /// Create a lot
    Add {
        /// Path to the store file
        store: String,

        /// Generation level (GO, G1, G2, G3, G4, R1, R2)
        #[arg(short, long)]
        level: GenerationLevel,

        /// Variety name
        #[arg(short, long)]
        variety: String,

        /// Quantity in kilograms
        #[arg(short, long)]
        quantity: f64,

        /// Parent lot; the quantity is drawn from it
        #[arg(short, long)]
        parent: Option<String>,

        /// Explicit lot id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Production date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Initial status
        #[arg(long, default_value = "active")]
        status: LotStatus,

        /// Multiplier name
        #[arg(short, long)]
        multiplier: Option<String>,

        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show a lot with its parent and direct children
    Show {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// Print the descendant tree of a lot
    Tree {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,

        /// Depth limit (defaults to the configured limit)
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// List the ancestor chain of a lot, foundation lot first
    Ancestors {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// List every lot produced from a lot
    Descendants {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// Link a child lot under a parent
    Link {
        /// Path to the store file
        store: String,

        /// Parent lot id
        parent: String,

        /// Child lot id
        child: String,

        /// Quantity drawn from the parent
        #[arg(short, long)]
        quantity: Option<f64>,

        /// Notes appended to the child
        #[arg(long)]
        notes: Option<String>,
    },

    /// Remove a lot's parent link
    Unlink {
        /// Path to the store file
        store: String,

        /// Child lot id
        child: String,
    },

    /// Re-parent a lot or replace its notes
    Relink {
        /// Path to the store file
        store: String,

        /// Child lot id
        child: String,

        /// New parent lot id
        #[arg(short, long)]
        parent: Option<String>,

        /// Replacement notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Soft-deactivate a lot
    Deactivate {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// Show lineage statistics for a lot
    Stats {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// Check a lot's subtree for cycles, level and quantity problems
    Check {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,
    },

    /// Export the descendant tree of a lot
    Export {
        /// Path to the store file
        store: String,

        /// Lot id
        lot: String,

        /// Output format (json, csv, dot)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_with_hints());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { store } => init_command(&store),
        Commands::Add {
            store,
            level,
            variety,
            quantity,
            parent,
            id,
            date,
            status,
            multiplier,
            notes,
        } => {
            let mut lot = NewLot::new(level, variety, quantity).status(status);
            if let Some(parent) = parent {
                lot = lot.parent(parent);
            }
            if let Some(id) = id {
                lot = lot.with_id(id);
            }
            if let Some(date) = date {
                lot = lot.produced_on(date);
            }
            if let Some(multiplier) = multiplier {
                lot = lot.multiplier(multiplier);
            }
            if let Some(notes) = notes {
                lot = lot.notes(notes);
            }
            add_command(&store, lot)
        }
        Commands::Show { store, lot } => show_command(&store, &lot, config),
        Commands::Tree { store, lot, depth } => tree_command(&store, &lot, depth, config),
        Commands::Ancestors { store, lot } => ancestors_command(&store, &lot, config),
        Commands::Descendants { store, lot } => descendants_command(&store, &lot, config),
        Commands::Link {
            store,
            parent,
            child,
            quantity,
            notes,
        } => {
            let options = RelationOptions {
                quantity,
                notes,
            };
            link_command(&store, &parent, &child, options, config)
        }
        Commands::Unlink { store, child } => unlink_command(&store, &child, config),
        Commands::Relink {
            store,
            child,
            parent,
            notes,
        } => {
            let options = UpdateRelationOptions {
                new_parent_id: parent,
                notes,
            };
            relink_command(&store, &child, options, config)
        }
        Commands::Deactivate { store, lot } => deactivate_command(&store, &lot),
        Commands::Stats { store, lot } => stats_command(&store, &lot, config),
        Commands::Check { store, lot } => check_command(&store, &lot, config),
        Commands::Export {
            store,
            lot,
            format,
            output,
        } => export_command(&store, &lot, format, output.as_deref(), config),
    }
}

fn load_config(path: Option<&Path>) -> Result<GenealogyConfig> {
    match path {
        Some(path) => GenealogyConfig::from_json(&std::fs::read_to_string(path)?),
        None => Ok(GenealogyConfig::default()),
    }
}

fn open_store(path: &str, writable: bool) -> Result<Arc<MemoryLotStore>> {
    let mut config = StoreConfig::new(path).must_exist();
    if !writable {
        config = config.read_only();
    }
    Ok(Arc::new(MemoryLotStore::open_with_config(config)?))
}

fn engine(
    path: &str,
    writable: bool,
    config: GenealogyConfig,
) -> Result<GenealogyEngine<MemoryLotStore>> {
    GenealogyEngine::with_config(open_store(path, writable)?, config)
}

fn print_lot(prefix: &str, lot: &LotSummary) {
    println!(
        "{}{} [{}] {} - {} kg, {} ({})",
        prefix, lot.id, lot.level, lot.variety, lot.quantity, lot.production_date, lot.status
    );
}

fn init_command(path: &str) -> Result<()> {
    let store = MemoryLotStore::open(path)?;
    store.save()?;
    println!("Created lot store: {}", path);
    Ok(())
}

fn add_command(path: &str, lot: NewLot) -> Result<()> {
    let store = open_store(path, true)?;
    let record = store.create_lot(lot)?;
    store.save()?;
    println!("Created lot: {}", record.id);
    Ok(())
}

fn show_command(path: &str, lot: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, false, config)?;
    let relations = engine.get_direct_relations(lot)?;

    print_lot("", &relations.current);
    match &relations.parent {
        Some(parent) => print_lot("  parent: ", parent),
        None => println!("  parent: none"),
    }
    if relations.children.is_empty() {
        println!("  children: none");
    } else {
        println!("  children:");
        for child in &relations.children {
            print_lot("    ", child);
        }
    }
    Ok(())
}

fn print_tree(node: &TreeNode, depth: usize) {
    println!(
        "{}{} [{}] {} kg ({})",
        "  ".repeat(depth),
        node.id,
        node.level,
        node.quantity,
        node.status
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn tree_command(
    path: &str,
    lot: &str,
    depth: Option<usize>,
    config: GenealogyConfig,
) -> Result<()> {
    let engine = engine(path, false, config)?;
    let tree = match depth {
        Some(depth) => engine.get_genealogy_tree(lot, depth)?,
        None => engine.get_tree(lot)?,
    };
    match tree {
        Some(tree) => print_tree(&tree, 0),
        None => println!("Lot not found: {}", lot),
    }
    Ok(())
}

fn ancestors_command(path: &str, lot: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, false, config)?;
    let chain = engine.get_ancestors(lot)?;
    if chain.is_empty() {
        println!("Lot not found: {}", lot);
    }
    for (i, ancestor) in chain.iter().enumerate() {
        print_lot(&format!("{}. ", i + 1), ancestor);
    }
    Ok(())
}

fn descendants_command(path: &str, lot: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, false, config)?;
    let descendants = engine.get_descendants(lot)?;
    println!("Descendants of {}: {}", lot, descendants.len());
    for descendant in &descendants {
        print_lot("  ", descendant);
    }
    Ok(())
}

fn link_command(
    path: &str,
    parent: &str,
    child: &str,
    options: RelationOptions,
    config: GenealogyConfig,
) -> Result<()> {
    let engine = engine(path, true, config)?;
    let linked = engine.create_relation(parent, child, options)?;
    engine.store().save()?;
    println!("Linked {} under {}", linked.id, parent);
    Ok(())
}

fn unlink_command(path: &str, child: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, true, config)?;
    let unlinked = engine.remove_relation(child)?;
    engine.store().save()?;
    println!("Unlinked {}", unlinked.id);
    Ok(())
}

fn relink_command(
    path: &str,
    child: &str,
    options: UpdateRelationOptions,
    config: GenealogyConfig,
) -> Result<()> {
    let engine = engine(path, true, config)?;
    let updated = engine.update_relation(child, options)?;
    engine.store().save()?;
    match &updated.parent_lot_id {
        Some(parent) => println!("Updated {} (parent: {})", updated.id, parent),
        None => println!("Updated {} (no parent)", updated.id),
    }
    Ok(())
}

fn deactivate_command(path: &str, lot: &str) -> Result<()> {
    let store = open_store(path, true)?;
    let updated = store.deactivate_lot(lot)?;
    store.save()?;
    println!("Deactivated {}", updated.id);
    Ok(())
}

fn stats_command(path: &str, lot: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, false, config)?;
    let stats = engine.get_genealogy_stats(lot)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn check_command(path: &str, lot: &str, config: GenealogyConfig) -> Result<()> {
    let engine = engine(path, false, config)?;
    let report = engine.check_genealogy_consistency(lot)?;

    if report.is_consistent {
        println!("Genealogy of {} is consistent", lot);
    } else {
        println!("Genealogy of {} has {} issue(s):", lot, report.issues.len());
        for message in report.messages() {
            println!("  - {}", message);
        }
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn export_command(
    path: &str,
    lot: &str,
    format: ExportFormat,
    output: Option<&Path>,
    config: GenealogyConfig,
) -> Result<()> {
    let engine = engine(path, false, config)?;
    let rendered = engine.export_genealogy(lot, format)?;

    match output {
        Some(file) => {
            std::fs::write(file, &rendered)?;
            eprintln!("Exported {} as {} to {}", lot, format, file.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
