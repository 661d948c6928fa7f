//! Command dispatch for the `shipyard` binary.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use shipyard_core::{
    AppConfig, CatalogSnapshot, DesignCatalog, PersistentDesignStore, SavedDesign,
};

#[derive(Parser, Debug)]
#[command(name = "shipyard")]
#[command(about = "Manage saved ship designs and their display order")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved designs in display order.
    List {
        /// Include designs whose hull or parts are hidden.
        #[arg(long)]
        all: bool,
        /// Print JSON instead of one line per design.
        #[arg(long)]
        json: bool,
    },
    /// Print one saved design as JSON.
    Show {
        /// UUID of the design.
        uuid: Uuid,
    },
    /// Save a new design.
    Add {
        /// Design name.
        #[arg(long)]
        name: String,
        /// Hull the design is built on.
        #[arg(long)]
        hull: String,
        /// Part to mount; repeat for each slot.
        #[arg(long = "part")]
        parts: Vec<String>,
        /// Free-form description.
        #[arg(long, default_value = "")]
        description: String,
        /// Place the design before this one instead of at the end.
        #[arg(long)]
        before: Option<Uuid>,
    },
    /// Move a saved design.
    Move {
        /// UUID of the design to move.
        uuid: Uuid,
        /// Place the design before this one; moves to the end when omitted.
        #[arg(long)]
        before: Option<Uuid>,
    },
    /// Delete a saved design.
    Erase {
        /// UUID of the design to delete.
        uuid: Uuid,
    },
    /// List hulls known to the session with their visibility.
    Hulls,
    /// Hide or show a hull for this session.
    Hull {
        /// Hull name.
        name: String,
        /// Mark the hull obsolete.
        #[arg(long, conflicts_with = "show")]
        hide: bool,
        /// Mark the hull not obsolete.
        #[arg(long)]
        show: bool,
    },
    /// Hide or show a part for this session.
    Part {
        /// Part name.
        name: String,
        /// Mark the part obsolete.
        #[arg(long, conflicts_with = "show")]
        hide: bool,
        /// Mark the part not obsolete.
        #[arg(long)]
        show: bool,
    },
}

/// Execute a parsed command line.
pub fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    match cli.command {
        Command::List { all, json } => list(config, all, json),
        Command::Show { uuid } => {
            let store = open_store(config)?;
            let design = store
                .get_design(uuid)
                .with_context(|| format!("no saved design {uuid}"))?;
            println!("{}", serde_json::to_string_pretty(&design)?);
            Ok(())
        }
        Command::Add {
            name,
            hull,
            parts,
            description,
            before,
        } => {
            let store = open_store(config)?;
            let design = SavedDesign::new(name, hull, parts).with_description(description);
            let uuid = design.uuid;
            store.insert_before(design, before)?;
            println!("{uuid}");
            Ok(())
        }
        Command::Move { uuid, before } => {
            open_store(config)?.move_before(uuid, before)?;
            Ok(())
        }
        Command::Erase { uuid } => {
            open_store(config)?.erase(uuid)?;
            Ok(())
        }
        Command::Hulls => {
            let catalog = load_catalog(config)?;
            for hull in catalog.ordered_hulls() {
                let state = match catalog.is_hull_obsolete(&hull) {
                    Some(true) => "hidden",
                    _ => "shown",
                };
                println!("{hull}\t{state}");
            }
            Ok(())
        }
        Command::Hull { name, hide, show } => {
            let obsolete = visibility_flag(hide, show)?;
            let mut catalog = load_catalog(config)?;
            if !catalog.ordered_hulls().contains(&name) {
                catalog.insert_hull_before(name.clone(), None);
            }
            catalog.set_hull_obsolete(&name, obsolete);
            save_catalog(config, &catalog)
        }
        Command::Part { name, hide, show } => {
            let obsolete = visibility_flag(hide, show)?;
            let mut catalog = load_catalog(config)?;
            catalog.set_part_obsolete(name, obsolete);
            save_catalog(config, &catalog)
        }
    }
}

fn list(config: &AppConfig, all: bool, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let catalog = load_catalog(config)?;
    let mut toggles = config.availability;
    if all {
        toggles.show_obsolete = true;
    }

    let mut shown = Vec::new();
    for design in store.ordered_designs() {
        let obsolete = catalog.is_summary_obsolete(&design.summary());
        // Producibility is decided by the game rules; saved designs count as available here.
        if let Some(badge) = toggles.displayed(true, obsolete) {
            shown.push((design, badge));
        }
    }

    if json {
        let designs: Vec<&SavedDesign> = shown.iter().map(|(design, _)| design).collect();
        println!("{}", serde_json::to_string_pretty(&designs)?);
        return Ok(());
    }
    for (design, badge) in shown {
        let marker = if badge.obsolete { " [obsolete]" } else { "" };
        println!("{}\t{}{}", design.uuid, design.display_name(), marker);
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<PersistentDesignStore> {
    let store = PersistentDesignStore::open(&config.designs_dir);
    store
        .check_pending()
        .with_context(|| format!("failed to load saved designs from {}", config.designs_dir.display()))?;
    Ok(store)
}

fn load_catalog(config: &AppConfig) -> Result<DesignCatalog> {
    let mut catalog = DesignCatalog::new();
    if let Some(snapshot) = CatalogSnapshot::load(&config.session_path)? {
        catalog.load(&snapshot);
    }
    Ok(catalog)
}

fn save_catalog(config: &AppConfig, catalog: &DesignCatalog) -> Result<()> {
    catalog.save().persist(&config.session_path)?;
    info!(path = %config.session_path.display(), "session catalog saved");
    Ok(())
}

fn visibility_flag(hide: bool, show: bool) -> Result<bool> {
    match (hide, show) {
        (true, false) => Ok(true),
        (false, true) => Ok(false),
        _ => bail!("pass exactly one of --hide or --show"),
    }
}
