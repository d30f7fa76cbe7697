//! Headless front end for a Tackle Box catalog directory.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tackle::{
    Bait, CatchEvent, Creature, EntityKind, Location, Lure, Recipe, Record, RecordId, RecordRef,
    Registry, Settings, Stored, statics,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "tackle", version)]
#[command(about = "Inspect and edit a Tackle Box catalog")]
struct Args {
    /// Directory holding the catalog files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Quiet period before edits are written, in milliseconds
    #[arg(long, value_name = "MS")]
    quiet_period_ms: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record counts per kind
    Summary,
    /// Records of one kind in display order
    List { kind: Kind },
    /// Apply a selection and print the views derived from it
    Show {
        #[arg(long)]
        creature: Option<RecordId>,
        #[arg(long)]
        location: Option<RecordId>,
        #[arg(long)]
        event: Option<RecordId>,
    },
    /// Rename a record
    Rename { kind: Kind, id: RecordId, name: String },
    /// Add a record with the next free id
    Add { kind: Kind, name: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Creature,
    Bait,
    Lure,
    Location,
    Event,
    Recipe,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Creature => EntityKind::Creature,
            Kind::Bait => EntityKind::Bait,
            Kind::Lure => EntityKind::Lure,
            Kind::Location => EntityKind::Location,
            Kind::Event => EntityKind::CatchEvent,
            Kind::Recipe => EntityKind::Recipe,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(&args.data_dir)?;
    if let Some(ms) = args.quiet_period_ms {
        settings.quiet_period_ms = ms;
    }

    let mut registry = settings.open_registry()?;
    registry
        .load()
        .with_context(|| format!("loading catalog from {:?}", settings.data_dir))?;
    if settings.sort_by_name {
        for kind in EntityKind::ALL {
            registry.sort_by_name(kind);
        }
    }

    let result = run(&mut registry, args.command);
    // Flush even if the command failed part-way.
    let flushed = registry.shutdown().context("saving catalog");
    result.and(flushed)
}

fn run(registry: &mut Registry, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Summary => {
            for kind in EntityKind::ALL {
                println!("{:<12} {}", kind.file_stem(), registry.len(kind));
            }
        }
        Command::List { kind } => match EntityKind::from(kind) {
            EntityKind::Creature => print_list::<Creature>(registry),
            EntityKind::Bait => print_list::<Bait>(registry),
            EntityKind::Lure => print_list::<Lure>(registry),
            EntityKind::Location => print_list::<Location>(registry),
            EntityKind::CatchEvent => print_list::<CatchEvent>(registry),
            EntityKind::Recipe => print_list::<Recipe>(registry),
        },
        Command::Show {
            creature,
            location,
            event,
        } => {
            // Location first: it may replace the creature.
            registry.select_location(location);
            if creature.is_some() {
                registry.select_creature(creature);
            }
            registry.select_catch_event(event);
            print_selection(registry);
        }
        Command::Rename { kind, id, name } => {
            let renamed = match EntityKind::from(kind) {
                EntityKind::Creature => rename::<Creature>(registry, id, name),
                EntityKind::Bait => rename::<Bait>(registry, id, name),
                EntityKind::Lure => rename::<Lure>(registry, id, name),
                EntityKind::Location => rename::<Location>(registry, id, name),
                EntityKind::CatchEvent => rename::<CatchEvent>(registry, id, name),
                EntityKind::Recipe => rename::<Recipe>(registry, id, name),
            };
            if !renamed {
                bail!("no {} with id {id}", EntityKind::from(kind));
            }
        }
        Command::Add { kind, name } => {
            let id = match EntityKind::from(kind) {
                EntityKind::Creature => add::<Creature>(registry, name)?,
                EntityKind::Bait => add::<Bait>(registry, name)?,
                EntityKind::Lure => add::<Lure>(registry, name)?,
                EntityKind::Location => add::<Location>(registry, name)?,
                EntityKind::CatchEvent => add::<CatchEvent>(registry, name)?,
                EntityKind::Recipe => add::<Recipe>(registry, name)?,
            };
            println!("{id}");
        }
    }
    Ok(())
}

fn print_list<R: Stored>(registry: &Registry) {
    for handle in registry.collection::<R>().handles() {
        println!("{:>6}  {}", handle.id(), handle.name());
    }
}

fn rename<R: Stored>(registry: &Registry, id: RecordId, name: String) -> bool {
    let Some(handle) = registry.get::<R>(id) else {
        return false;
    };
    handle.set_name(name);
    true
}

fn add<R: Stored>(registry: &mut Registry, name: String) -> anyhow::Result<RecordId> {
    let id = registry.next_id::<R>()?;
    registry.insert(R::new_named(id, name))?;
    Ok(id)
}

fn print_selection(registry: &Registry) {
    let selection = registry.selection();

    println!("{}", statics::EN_HEADING_ACTIVE);
    println!(
        "  {}: {}",
        EntityKind::Creature,
        label(selection.active_creature())
    );
    println!(
        "  {}: {}",
        EntityKind::Location,
        label(selection.active_location())
    );
    println!(
        "  {}: {}",
        EntityKind::CatchEvent,
        label(selection.active_catch_event())
    );

    print_handles(statics::EN_HEADING_CREATURES_HERE, selection.creatures_at_location());
    print_handles(statics::EN_HEADING_APPLICABLE_BAITS, selection.applicable_baits());
    print_handles(statics::EN_HEADING_APPLICABLE_LURES, selection.applicable_lures());
    print_handles(statics::EN_HEADING_BEST_LURES, selection.best_lures());

    let bite = selection.bite_summary();
    println!("{}", statics::EN_HEADING_BITE_ACTIVITY);
    if bite.peak_hours.is_empty() {
        println!("  {}", statics::EN_LABEL_NONE);
    } else {
        let hours: Vec<String> = bite.peak_hours.iter().map(|h| format!("{h:02}")).collect();
        println!(
            "  {} {} {} {}, {} {}",
            statics::EN_LABEL_PEAK,
            bite.peak,
            statics::EN_LABEL_AT_HOURS,
            hours.join(" "),
            statics::EN_LABEL_MEAN,
            bite.mean
        );
    }
}

fn label<R: Record>(handle: Option<&RecordRef<R>>) -> String {
    match handle {
        Some(h) => format!("#{} {}", h.id(), h.name()),
        None => statics::EN_LABEL_NONE.to_string(),
    }
}

fn print_handles<R: Record>(heading: &str, handles: &[RecordRef<R>]) {
    println!("{heading}");
    if handles.is_empty() {
        println!("  {}", statics::EN_LABEL_NONE);
    }
    for h in handles {
        println!("  #{} {}", h.id(), h.name());
    }
}
