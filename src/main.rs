// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use item_config::{
    derive_function_set, import_items, load_csv, search, Collaborators, DirtyFlag,
    EditingSession, FormChanges, FunctionChoice, FunctionKind, GroupTypeChoice, ItemSnapshot,
    ItemStore, ItemType, MessageLog, RemovalRequest, SearchQuery, Settings, SqliteItemStore,
};

#[derive(Parser)]
#[command(name = "item-config", version, about = "List, create, edit and remove registry items")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry database, overrides settings
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Import items from a CSV file
    Import { csv: PathBuf },
    /// List all items
    List,
    /// Show one item as JSON
    Show { name: String },
    /// Search item names for the parent/member pickers
    Search {
        #[arg(default_value = "")]
        query: String,
        /// Only group items
        #[arg(long)]
        groups: bool,
        /// Never offer this name
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Functions available for a group type (e.g. NumberItem, none)
    Functions {
        #[arg(value_parser = parse_group_type)]
        group_type: GroupTypeChoice,
    },
    /// Create a new item
    Create {
        name: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Edit an existing item
    Edit {
        name: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Remove an item after confirmation
    Remove {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Interactive item list (default)
    Ui,
}

#[derive(Args)]
struct FieldArgs {
    /// Item type, e.g. SwitchItem or GroupItem
    #[arg(long = "type", value_parser = parse_item_type)]
    item_type: Option<ItemType>,
    /// Group type, e.g. NumberItem or none
    #[arg(long, value_parser = parse_group_type)]
    group_type: Option<GroupTypeChoice>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Replace tags (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Replace parent groups (repeatable)
    #[arg(long = "parent")]
    parents: Vec<String>,
    /// Aggregation function, e.g. AVG or THRESHOLD
    #[arg(long, value_parser = parse_function_kind, conflicts_with = "no_function")]
    function: Option<FunctionKind>,
    /// Function parameter (repeatable, in order)
    #[arg(long = "param")]
    params: Vec<String>,
    /// Remove the aggregation function
    #[arg(long)]
    no_function: bool,
}

impl FieldArgs {
    fn into_changes(self) -> FormChanges {
        let function = if self.no_function {
            Some(FunctionChoice::default())
        } else {
            self.function.map(|kind| FunctionChoice {
                kind: Some(kind),
                params: self.params,
            })
        };

        FormChanges {
            name: None,
            item_type: self.item_type,
            group_type: self.group_type,
            category: self.category,
            label: self.label,
            tags: (!self.tags.is_empty()).then(|| self.tags.into_iter().collect::<BTreeSet<_>>()),
            group_names: (!self.parents.is_empty()).then_some(self.parents),
            function,
        }
    }
}

fn parse_item_type(s: &str) -> Result<ItemType, String> {
    ItemType::parse(s).ok_or_else(|| format!("unknown item type {:?}", s))
}

fn parse_group_type(s: &str) -> Result<GroupTypeChoice, String> {
    GroupTypeChoice::parse(s).ok_or_else(|| format!("unknown group type {:?}", s))
}

fn parse_function_kind(s: &str) -> Result<FunctionKind, String> {
    FunctionKind::parse(&s.to_uppercase()).ok_or_else(|| format!("unknown function {:?}", s))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }

    let store = SqliteItemStore::open(&settings.database_path)?;

    match cli.command.unwrap_or(Command::Ui) {
        Command::Import { csv } => run_import(&store, &csv),
        Command::List => run_list(&store),
        Command::Show { name } => run_show(&store, &name),
        Command::Search {
            query,
            groups,
            exclude,
        } => run_search(&store, &query, groups, exclude.as_deref()),
        Command::Functions { group_type } => {
            for kind in derive_function_set(group_type.base_type()) {
                let params = if kind.is_parametric() { " <lower> <upper>" } else { "" };
                println!("{}{}", kind, params);
            }
            Ok(())
        }
        Command::Create { name, fields } => {
            let mut changes = fields.into_changes();
            changes.name = Some(name);
            run_submit(&store, None, &changes)
        }
        Command::Edit { name, fields } => run_submit(&store, Some(&name), &fields.into_changes()),
        Command::Remove { name, yes } => run_remove(&store, &name, yes),
        Command::Ui => run_ui_mode(&store, &settings),
    }
}

fn run_import(store: &SqliteItemStore, csv: &std::path::Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let items = load_csv(csv)?;
    println!("✓ Loaded {} items from CSV", items.len());

    let (created, updated) = import_items(store.connection(), &items)?;
    println!("✓ Created: {} items", created);
    println!("✓ Updated: {} items", updated);
    Ok(())
}

fn run_list(store: &SqliteItemStore) -> Result<()> {
    let snapshot = ItemSnapshot::new(store.list_non_recursive()?);
    for item in snapshot.iter() {
        println!("{:<30} {:<18} {}", item.name, item.item_type, item.label);
    }
    println!("\n{} items", snapshot.count());
    Ok(())
}

fn run_show(store: &SqliteItemStore, name: &str) -> Result<()> {
    let snapshot = ItemSnapshot::new(store.list_non_recursive()?);
    let item = snapshot
        .get(name)
        .with_context(|| format!("No item named {}", name))?;
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

fn run_search(store: &SqliteItemStore, query: &str, groups: bool, exclude: Option<&str>) -> Result<()> {
    let snapshot = ItemSnapshot::new(store.list_non_recursive()?);
    let mut search_query = SearchQuery::new(query).excluding(exclude);
    if groups {
        search_query = search_query.groups_only();
    }
    for name in search(&snapshot, search_query) {
        println!("{}", name);
    }
    Ok(())
}

fn run_submit(store: &SqliteItemStore, key: Option<&str>, changes: &FormChanges) -> Result<()> {
    let mut session = EditingSession::open(store, key)?;
    session.apply(changes)?;

    let dirty = DirtyFlag::new();
    let messages = MessageLog::new();
    let result = session.submit(Collaborators::new(store, &dirty, &messages));

    for message in messages.drain() {
        println!("✓ {}", message);
    }
    result?;
    Ok(())
}

fn run_remove(store: &SqliteItemStore, name: &str, yes: bool) -> Result<()> {
    let snapshot = ItemSnapshot::new(store.list_non_recursive()?);
    let item = snapshot
        .get(name)
        .with_context(|| format!("No item named {}", name))?;
    let request = RemovalRequest::new(item.clone());

    if !yes && !confirm(&format!("Remove item {}?", name))? {
        request.cancel();
        println!("Cancelled.");
        return Ok(());
    }

    let dirty = DirtyFlag::new();
    let messages = MessageLog::new();
    request.confirm(Collaborators::new(store, &dirty, &messages))?;
    for message in messages.drain() {
        println!("✓ {}", message);
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &SqliteItemStore, settings: &Settings) -> Result<()> {
    let icons = item_config::PathIconResolver::new(settings.icon_base.clone());
    let mut app = ui::App::new(store, &icons)?;
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &SqliteItemStore, _settings: &Settings) -> Result<()> {
    anyhow::bail!("TUI mode not available, rebuild with --features tui")
}
