//! menutree CLI
//!
//! Entry point for the `menutree` command-line tool.

use clap::{Args, Parser, Subcommand};
use menutree::{EffectiveConfig, Item, SortKey, Tree, TreeCache, TreeFlags};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "menutree")]
#[command(about = "Build and inspect desktop application menus", version)]
struct Cli {
    /// Log at debug level (RUST_LOG is ignored)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Engine config file (default: $XDG_CONFIG_HOME/menutree/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Menu prefix override (default: $XDG_MENU_PREFIX)
    #[arg(long, global = true)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a menu tree
    List {
        /// Definition name or absolute path
        #[arg(default_value = "applications.menu")]
        menu: String,

        #[command(flatten)]
        flags: FlagArgs,

        /// Order of merged items (name, display-name)
        #[arg(long, default_value = "name")]
        sort: SortKey,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Resolve a path to a directory or entry
    Path {
        /// Definition name or absolute path
        menu: String,

        /// `/`-separated menu ids, optionally ending with a desktop-file id
        path: String,

        #[command(flatten)]
        flags: FlagArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the menu again whenever its sources change
    Watch {
        /// Definition name or absolute path
        #[arg(default_value = "applications.menu")]
        menu: String,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Show the effective engine configuration
    Config,
}

#[derive(Args)]
struct FlagArgs {
    /// Keep entries excluded by rules or desktop restrictions
    #[arg(long)]
    include_excluded: bool,

    /// Keep directories without visible contents
    #[arg(long)]
    show_empty: bool,

    /// Keep items marked NoDisplay
    #[arg(long)]
    include_nodisplay: bool,

    /// Keep every separator
    #[arg(long)]
    show_all_separators: bool,
}

impl FlagArgs {
    fn to_flags(&self) -> TreeFlags {
        let mut flags = TreeFlags::empty();
        flags.set(TreeFlags::INCLUDE_EXCLUDED, self.include_excluded);
        flags.set(TreeFlags::SHOW_EMPTY, self.show_empty);
        flags.set(TreeFlags::INCLUDE_NODISPLAY, self.include_nodisplay);
        flags.set(TreeFlags::SHOW_ALL_SEPARATORS, self.show_all_separators);
        flags
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let effective = match load_config(cli.config, cli.prefix) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::List {
            menu,
            flags,
            sort,
            json,
        } => run_list(&effective, &menu, flags.to_flags(), sort, json),
        Commands::Path {
            menu,
            path,
            flags,
            json,
        } => run_path(&effective, &menu, &path, flags.to_flags(), json),
        Commands::Watch { menu, flags } => run_watch(&effective, &menu, flags.to_flags()),
        Commands::Config => run_config(&effective),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", error);
    }
}

fn load_config(
    file: Option<PathBuf>,
    prefix: Option<String>,
) -> Result<EffectiveConfig, menutree::config::ConfigError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let overrides = prefix.map(|p| json!({ "menu_prefix": p }));
    EffectiveConfig::build(&env, file.as_deref(), overrides)
}

fn lookup_or_exit(cache: &TreeCache, menu: &str, flags: TreeFlags) -> Tree {
    match cache.lookup(menu, flags) {
        Some(tree) => tree,
        None => {
            eprintln!("Menu not found or unreadable: {}", menu);
            process::exit(1);
        }
    }
}

fn run_list(effective: &EffectiveConfig, menu: &str, flags: TreeFlags, sort: SortKey, json: bool) {
    let cache = TreeCache::from_config(&effective.config);
    let tree = lookup_or_exit(&cache, menu, flags);
    tree.set_sort_key(sort);

    if json {
        print_json(&tree_json(&tree));
    } else {
        print_tree(&tree);
    }
}

fn run_path(effective: &EffectiveConfig, menu: &str, path: &str, flags: TreeFlags, json: bool) {
    let cache = TreeCache::from_config(&effective.config);
    let tree = lookup_or_exit(&cache, menu, flags);

    let node = if let Some(dir) = tree.get_directory_from_path(path) {
        ItemNode::from_item(&dir.to_item())
    } else if let Some(entry) = tree.get_entry_from_path(path) {
        ItemNode::from_item(&entry.to_item())
    } else {
        eprintln!("No directory or entry at {}", path);
        process::exit(1);
    };

    if json {
        print_json(&node);
    } else {
        node.print(0);
    }
}

fn run_watch(effective: &EffectiveConfig, menu: &str, flags: TreeFlags) {
    let cache = match TreeCache::watching(&effective.config) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Cannot watch for changes: {}", e);
            process::exit(1);
        }
    };
    let tree = lookup_or_exit(&cache, menu, flags);

    let (stop_sender, stop_receiver) = crossbeam_channel::bounded(1);
    let installed = ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal, stopping...");
        let _ = stop_sender.try_send(());
    });
    if let Err(e) = installed {
        eprintln!("Cannot install interrupt handler: {}", e);
        process::exit(1);
    }

    print_tree(&tree);
    tree.add_monitor(on_change, ());
    eprintln!("Watching {} paths; press Ctrl-C to stop", tree.tracked_files().len());

    let _ = stop_receiver.recv();
    tree.remove_monitor(on_change, &());
}

fn on_change(tree: &Tree, _: &()) {
    println!();
    println!("--- {} changed ---", tree.menu_file().display());
    print_tree(tree);
}

fn run_config(effective: &EffectiveConfig) {
    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn print_tree(tree: &Tree) {
    ItemNode::from_item(&tree.root_directory().to_item()).print(0);
}

fn tree_json(tree: &Tree) -> Value {
    json!({
        "menu_file": tree.menu_file(),
        "flags": tree.flags().bits(),
        "sort_key": tree.sort_key(),
        "root": ItemNode::from_item(&tree.root_directory().to_item()),
    })
}

/// Serializable snapshot of an item and everything below it
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ItemNode {
    Directory {
        menu_id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        contents: Vec<ItemNode>,
    },
    Entry {
        id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exec: Option<String>,
        path: PathBuf,
        excluded: bool,
    },
    Separator,
    Header {
        name: String,
    },
    Alias {
        target: Box<ItemNode>,
    },
}

impl ItemNode {
    fn from_item(item: &Item) -> Self {
        match item {
            Item::Directory(dir) => Self::Directory {
                menu_id: dir.menu_id().to_string(),
                name: dir.name().to_string(),
                comment: dir.comment().map(str::to_string),
                icon: dir.icon().map(str::to_string),
                contents: dir.contents().iter().map(Self::from_item).collect(),
            },
            Item::Entry(entry) => Self::Entry {
                id: entry.desktop_file_id().to_string(),
                name: entry.display_name().to_string(),
                exec: entry.exec().map(str::to_string),
                path: entry.desktop_file_path().to_path_buf(),
                excluded: entry.is_excluded(),
            },
            Item::Separator(_) => Self::Separator,
            Item::Header(header) => Self::Header {
                name: header.directory().name().to_string(),
            },
            Item::Alias(alias) => Self::Alias {
                target: Box::new(Self::from_item(&alias.item())),
            },
        }
    }

    fn print(&self, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Directory { name, contents, .. } => {
                println!("{}{}/", indent, name);
                for child in contents {
                    child.print(depth + 1);
                }
            }
            Self::Entry { id, name, excluded, .. } => {
                let mark = if *excluded { " (excluded)" } else { "" };
                println!("{}{} [{}]{}", indent, name, id, mark);
            }
            Self::Separator => println!("{}----", indent),
            Self::Header { name } => println!("{}== {} ==", indent, name),
            Self::Alias { target } => {
                print!("{}-> ", indent);
                target.print_inline();
            }
        }
    }

    fn print_inline(&self) {
        match self {
            Self::Directory { name, .. } => println!("{}/", name),
            Self::Entry { id, name, .. } => println!("{} [{}]", name, id),
            Self::Separator => println!("----"),
            Self::Header { name } => println!("== {} ==", name),
            Self::Alias { target } => target.print_inline(),
        }
    }
}
