//! CLI entry point for the graphmap entity store.
//!
//! Results go to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use graphmap_core::config::Settings;
use graphmap_core::Properties;
use graphmap_graph::{GraphBackend, GraphClient, GraphConfig, MemoryGraph};
use graphmap_ogm::{EntityStore, Mapped};

#[derive(Parser)]
#[command(name = "graphmap")]
#[command(about = "Map in-memory entities onto a graph database")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphmap).
    #[arg(short, long, default_value = "graphmap", global = true)]
    config: String,

    /// Use an in-process graph instead of Neo4j.
    #[arg(long, global = true)]
    memory: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Save Alice, relate her to Bob and Carol, and read the friends back.
    Demo,
    /// Load the node under a unique index entry and print it.
    Load {
        /// Index name.
        #[arg(long)]
        index: String,
        /// Index key.
        #[arg(long)]
        key: String,
        /// Index value. Parsed as JSON if possible, otherwise taken as a string.
        #[arg(long)]
        value: String,
    },
    /// Delete every node and relationship.
    Clear,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Person {
    email: Option<String>,
    name: Option<String>,
    age: Option<u32>,
}

impl Person {
    fn new(email: &str, name: &str, age: u32) -> Self {
        Self {
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            age: Some(age),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let logs = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    if cli.memory {
        run(EntityStore::new(MemoryGraph::new()), cli.command).await
    } else {
        let settings = Settings::load(&cli.config)?;
        let graph = GraphClient::connect(&GraphConfig::from(settings.neo4j)).await?;
        run(EntityStore::new(graph), cli.command).await
    }
}

async fn run<G: GraphBackend>(store: EntityStore<G>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Demo => demo(&store).await,
        Command::Load { index, key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            let entity: Mapped<Properties> = store.load_unique(&index, &key, value).await?;
            println!("{}", serde_json::to_string_pretty(&describe(&entity))?);
            Ok(())
        }
        Command::Clear => {
            store.graph().clear().await?;
            tracing::info!("Graph cleared");
            Ok(())
        }
    }
}

async fn demo<G: GraphBackend>(store: &EntityStore<G>) -> anyhow::Result<()> {
    let mut alice = Mapped::new(Person::new("alice@example.com", "Alice", 34));
    store
        .save_unique(&mut alice, "People", "email", "alice@example.com")
        .await?;

    let bob = Mapped::new(Person::new("bob@example.org", "Bob", 66)).shared();
    let carol = Mapped::new(Person::new("carol@example.net", "Carol", 42)).shared();
    store.relate(&mut alice, "LIKES", &bob);
    store.relate(&mut alice, "LIKES", &carol);
    let node = store.save(&mut alice).await?;
    tracing::info!(node_id = %node, "Alice saved");

    let friends: Vec<Mapped<Person>> = store.load_related(&alice, "LIKES").await?;
    let names: Vec<_> = friends.iter().filter_map(|f| f.name.clone()).collect();
    println!("{}", serde_json::to_string(&names)?);
    Ok(())
}

fn describe(entity: &Mapped<Properties>) -> serde_json::Value {
    let relationships: Vec<_> = entity
        .relationships()
        .iter()
        .map(|(rel_type, entry)| {
            json!({
                "type": rel_type,
                "direction": entry.direction,
                "other": entry.endpoint.node(),
                "properties": entry.properties,
            })
        })
        .collect();

    json!({
        "node": entity.node(),
        "properties": entity.entity(),
        "relationships": relationships,
    })
}
