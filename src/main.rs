use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_store::{ContentStore, Resource, StoreConfig};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Read and edit portfolio content stored in a GitHub repository")]
struct Cli {
    /// Token to store and use for this and later runs
    #[arg(long, env = "FOLIO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a resource as JSON
    Get { name: String },
    /// Replace a resource with the JSON document in a file
    Put {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete the file backing a resource
    Delete { name: String },
    /// Check whether a resource file exists
    Exists { name: String },
    /// Check the credential against the remote
    Validate,
    /// Create missing resource files with empty defaults
    Init,
    /// Persist a token for later runs
    Login { token: String },
    /// Forget the persisted token
    Logout,
    /// Append a record to a collection resource
    Add {
        resource: Resource,
        /// Record as a JSON object
        record: String,
    },
    /// Remove a record from a collection resource
    Remove { resource: Resource, id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::load().context("failed to load FOLIO__* configuration")?;
    let store = ContentStore::new(config).await?;

    if let Some(token) = &cli.token {
        store.set_credential(token).await?;
    }

    match cli.command {
        Commands::Get { name } => {
            let value = store.get_content(&name).await?;
            print_json(&value)?;
        }
        Commands::Put { name, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {:?}", file))?;
            let value: Value = serde_json::from_slice(&data)
                .with_context(|| format!("{:?} is not valid JSON", file))?;
            let outcome = store.update_content(&name, &value).await?;
            let verb = if outcome.created { "created" } else { "updated" };
            println!("{} {}", verb, outcome.path);
        }
        Commands::Delete { name } => {
            store.delete_content(&name).await?;
            println!("deleted {}", store.path_for(&name));
        }
        Commands::Exists { name } => {
            println!("{}", store.resource_exists(&name).await);
        }
        Commands::Validate => {
            let status = store.validate().await?;
            print_json(&serde_json::to_value(status)?)?;
        }
        Commands::Init => {
            let created = store.initialize_resources().await?;
            if created.is_empty() {
                println!("all resources present");
            }
            for resource in created {
                println!("created {}", store.path_for(resource.name()));
            }
        }
        Commands::Login { token } => {
            store.set_credential(&token).await?;
            if store.credentials().is_set().await {
                println!("token stored");
            } else {
                println!("token cleared");
            }
        }
        Commands::Logout => {
            store.clear_credential().await?;
            println!("token cleared");
        }
        Commands::Add { resource, record } => {
            let record: Value =
                serde_json::from_str(&record).context("record is not valid JSON")?;
            let stored = store.add_record(resource, record).await?;
            print_json(&stored)?;
        }
        Commands::Remove { resource, id } => {
            store.delete_record(resource, id).await?;
            println!("removed {} from {}", id, resource);
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
