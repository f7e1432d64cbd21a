use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use rocket_portal::config::{ActivatorKind, InterceptorKind, PortalConfig};
use rocket_portal::models::{self, Feature, FeatureList};
use rocket_portal::portal::{AmbientContext, Criteria, DataPortal, HandlerRegistry};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Manage project features through the data portal")]
struct Cli {
    /// Database file (overrides ROCKET_PORTAL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Record hooks and activation into the ambient context and print it afterwards
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a feature to a project
    Add {
        /// Project the feature belongs to
        #[arg(short, long)]
        project: Uuid,

        title: String,

        #[arg(long)]
        details: Option<String>,

        #[arg(long)]
        priority: Option<i32>,
    },
    /// List the features of a project
    List {
        #[arg(short, long)]
        project: Uuid,
    },
    /// Rename a feature
    Rename { id: Uuid, title: String },
    /// Remove a feature
    Remove { id: Uuid },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "rocket_portal=info".into()),
    );

    // stdout carries command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = PortalConfig::from_env();
    if let Some(path) = cli.db {
        config.database_path = Some(path);
    }
    if cli.trace {
        config.interceptor = InterceptorKind::Audit;
        config.activator = ActivatorKind::Audit;
    }

    let db = config.open_database()?;
    let mut registry = HandlerRegistry::new();
    models::register(&mut registry, &db);
    let portal = config.build(registry);

    let mut context = AmbientContext::new();
    run(&portal, &mut context, cli.command)?;

    if cli.trace {
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    Ok(())
}

fn run(portal: &DataPortal, context: &mut AmbientContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Add {
            project,
            title,
            details,
            priority,
        } => {
            let mut list: FeatureList = portal.fetch(context, project_criteria(project))?;
            let mut feature: Feature = portal
                .children(context)
                .create_child(project_criteria(project))?;
            feature.set_title(title);
            if details.is_some() {
                feature.set_details(details);
            }
            if let Some(priority) = priority {
                feature.set_priority(priority);
            }
            let id = feature.id();
            list.push(feature);
            portal.save(context, &mut list)?;
            println!("{}", id);
        }
        Commands::List { project } => {
            let list: FeatureList = portal.fetch(context, project_criteria(project))?;
            if list.is_empty() {
                println!("No features in project {}", project);
            }
            for feature in &list {
                println!(
                    "{}  {:<11}  {:>3}  {}",
                    feature.id(),
                    feature.state().as_str(),
                    feature.priority(),
                    feature.title()
                );
            }
        }
        Commands::Rename { id, title } => {
            let mut feature: Feature = portal.fetch(context, Criteria::single(id.to_string()))?;
            feature.set_title(title);
            portal.save(context, &mut feature)?;
            tracing::info!(%id, "feature renamed");
        }
        Commands::Remove { id } => {
            let mut feature: Feature = portal.fetch(context, Criteria::single(id.to_string()))?;
            feature.mark_deleted();
            portal.save(context, &mut feature)?;
            tracing::info!(%id, "feature removed");
        }
    }
    Ok(())
}

fn project_criteria(project: Uuid) -> Criteria {
    Criteria::single(project.to_string())
}
