//! gymlens - gym machine companion
//!
//! Functions server, terminal UI and one-shot commands in one binary.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gymlens::client::HttpFunctions;
use gymlens::config::{self, ClientConfig, GatewayConfig};
use gymlens::db::{Database, MachineStore, MachineUpdate};
use gymlens::functions::{self, FunctionsState};
use gymlens::gateway::Gateway;
use gymlens::muscles::{join_muscles, parse_muscle_list};
use gymlens::tui::App;
use gymlens::views::{ExerciseResults, ImageFile, MachineList, Route, TimedPlayer, UploadForm};

#[derive(Parser)]
#[command(name = "gymlens")]
#[command(author, version, about = "Identify gym machines and get workouts built around them")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "GYMLENS_DB", default_value = config::DEFAULT_DB_PATH)]
    db: String,

    /// Base URL of the functions server
    #[arg(long, global = true, env = "GYMLENS_FUNCTIONS_URL", default_value = config::DEFAULT_FUNCTIONS_URL)]
    functions_url: String,

    /// Bearer token sent to the functions server
    #[arg(long, global = true, env = "GYMLENS_FUNCTIONS_KEY", hide_env_values = true)]
    functions_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the terminal UI
    Tui,

    /// Run the analyze-machine and generate-exercises functions
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "GYMLENS_BIND", default_value = config::DEFAULT_BIND)]
        bind: String,
    },

    /// Identify the machine in a photo and store it
    Upload {
        image: PathBuf,
    },

    /// List stored machines, newest first
    List,

    /// Change a machine's name, muscles or notes
    Edit {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        /// Comma separated, e.g. "chest, triceps"
        #[arg(short, long)]
        muscles: Option<String>,

        /// Empty string clears the notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Remove a machine
    Delete {
        id: i64,
    },

    /// Generate exercises for a machine and a workout goal
    Generate {
        id: i64,
        goal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client_config = ClientConfig::new(cli.db, cli.functions_url, cli.functions_key);

    match cli.command {
        Some(Commands::Serve { bind }) => {
            let gateway = Gateway::new(GatewayConfig::from_env());
            functions::serve(&bind, FunctionsState::new(gateway)).await?;
        }

        Some(Commands::Upload { image }) => {
            let db = Database::open(&client_config.database_path)?;
            let api = functions_client(&client_config);
            let file = ImageFile::read(&image)?;

            let mut form = UploadForm::new();
            let stored = form.submit(&file, &db, &api).await;
            for notice in form.notices.drain() {
                println!("{}", notice.message);
            }
            match stored {
                Some(machine) => println!("Stored as id {} ({})", machine.id, join_muscles(&machine.muscles)),
                None => bail!("upload failed"),
            }
        }

        Some(Commands::List) => {
            let db = Database::open(&client_config.database_path)?;
            let machines = db.list_machines()?;
            if machines.is_empty() {
                println!("No machines yet. Upload a photo to get started.");
            }
            for m in &machines {
                println!(
                    "{:>4} | {} | {:24} | {} | {}",
                    m.id,
                    m.created_at.format("%Y-%m-%d %H:%M"),
                    m.name,
                    join_muscles(&m.muscles),
                    m.notes.as_deref().unwrap_or("-")
                );
            }
        }

        Some(Commands::Edit { id, name, muscles, notes }) => {
            let db = Database::open(&client_config.database_path)?;
            let Some(current) = db.get_machine(id)? else {
                bail!("machine {} not found", id);
            };
            let notes = notes.or(current.notes);
            let update = MachineUpdate {
                name: name.map(|n| n.trim().to_string()).unwrap_or(current.name),
                muscles: muscles.map(|m| parse_muscle_list(&m)).unwrap_or(current.muscles),
                notes: notes.filter(|n| !n.trim().is_empty()),
            };
            db.update_machine(id, &update)?;
            println!("Machine updated!");
        }

        Some(Commands::Delete { id }) => {
            let db = Database::open(&client_config.database_path)?;
            db.delete_machine(id)?;
            println!("Machine deleted");
        }

        Some(Commands::Generate { id, goal }) => {
            let db = Database::open(&client_config.database_path)?;
            let api = functions_client(&client_config);

            let mut list = MachineList::new();
            list.load(&db);
            if list.machine(id).is_none() {
                bail!("machine {} not found", id);
            }
            list.set_goal(id, goal);

            eprintln!("Generating your workout...");
            let route = list
                .generate(id, &api, &TimedPlayer, &client_config.transition)
                .await;
            for notice in list.notices.errors() {
                eprintln!("{}", notice.message);
            }
            match route {
                Some(Route::Exercises(state)) => print!("{}", ExerciseResults::new(Some(state)).render_text()),
                _ => bail!("exercise generation failed"),
            }
        }

        Some(Commands::Tui) | None => {
            let db = Database::open(&client_config.database_path)?;
            let mut app = App::new(db, client_config);
            app.run()?;
        }
    }

    Ok(())
}

fn functions_client(config: &ClientConfig) -> HttpFunctions {
    HttpFunctions::new(config.functions_url.clone(), config.api_key.clone())
}
