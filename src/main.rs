//! leadbase CLI - Lead intake backend
//!
//! # Main Commands
//!
//! ```bash
//! leadbase serve                 # Start HTTP server (port 3000)
//! leadbase import leads.csv      # Bulk import a CSV of leads
//! leadbase export                # Dump all leads as CSV
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! leadbase validate leads.csv    # Dry-run a CSV without importing
//! leadbase init-db               # Create the database schema
//! ```

use clap::{Parser, Subcommand};
use leadbase::{leads_to_csv, parse_leads, Database, ImportError, LeadService, Requester};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "leadbase")]
#[command(about = "Lead intake backend: validated CRUD, history log, CSV import", long_about = None)]
struct Cli {
    /// SQLite database path (default: $LEADBASE_DB or leadbase.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: $PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database schema
    InitDb,

    /// Validate a CSV file without importing anything
    Validate {
        /// Input CSV file
        input: PathBuf,
    },

    /// Bulk import a CSV file of leads
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Owner identity recorded on the imported leads
        #[arg(short, long, default_value = "cli")]
        owner: String,
    },

    /// Export all leads as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let db_path = database_path(cli.db.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(&db_path, port).await,
        Commands::InitDb => cmd_init_db(&db_path),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Import { input, owner } => cmd_import(&db_path, &input, &owner),
        Commands::Export { output } => cmd_export(&db_path, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn database_path(arg: Option<&Path>) -> PathBuf {
    arg.map(Path::to_path_buf)
        .or_else(|| std::env::var("LEADBASE_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("leadbase.db"))
}

async fn cmd_serve(db_path: &Path, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(3000);

    let db = Database::open(db_path)?;
    eprintln!("💾 Database: {}", db_path.display());

    leadbase::server::start_server(LeadService::new(db), port).await
}

fn cmd_init_db(db_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Database::open(db_path)?;
    eprintln!("✅ Schema ready at {}", db_path.display());
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let bytes = fs::read(input)?;
    match parse_leads(&bytes) {
        Ok(leads) => {
            eprintln!("✅ All {} row(s) valid", leads.len());
            Ok(())
        }
        Err(ImportError::Rows(errors)) => {
            eprintln!("❌ {} row(s) invalid:", errors.len());
            for err in errors.iter().take(10) {
                eprintln!("   - {}", err);
            }
            if errors.len() > 10 {
                eprintln!("   ... +{} more", errors.len() - 10);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_import(db_path: &Path, input: &Path, owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let bytes = fs::read(input)?;
    let validated = parse_leads(&bytes)?;
    eprintln!("   {} row(s) validated", validated.len());

    let db = Database::open(db_path)?;
    let service = LeadService::new(db);
    let imported = service.import_leads(&Requester::new(owner, "cli"), validated)?;

    eprintln!("✅ Imported {} lead(s) as '{}'", imported, owner);
    Ok(())
}

fn cmd_export(db_path: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(db_path)?;
    let service = LeadService::new(db);

    let leads = service.list_leads()?;
    eprintln!("📦 Exporting {} lead(s)", leads.len());

    let csv = leads_to_csv(&leads)?;
    match output {
        Some(path) => {
            fs::write(path, &csv)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
