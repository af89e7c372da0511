//! cabinsync - operator CLI for the cabin booking backend
//!
//! Lists bookings and cabins through the sync layer and performs the same
//! writes the admin views do.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cabinsync::query::RawQuery;
use cabinsync::remote::{AssetPayload, CabinDraft, ImageSource, ResourceId, WriteIntent};
use cabinsync::{Config, RestClient, SyncClient, SyncError};

/// Cabin fields as given on the command line
#[derive(Debug)]
struct CabinArgs {
    name: String,
    max_capacity: u32,
    regular_price: f64,
    discount: f64,
    description: String,
    image: Option<PathBuf>,
}

/// CLI command
#[derive(Debug)]
enum Command {
    /// List one page of bookings
    Bookings { query: String },
    /// List all cabins
    Cabins,
    DeleteBooking { id: ResourceId },
    DeleteCabin { id: ResourceId },
    CreateCabin(CabinArgs),
    EditCabin { id: ResourceId, fields: CabinArgs },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"cabinsync - Manage cabins and bookings

USAGE:
    cabinsync bookings [query]
    cabinsync cabins
    cabinsync delete-booking <id>
    cabinsync delete-cabin <id>
    cabinsync create-cabin <name> <capacity> <price> <discount> <description> [image]
    cabinsync edit-cabin <id> <name> <capacity> <price> <discount> <description> [image]
    cabinsync help

COMMANDS:
    bookings        Show one page of bookings. The query uses the list view's
                    parameters: status=<status|all>&sortBy=<field>-<asc|desc>&page=<n>
    cabins          Show all cabins
    delete-booking  Delete a booking
    delete-cabin    Delete a cabin
    create-cabin    Create a cabin, uploading the image file if given
    edit-cabin      Update a cabin; without an image file the current image is kept
    help            Show this help message

EXAMPLES:
    cabinsync bookings "status=checked-in&sortBy=totalPrice-desc&page=2"
    cabinsync create-cabin 009 6 550 50 "Family cabin by the lake" ./cabin-009.jpg

ENVIRONMENT:
    CABINSYNC_API_URL       Project base URL
    CABINSYNC_API_KEY       API key
    CABINSYNC_ASSET_BUCKET  Bucket for cabin images (default: cabin-images)
    RUST_LOG                Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_id(raw: &str) -> Result<ResourceId> {
    raw.parse()
        .with_context(|| format!("Invalid id: {}", raw))
}

fn parse_cabin(args: &[String]) -> Result<CabinArgs> {
    if args.len() < 5 {
        return Err(anyhow!(
            "Expected <name> <capacity> <price> <discount> <description> [image]"
        ));
    }
    Ok(CabinArgs {
        name: args[0].clone(),
        max_capacity: args[1]
            .parse()
            .with_context(|| format!("Invalid capacity: {}", args[1]))?,
        regular_price: args[2]
            .parse()
            .with_context(|| format!("Invalid price: {}", args[2]))?,
        discount: args[3]
            .parse()
            .with_context(|| format!("Invalid discount: {}", args[3]))?,
        description: args[4].clone(),
        image: args.get(5).map(PathBuf::from),
    })
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "bookings" => Ok(Command::Bookings {
            query: args.get(2).cloned().unwrap_or_default(),
        }),
        "cabins" => Ok(Command::Cabins),
        "delete-booking" | "delete-cabin" => {
            let raw = args
                .get(2)
                .ok_or_else(|| anyhow!("Usage: cabinsync {} <id>", args[1]))?;
            let id = parse_id(raw)?;
            if args[1] == "delete-booking" {
                Ok(Command::DeleteBooking { id })
            } else {
                Ok(Command::DeleteCabin { id })
            }
        }
        "create-cabin" => Ok(Command::CreateCabin(parse_cabin(&args[2..])?)),
        "edit-cabin" => {
            let raw = args
                .get(2)
                .ok_or_else(|| anyhow!("Usage: cabinsync edit-cabin <id> <name> ..."))?;
            Ok(Command::EditCabin {
                id: parse_id(raw)?,
                fields: parse_cabin(&args[3..])?,
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

/// Build the draft, reading the image file when one was given
async fn draft_from(fields: CabinArgs, current: Option<ImageSource>) -> Result<CabinDraft> {
    let image = match fields.image {
        Some(path) => Some(ImageSource::Foreign(
            AssetPayload::from_path(&path)
                .await
                .with_context(|| format!("Failed to read image: {}", path.display()))?,
        )),
        None => current,
    };
    Ok(CabinDraft {
        name: fields.name,
        max_capacity: fields.max_capacity,
        regular_price: fields.regular_price,
        discount: fields.discount,
        description: fields.description,
        image,
    })
}

fn report(e: SyncError) -> anyhow::Error {
    if e.is_integrity_event() {
        error!(error = %e, "Backend left in an inconsistent state, manual cleanup required");
    } else {
        error!(error = %e, transient = e.is_transient(), "Operation failed");
    }
    anyhow::Error::new(e)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if let Command::Help = command {
        print_help();
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    let store = RestClient::from_config(&config).context("Failed to create remote client")?;
    let client = SyncClient::new(Arc::new(store), config.cache_ttl());

    match command {
        Command::Bookings { query } => {
            let state = client.bookings.sync(&RawQuery::from_query_string(&query)).await;
            if let Some(e) = state.error {
                return Err(report(e));
            }

            for booking in state.rows() {
                println!(
                    "  #{:<5} {:<12} {} -> {}  {:>2} nights  {:>9.2}  {}",
                    booking.id,
                    booking.status.as_str(),
                    booking.start_date,
                    booking.end_date,
                    booking.num_nights,
                    booking.total_price,
                    booking.guest.as_ref().map(|g| g.full_name.as_str()).unwrap_or("-"),
                );
            }
            match state.pagination() {
                Some(p) if p.is_needed() => println!(
                    "Showing {} to {} of {} results (page {} of {})",
                    p.first_shown(),
                    p.last_shown(),
                    p.total_count,
                    p.current_page,
                    p.page_count()
                ),
                Some(p) => println!("{} results", p.total_count),
                None => {}
            }

            client.bookings.settle_prefetches().await;
            client.cache.log_metrics();
        }
        Command::Cabins => {
            let cabins = client.cabins.cabins().await.map_err(report)?;
            if cabins.is_empty() {
                println!("No cabins.");
            }
            for cabin in cabins.iter() {
                println!(
                    "  #{:<5} {:<10} up to {:>2} guests  {:>8.2}  -{:<8.2} {}",
                    cabin.id,
                    cabin.name,
                    cabin.max_capacity,
                    cabin.regular_price,
                    cabin.discount,
                    cabin.image.as_ref().map(|l| l.as_str()).unwrap_or("(no image)"),
                );
            }
        }
        Command::DeleteBooking { id } => {
            client.mutations.delete_booking(id).await.map_err(report)?;
            println!("Booking #{} deleted.", id);
        }
        Command::DeleteCabin { id } => {
            client.mutations.delete_cabin(id).await.map_err(report)?;
            println!("Cabin #{} deleted.", id);
        }
        Command::CreateCabin(fields) => {
            let draft = draft_from(fields, None).await?;
            let cabin = client
                .writer
                .write(WriteIntent::create(draft))
                .await
                .map_err(report)?;
            info!(cabin_id = cabin.id, "Cabin created");
            println!("Cabin #{} created.", cabin.id);
        }
        Command::EditCabin { id, fields } => {
            let cabins = client.cabins.cabins().await.map_err(report)?;
            let current = cabins
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| anyhow!("Cabin #{} not found", id))?;
            let draft = draft_from(fields, current.image.clone().map(ImageSource::Resident)).await?;
            let cabin = client
                .writer
                .write(WriteIntent::update(id, draft))
                .await
                .map_err(report)?;
            info!(cabin_id = cabin.id, "Cabin updated");
            println!("Cabin #{} updated.", cabin.id);
        }
        Command::Help => {
            print_help();
        }
    }

    Ok(())
}
