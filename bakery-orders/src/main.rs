use anyhow::{bail, Context, Result};
use bakery_orders::availability::{AvailabilitySource, SampleAvailability, SlotKind, SlotStatus};
use bakery_orders::pricing::format_rand;
use bakery_orders::submission::{DryRunGateway, FormspreeGateway, SubmissionGateway};
use bakery_orders::tables::GroupRole;
use bakery_orders::{Category, Configurator, OrderRequest, PriceTables, ValidationState};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bakery-orders")]
#[command(about = "Price and submit cake, cupcake and cookie orders", long_about = None)]
struct Cli {
    /// Price tables to use instead of the built-in ones
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price an order described in YAML
    Quote {
        /// Path to order YAML file (use '-' for stdin)
        order: String,

        /// Print the breakdown and validation as JSON
        #[arg(long)]
        json: bool,

        /// Check the event date against availability as of this day
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// List option groups, choices and prices
    Options {
        /// Only show this category (cakes, cupcakes, cookies)
        #[arg(long, short = 'c')]
        category: Option<String>,
    },

    /// Show open order slots
    Availability {
        /// Number of days to show
        #[arg(long, default_value_t = 14)]
        days: u32,

        /// First day of the calendar (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Price an order and send it to the order form endpoint
    Submit {
        /// Path to order YAML file (use '-' for stdin)
        order: String,

        /// Show what would be sent without sending it
        #[arg(long)]
        dry_run: bool,

        /// Send to this endpoint instead of the one in the price tables
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let tables = PriceTables::resolve(cli.tables.as_deref()).context("Failed to load price tables")?;

    match cli.command {
        Commands::Quote { order, json, today } => {
            let configurator = build_order(&tables, &order)?;
            let calendar = today
                .map(SampleAvailability::new)
                .unwrap_or_else(SampleAvailability::starting_today);
            let validation = configurator.validation_state_with(&calendar);

            if json {
                let report = serde_json::json!({
                    "category": configurator.category(),
                    "breakdown": configurator.price_breakdown(),
                    "validation": validation,
                    "completeness": validation.completeness(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_quote(&configurator, &validation);
            }
        }
        Commands::Options { category } => {
            let only = category
                .map(|c| c.parse::<Category>())
                .transpose()
                .context("Unknown category")?;
            print_options(&tables, only);
        }
        Commands::Availability { days, today } => {
            let calendar = today
                .map(SampleAvailability::new)
                .unwrap_or_else(SampleAvailability::starting_today);
            print_availability(&calendar, days);
        }
        Commands::Submit { order, dry_run, endpoint } => {
            let mut configurator = build_order(&tables, &order)?;
            let validation = configurator.validation_state_with(&SampleAvailability::starting_today());
            print_quote(&configurator, &validation);

            if !validation.is_complete() {
                bail!("Order is incomplete, missing: {}", validation.missing.join(", "));
            }

            let payload = configurator.payload();
            let endpoint = endpoint.or_else(|| env::var("BAKERY_FORM_ENDPOINT").ok());
            let receipt = if dry_run {
                let gateway = DryRunGateway::new();
                println!("\n🧪 Dry run - this is what would be sent:");
                println!("{}", serde_json::to_string_pretty(&payload)?);
                gateway.submit(&payload).await?
            } else {
                let gateway = FormspreeGateway::from_tables(&tables, endpoint.as_deref());
                println!("\n📨 Sending your order...");
                gateway.submit(&payload).await.context("Failed to submit order")?
            };

            println!("✅ Order received ({} via {})", receipt.status, receipt.endpoint);
            configurator.reset();
            debug!("Order reset after submission");
        }
    }

    Ok(())
}

fn build_order(tables: &PriceTables, order_path: &str) -> Result<Configurator> {
    let input = read_input(order_path)?;
    let request: OrderRequest =
        serde_yaml::from_str(&input).context("Failed to parse order YAML")?;
    info!("Pricing {} order", request.category);

    let mut configurator = Configurator::new(tables.clone(), request.category)?;
    request
        .apply(&mut configurator)
        .context(format!("Invalid order in {}", order_path))?;
    Ok(configurator)
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        // Read from stdin
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        Ok(input)
    } else {
        std::fs::read_to_string(Path::new(path))
            .context(format!("Failed to read order from {}", path))
    }
}

fn print_quote(configurator: &Configurator, validation: &ValidationState) {
    let breakdown = configurator.price_breakdown();
    let width = breakdown
        .lines
        .iter()
        .map(|l| l.label.len())
        .max()
        .unwrap_or(0)
        .max("TOTAL ESTIMATE".len());

    println!("🧁 {}", configurator.table().title);
    for line in &breakdown.lines {
        println!("   {:<width$}  {:>8}", line.label, format_rand(line.amount), width = width);
    }
    println!("   {}", "-".repeat(width + 10));
    println!(
        "   {:<width$}  {:>8}",
        "TOTAL ESTIMATE",
        format_rand(breakdown.total),
        width = width
    );

    for warning in &validation.warnings {
        println!("   \x1b[33m⚠️  {}\x1b[0m", warning);
    }

    print!("\n📋 Form completion: {}%", validation.percent());
    if validation.missing.is_empty() {
        println!();
    } else {
        println!(" (missing: {})", validation.missing.join(", "));
    }
}

fn print_options(tables: &PriceTables, only: Option<Category>) {
    for (category, table) in tables.categories() {
        if only.is_some_and(|c| c != category) {
            continue;
        }
        println!("\n📦 {} ({})", table.title, category.as_str());
        for package in &table.packages {
            println!("   package {:<20} {}", package.id, format_rand(package.price));
        }
        for group in &table.product.groups {
            let role = match group.role {
                GroupRole::Delivery => " [delivery]",
                GroupRole::Option => "",
            };
            println!("   {}{}", group.label, role);
            for choice in &group.choices {
                let marker = if choice.key == group.default { "*" } else { " " };
                println!("     {} {:<20} {:>+6}", marker, choice.key, choice.delta);
            }
        }
        if !table.product.extras.is_empty() {
            println!("   Extras");
            for extra in &table.product.extras {
                println!("       {:<20} {:>+6}", extra.id, extra.delta);
            }
        }
        for (bolt_on, bolt_table) in &table.bolt_ons {
            println!("   Add-on: {} ({})", bolt_table.label, bolt_on.as_str());
            for group in &bolt_table.product.groups {
                let choices: Vec<String> = group
                    .choices
                    .iter()
                    .map(|c| format!("{} ({})", c.key, format_rand(c.delta)))
                    .collect();
                println!("     {}: {}", group.label, choices.join(", "));
            }
        }
    }
}

fn print_availability(calendar: &SampleAvailability, days: u32) {
    println!("📅 Availability from {}", calendar.today());
    for day in calendar.range(calendar.today(), days) {
        let status = match day.status {
            SlotStatus::Available => "✅ Available",
            SlotStatus::Limited => "⚠️ Limited",
            SlotStatus::Unavailable => "❌ Full",
        };
        if day.status == SlotStatus::Unavailable {
            println!("   {}  {}", day.date.format("%a %d %b"), status);
        } else {
            println!(
                "   {}  {:<14} Bento: {}/{}  Custom: {}/{}",
                day.date.format("%a %d %b"),
                status,
                day.remaining(SlotKind::Bento),
                SampleAvailability::BENTO_CAPACITY,
                day.remaining(SlotKind::Custom),
                SampleAvailability::CUSTOM_CAPACITY,
            );
        }
    }
}
