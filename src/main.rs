use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pharmacy_checkout::application::{CheckoutRequest, CheckoutService};
use pharmacy_checkout::domain::PaymentMethod;
use pharmacy_checkout::infrastructure::{
    CheckoutConfig, HttpPaymentGateway, LocalPrescriptionStorage, MySqlCheckoutStore,
    PaymentGatewayConfig, TtlCartExpiry,
};
use pharmacy_checkout::ports::PrescriptionFile;
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = CheckoutService<MySqlCheckoutStore, HttpPaymentGateway, LocalPrescriptionStorage>;

#[derive(Debug, Parser)]
#[command(name = "pharmacy-checkout", about = "Pharmacy checkout operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check whether a cart can be checked out
    Validate(CartArgs),
    /// Show the confirmation summary of a cart
    Summary(CartArgs),
    /// Turn a cart into an order
    Checkout(CheckoutArgs),
}

#[derive(Debug, Args)]
struct CartArgs {
    #[arg(long)]
    cart_id: i64,

    /// Owner of the cart
    #[arg(long)]
    user_id: i64,
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    #[command(flatten)]
    cart: CartArgs,

    /// cash, card or wallet
    #[arg(long, default_value = "cash")]
    payment_method: String,

    /// ISO currency code; defaults to DEFAULT_CURRENCY
    #[arg(long)]
    currency: Option<String>,

    #[arg(long)]
    billing_address: Option<String>,

    #[arg(long)]
    shipping_address: Option<String>,

    /// Prescription image to attach; repeatable
    #[arg(long = "prescription")]
    prescriptions: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = CheckoutConfig::from_env().context("failed to load checkout configuration")?;
    let gateway_config =
        PaymentGatewayConfig::from_env().context("failed to load payment gateway configuration")?;

    info!("Connecting to database...");
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    info!("Database connected successfully");

    let service: Service = CheckoutService::new(
        Arc::new(MySqlCheckoutStore::new(
            Arc::new(pool),
            config.lock_wait_timeout(),
        )),
        Arc::new(HttpPaymentGateway::new(gateway_config)?),
        Arc::new(LocalPrescriptionStorage::new(&config.prescription_upload_dir)),
        Arc::new(TtlCartExpiry::from_minutes(config.cart_ttl_minutes)),
        config.policy.clone(),
    );

    match cli.command {
        Commands::Validate(args) => {
            let result = service
                .validate_cart_for_checkout(args.cart_id, args.user_id)
                .await;
            print_json(&result)
        }
        Commands::Summary(args) => {
            match service.get_checkout_summary(args.cart_id, args.user_id).await {
                Ok(summary) => print_json(&summary),
                Err(validation) => print_json(&validation),
            }
        }
        Commands::Checkout(args) => {
            let request = build_request(&args).await?;
            let result = service
                .process_checkout(args.cart.cart_id, args.cart.user_id, request)
                .await;
            print_json(&result)
        }
    }
}

async fn build_request(args: &CheckoutArgs) -> anyhow::Result<CheckoutRequest> {
    let payment_method: PaymentMethod = args
        .payment_method
        .parse()
        .with_context(|| format!("invalid payment method: {}", args.payment_method))?;

    let mut prescription_files = Vec::with_capacity(args.prescriptions.len());
    for path in &args.prescriptions {
        prescription_files.push(read_prescription(path).await?);
    }

    Ok(CheckoutRequest {
        payment_method: Some(payment_method),
        currency: args.currency.clone(),
        billing_address: args.billing_address.clone(),
        shipping_address: args.shipping_address.clone(),
        prescription_required: !prescription_files.is_empty(),
        prescription_files,
    })
}

async fn read_prescription(path: &Path) -> anyhow::Result<PrescriptionFile> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => Some("image/jpeg".to_string()),
        Some("png") => Some("image/png".to_string()),
        Some("pdf") => Some("application/pdf".to_string()),
        _ => None,
    };

    Ok(PrescriptionFile {
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type,
        contents,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
