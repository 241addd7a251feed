use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dutycheck::api::{self, AppState};
use dutycheck::core::{DutyPolicy, ReferenceTable};
use dutycheck::emit::{self, EmitConfig};

#[derive(Parser, Debug)]
#[command(
    name = "dutycheck",
    about = "KRA motor-vehicle import duty calculator and static page generator"
)]
struct Cli {
    /// Path to the CRSP cascade reference table
    #[arg(long, default_value = "data/crsp_cascade.json")]
    data: PathBuf,

    #[command(flatten)]
    policy: PolicyArgs,

    #[command(subcommand)]
    command: Command,
}

/// KRA policy parameters. Rates are given in percent; the engine works in
/// fractions.
#[derive(Args, Debug)]
struct PolicyArgs {
    #[arg(
        long,
        default_value_t = 2026,
        help = "Policy year duty is assessed against"
    )]
    current_year: i32,
    #[arg(long, default_value_t = 8, help = "Maximum import age in years")]
    max_age: i32,
    #[arg(
        long,
        default_value_t = 2.4469,
        help = "Divisor stripping built-in taxes from the CRSP value"
    )]
    valuation_divisor: f64,
    #[arg(long, default_value_t = 25.0, help = "Import duty rate in percent")]
    import_duty_rate: f64,
    #[arg(long, default_value_t = 20.0, help = "Excise duty rate in percent")]
    excise_rate: f64,
    #[arg(long, default_value_t = 16.0, help = "VAT rate in percent")]
    vat_rate: f64,
    #[arg(
        long,
        default_value_t = 2.25,
        help = "Import Declaration Fee rate in percent"
    )]
    idf_rate: f64,
    #[arg(long, default_value_t = 5000.0, help = "Minimum IDF charge in KES")]
    idf_floor: f64,
    #[arg(
        long,
        default_value_t = 1.5,
        help = "Railway Development Levy rate in percent"
    )]
    rdl_rate: f64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the interactive calculator, JSON API, and rendered pages
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Write the full static site plus sitemaps
    Generate {
        #[arg(long, default_value = "dist")]
        out: PathBuf,
        #[arg(long, default_value = "https://dutycheck.co.ke")]
        base_url: String,
        /// Sitemap lastmod stamp (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        build_date: Option<NaiveDate>,
    },
}

fn build_policy(args: &PolicyArgs) -> Result<DutyPolicy, String> {
    let defaults = DutyPolicy::default();
    let tier_ceiling = defaults
        .depreciation_tiers
        .last()
        .map(|(ceiling, _)| *ceiling)
        .unwrap_or(0);

    if args.max_age < 0 {
        return Err("--max-age must be >= 0".to_string());
    }
    if args.max_age > tier_ceiling {
        return Err(format!(
            "--max-age {} exceeds the depreciation schedule (covers ages up to {tier_ceiling})",
            args.max_age
        ));
    }
    if !args.valuation_divisor.is_finite() || args.valuation_divisor <= 0.0 {
        return Err("--valuation-divisor must be > 0".to_string());
    }
    for (flag, value) in [
        ("--import-duty-rate", args.import_duty_rate),
        ("--excise-rate", args.excise_rate),
        ("--vat-rate", args.vat_rate),
        ("--idf-rate", args.idf_rate),
        ("--rdl-rate", args.rdl_rate),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(format!("{flag} must be between 0 and 100 percent"));
        }
    }
    if !args.idf_floor.is_finite() || args.idf_floor < 0.0 {
        return Err("--idf-floor must be >= 0".to_string());
    }

    Ok(DutyPolicy {
        current_year: args.current_year,
        max_age: args.max_age,
        valuation_divisor: args.valuation_divisor,
        import_duty_rate: args.import_duty_rate / 100.0,
        excise_rate: args.excise_rate / 100.0,
        vat_rate: args.vat_rate / 100.0,
        idf_rate: args.idf_rate / 100.0,
        idf_floor: args.idf_floor,
        rdl_rate: args.rdl_rate / 100.0,
        depreciation_tiers: defaults.depreciation_tiers,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let policy = match build_policy(&cli.policy) {
        Ok(policy) => policy,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(2);
        }
    };

    let table = ReferenceTable::load(&cli.data)
        .with_context(|| format!("failed to load reference table {}", cli.data.display()))?;

    match cli.command {
        Command::Serve { port } => {
            api::run_http_server(AppState { table, policy }, port)
                .await
                .context("server error")?;
        }
        Command::Generate {
            out,
            base_url,
            build_date,
        } => {
            let config = EmitConfig {
                out_dir: out,
                base_url,
                build_date: build_date.unwrap_or_else(|| Utc::now().date_naive()),
            };
            let stats = emit::generate_site(&table, &policy, &config)?;
            println!(
                "Generated {} pages and {} sitemaps → {}",
                stats.total_pages(),
                stats.sitemaps,
                config.out_dir.display()
            );
        }
    }

    Ok(())
}
