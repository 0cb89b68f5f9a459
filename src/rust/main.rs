use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use segmenta::dashboard::{render_landing, render_resolved, run_interactive};
use segmenta::{AppContext, ArtifactManager, CustomerInput, DisplayPayload, Session};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding scaler.json, kmeans_model.json and cluster_data.csv
    #[arg(short, long, global = true)]
    artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the segment of one customer
    Predict {
        #[arg(short = 'q', long, default_value_t = 100)]
        total_quantity: i64,
        #[arg(short = 'p', long, default_value_t = 12.5)]
        avg_unit_price: f64,
        #[arg(short = 't', long, default_value_t = 1500.0)]
        avg_transaction_value: f64,
        /// Print the display payload as JSON
        #[arg(long)]
        json: bool,
        /// Also print the distance to every cluster center
        #[arg(short, long)]
        verbose: bool,
    },
    /// Draw a random customer and predict its segment
    Random {
        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Show the personas and a preview of the sample data
    Personas,
    /// Interactive dashboard session on stdin/stdout
    Interactive,
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let manager = match args.artifacts_dir {
        Some(dir) => ArtifactManager::new(dir),
        None => ArtifactManager::new_default(),
    };
    let ctx = Arc::new(AppContext::load(&manager));
    info!("Artifacts ready: predict {}", if ctx.can_predict() { "enabled" } else { "disabled" });

    match args.command.unwrap_or(Command::Interactive) {
        Command::Predict { total_quantity, avg_unit_price, avg_transaction_value, json, verbose } => {
            let input = CustomerInput::new(total_quantity, avg_unit_price, avg_transaction_value);
            predict(&ctx, input, json, verbose)
        }
        Command::Random { seed, json } => {
            let input = match seed {
                Some(seed) => CustomerInput::random(&mut StdRng::seed_from_u64(seed)),
                None => CustomerInput::random(&mut rand::thread_rng()),
            };
            if !json {
                println!(
                    "Data randomized! Total quantity: {}, avg unit price: {:.2}, avg transaction value: {:.2}\n",
                    input.total_quantity, input.avg_unit_price, input.avg_transaction_value
                );
            }
            predict(&ctx, input, json, false)
        }
        Command::Personas => {
            print!("{}", render_landing(&ctx));
            Ok(())
        }
        Command::Interactive => {
            let mut session = Session::new(Arc::clone(&ctx));
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            run_interactive(&mut session, stdin.lock(), &mut stdout)
                .context("Interactive session failed")
        }
    }
}

fn predict(ctx: &AppContext, input: CustomerInput, json: bool, verbose: bool) -> Result<()> {
    if let Some(err) = ctx.load_error() {
        bail!("Model or scaler not loaded ({}). Make sure the artifact files are in the artifacts directory.", err);
    }

    let payload = ctx.predict(&input)
        .with_context(|| format!("Prediction failed for {:?}", input))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    print!("{}", render_resolved(ctx, &payload));
    if verbose {
        print_distances(&payload);
    }
    Ok(())
}

fn print_distances(payload: &DisplayPayload) {
    let Some(distances) = &payload.distances else {
        println!("\nThis model does not expose cluster centers.");
        return;
    };
    let mut ranked: Vec<_> = distances.iter().enumerate().collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("\nDistance to each cluster center (scaled space):");
    for (cluster, distance) in ranked {
        println!("    cluster {}: {:.3}", cluster, distance);
    }
}
