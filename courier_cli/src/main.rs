use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use crate::{
    generate::GenerateSubcommands, get_matrix::GetMatrixArgs, optimize::OptimizeArgs,
    optimize_many::OptimizeManyArgs,
};

mod file_utils;
mod generate;
mod get_matrix;
mod optimize;
mod optimize_many;
mod parsers;
mod report;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plans a single request and prints its routes
    #[command(visible_alias = "o")]
    Optimize {
        #[command(flatten)]
        args: OptimizeArgs,
    },
    /// Plans every request of a folder concurrently
    OptimizeMany {
        #[command(flatten)]
        args: OptimizeManyArgs,
    },
    /// Warms the matrix cache for requests
    GetMatrix {
        #[command(flatten)]
        args: GetMatrixArgs,
    },
    #[command(visible_alias = "g")]
    Generate {
        #[command(subcommand)]
        commands: GenerateSubcommands,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::from_filename("./.env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Commands::Optimize { args } => optimize::run(args).await?,
        Commands::OptimizeMany { args } => optimize_many::run(args).await?,
        Commands::GetMatrix { args } => get_matrix::run(args).await?,
        Commands::Generate { commands } => generate::run(commands)?,
    }

    Ok(())
}
