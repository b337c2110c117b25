// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use curio::backends::camera::CameraBackendType;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "curio")]
#[command(about = "Catalogue your collections, with photos from your camera")]
#[command(version = curio::constants::app_info::version())]
struct Cli {
    /// Config file to use instead of ~/.config/curio/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera backend (v4l2 or still), overriding the config
    #[arg(long, global = true)]
    backend: Option<CameraBackendType>,

    /// Image directory for the still backend, overriding the config
    #[arg(long, global = true)]
    still_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    Cameras,

    /// Capture a 224x224 photo
    Capture {
        /// Camera index to use (from 'curio cameras')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Output PNG path (default: ./capture_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Attach the photo to this item instead of writing a file
        #[arg(long, conflicts_with = "output")]
        item: Option<String>,
    },

    /// Resize and compress an image file
    Normalize {
        /// Image to normalize
        input: PathBuf,

        /// Output JPEG path (default: INPUT_normalized.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Live camera preview in the terminal
    Terminal {
        /// Attach the captured photo to this item
        #[arg(long, conflicts_with = "output")]
        item: Option<String>,

        /// Output PNG path for the captured photo
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create an account and sign in
    Signup { email: String, password: String },

    /// Sign in
    Signin { email: String, password: String },

    /// Sign out
    Signout,

    /// Show the signed-in user
    Whoami,

    /// Request a password reset code
    ResetPassword { email: String },

    /// Set a new password with a reset code
    ConfirmReset { token: String, password: String },

    /// Manage collections
    #[command(subcommand)]
    Collections(CollectionCommands),

    /// Manage items
    #[command(subcommand)]
    Items(ItemCommands),

    /// Walk through collections and check off items you can find
    Inventory {
        /// Mark every item as not found before starting
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List your collections
    List,
    /// Create a collection
    Add { name: String },
    /// Rename a collection
    Rename { id: String, name: String },
    /// Delete a collection and all of its items
    Delete { id: String },
    /// Remove items whose collection no longer exists
    Sweep,
}

#[derive(Subcommand)]
enum ItemCommands {
    /// List the items of a collection
    List { collection: String },
    /// Add an item to a collection
    Add {
        collection: String,
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Image file to attach
        #[arg(short, long, conflicts_with = "capture")]
        image: Option<PathBuf>,
        /// Take the photo with the camera
        #[arg(long)]
        capture: bool,
    },
    /// Edit an item
    Edit {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Replace the image with this file
        #[arg(short, long, conflicts_with = "remove_image")]
        image: Option<PathBuf>,
        /// Remove the item's image
        #[arg(long)]
        remove_image: bool,
    },
    /// Delete an item
    Delete { id: String },
    /// Mark an item as found (or not found)
    Found {
        id: String,
        #[arg(long)]
        not: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=curio=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut ctx = cli::Context::load(args.config, args.backend, args.still_dir)?;

    match args.command {
        Commands::Cameras => cli::list_cameras(&ctx),
        Commands::Capture {
            camera,
            output,
            item,
        } => cli::capture(&mut ctx, camera, output, item),
        Commands::Normalize { input, output } => cli::normalize(&ctx, input, output),
        Commands::Terminal { item, output } => cli::terminal(&mut ctx, item, output),
        Commands::Signup { email, password } => cli::sign_up(&ctx, &email, &password),
        Commands::Signin { email, password } => cli::sign_in(&ctx, &email, &password),
        Commands::Signout => cli::sign_out(&ctx),
        Commands::Whoami => cli::whoami(&ctx),
        Commands::ResetPassword { email } => cli::reset_password(&ctx, &email),
        Commands::ConfirmReset { token, password } => cli::confirm_reset(&ctx, &token, &password),
        Commands::Collections(command) => match command {
            CollectionCommands::List => cli::list_collections(&ctx),
            CollectionCommands::Add { name } => cli::add_collection(&ctx, name),
            CollectionCommands::Rename { id, name } => cli::rename_collection(&ctx, &id, name),
            CollectionCommands::Delete { id } => cli::delete_collection(&ctx, &id),
            CollectionCommands::Sweep => cli::sweep_items(&ctx),
        },
        Commands::Items(command) => match command {
            ItemCommands::List { collection } => cli::list_items(&ctx, &collection),
            ItemCommands::Add {
                collection,
                name,
                description,
                image,
                capture,
            } => cli::add_item(&mut ctx, collection, name, description, image, capture),
            ItemCommands::Edit {
                id,
                name,
                description,
                image,
                remove_image,
            } => cli::edit_item(&ctx, &id, name, description, image, remove_image),
            ItemCommands::Delete { id } => cli::delete_item(&ctx, &id),
            ItemCommands::Found { id, not } => cli::set_found(&ctx, &id, !not),
        },
        Commands::Inventory { reset } => cli::inventory(&ctx, reset),
    }
}
