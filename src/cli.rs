// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing cameras and capturing photos
//! - Normalizing image files
//! - Account management
//! - Managing collections and items, and checking inventory

use chrono::Local;
use curio::auth::{AuthProvider, LocalAuthProvider, User, require_user};
use curio::backends::camera::{
    CameraBackend, CaptureSessionManager, backend_for_type, list_video_input_devices,
};
use curio::backends::camera::types::CameraBackendType;
use curio::forms::{CollectionForm, ItemForm};
use curio::inventory::{Inventory, InventoryWalk, Item};
use curio::pipelines::photo::{ImageNormalizer, NormalizedImage};
use curio::store::JsonFileStore;
use curio::{Config, terminal};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

const STORE_FILE_NAME: &str = "store.json";
const AUTH_FILE_NAME: &str = "auth.json";

/// Everything a command needs, built once from the config
pub struct Context {
    config: Config,
    config_path: PathBuf,
    backend: Arc<dyn CameraBackend>,
    auth: LocalAuthProvider,
    inventory: Inventory,
    normalizer: ImageNormalizer,
}

impl Context {
    pub fn load(
        config_path: Option<PathBuf>,
        backend: Option<CameraBackendType>,
        still_dir: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.unwrap_or_else(Config::default_path);
        let mut config = Config::load_or_default(&config_path);
        if !config_path.exists()
            && let Err(e) = config.save_to(&config_path)
        {
            warn!(error = %e, "Could not write default config");
        }
        if let Some(backend) = backend {
            config.backend = backend;
        }
        if let Some(dir) = still_dir {
            config.still_image_dir = Some(dir);
        }

        let store = JsonFileStore::open(config.data_dir.join(STORE_FILE_NAME))?;
        let auth = LocalAuthProvider::open(config.data_dir.join(AUTH_FILE_NAME))?;
        debug!(data_dir = %config.data_dir.display(), backend = %config.backend, "Loaded context");

        Ok(Self {
            backend: backend_for_type(config.backend, config.still_image_dir.clone()),
            normalizer: ImageNormalizer::from_config(&config),
            inventory: Inventory::new(Arc::new(store)),
            auth,
            config,
            config_path,
        })
    }

    fn user(&self) -> Result<User, Box<dyn std::error::Error>> {
        Ok(require_user(&self.auth)?)
    }

    fn session(&self) -> CaptureSessionManager {
        let mut session = CaptureSessionManager::new(self.backend.clone());
        session.set_preferred_device(self.config.last_camera_id.clone());
        session
    }

    /// Remember the camera that last streamed
    fn remember_camera(&mut self, device_id: Option<String>) {
        if device_id.is_none() || device_id == self.config.last_camera_id {
            return;
        }
        self.config.last_camera_id = device_id;
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!(error = %e, "Could not remember camera");
        }
    }
}

// --- Camera ---

/// List all available cameras
pub fn list_cameras(ctx: &Context) -> CliResult {
    if !ctx.backend.is_available() {
        println!("Camera backend '{}' is not available.", ctx.config.backend);
        return Ok(());
    }

    let cameras = list_video_input_devices(ctx.backend.as_ref());
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let marker = if ctx.config.last_camera_id.as_deref() == Some(camera.id.as_str()) {
            " (last used)"
        } else {
            ""
        };
        println!("  [{}] {}{}", index, camera.label, marker);
        println!("      {}", camera.id);
    }

    Ok(())
}

/// Take a photo without the preview
pub fn capture(
    ctx: &mut Context,
    camera: Option<usize>,
    output: Option<PathBuf>,
    item: Option<String>,
) -> CliResult {
    let target = match item {
        Some(id) => Some(owned_item(ctx, &ctx.user()?, &id)?),
        None => None,
    };

    let image = capture_headless(ctx, camera)?;
    deliver_photo(ctx, image, output, target)
}

/// Live preview in the terminal, capture with 'p'
pub fn terminal(ctx: &mut Context, item: Option<String>, output: Option<PathBuf>) -> CliResult {
    let target = match item {
        Some(id) => Some(owned_item(ctx, &ctx.user()?, &id)?),
        None => None,
    };

    let mut session = ctx.session();
    let outcome = terminal::run(&mut session, &ctx.normalizer)?;
    ctx.remember_camera(outcome.device_id);

    match outcome.image {
        Some(image) => deliver_photo(ctx, image, output, target),
        None => {
            println!("No photo taken.");
            Ok(())
        }
    }
}

fn capture_headless(
    ctx: &mut Context,
    camera: Option<usize>,
) -> Result<NormalizedImage, Box<dyn std::error::Error>> {
    let mut session = ctx.session();

    if let Some(index) = camera {
        session.refresh_devices();
        let count = session.devices().len();
        if count == 0 {
            return Err("No cameras found".into());
        }
        if index >= count {
            return Err(format!("Camera index {} out of range (0-{})", index, count - 1).into());
        }
        session.select_device(index)?;
    }

    if session.open().is_err() {
        return Err(session
            .last_error()
            .unwrap_or(curio::backends::camera::manager::CAMERA_ACCESS_ERROR)
            .into());
    }
    let device_id = session.active_device_id().map(str::to_string);
    if let Some(device) = session.cursor().current() {
        println!("Using camera: {}", device.label);
    }

    // Wait for frames to stabilize (camera warm-up)
    println!("Capturing...");
    let start = Instant::now();
    let timeout = Duration::from_secs(5);
    let warmup = Duration::from_millis(500);
    let mut have_frame = false;

    while start.elapsed() < timeout {
        session.check_stream()?;
        have_frame = session.latest_frame().is_some_and(|f| f.is_ready());
        if have_frame && start.elapsed() > warmup {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    if !have_frame {
        session.close();
        return Err("Failed to capture frame from camera".into());
    }

    let image = session.capture(&ctx.normalizer)?;
    ctx.remember_camera(device_id);
    Ok(image)
}

/// Attach a captured photo to an item, or write it as a PNG
fn deliver_photo(
    ctx: &Context,
    image: NormalizedImage,
    output: Option<PathBuf>,
    target: Option<Item>,
) -> CliResult {
    if let Some(item) = target {
        let name = item.name.clone();
        let mut form = ItemForm::edit(item);
        form.set_captured_image(image);
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(form.submit(&ctx.auth, &ctx.inventory, &ctx.normalizer))?;
        println!("Photo attached to '{}'", name);
        return Ok(());
    }

    let path = output.unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("capture_{}.{}", timestamp, image.format().extension()))
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, image.decode_payload()?)?;
    println!(
        "Photo saved: {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

/// Resize and compress an image file to JPEG
pub fn normalize(ctx: &Context, input: PathBuf, output: Option<PathBuf>) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    let image = rt.block_on(ctx.normalizer.normalize_path(&input))?;

    let output = output.unwrap_or_else(|| default_normalized_path(&input, &image));
    std::fs::write(&output, image.decode_payload()?)?;
    println!(
        "Normalized: {} ({}x{})",
        output.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

fn default_normalized_path(input: &Path, image: &NormalizedImage) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_normalized.{}", stem, image.format().extension()))
}

// --- Accounts ---

pub fn sign_up(ctx: &Context, email: &str, password: &str) -> CliResult {
    let user = ctx.auth.sign_up(email, password)?;
    println!("Signed up and signed in as {}", user.email);
    Ok(())
}

pub fn sign_in(ctx: &Context, email: &str, password: &str) -> CliResult {
    let user = ctx.auth.sign_in(email, password)?;
    println!("Signed in as {}", user.email);
    Ok(())
}

pub fn sign_out(ctx: &Context) -> CliResult {
    ctx.auth.sign_out()?;
    println!("Signed out.");
    Ok(())
}

pub fn whoami(ctx: &Context) -> CliResult {
    match ctx.auth.current_user() {
        Some(user) => println!("{} ({})", user.email, user.uid),
        None => println!("Not signed in."),
    }
    Ok(())
}

/// Request a reset code
///
/// Without a mail transport the code is printed here.
pub fn reset_password(ctx: &Context, email: &str) -> CliResult {
    ctx.auth.send_password_reset_email(email)?;

    let email = email.trim().to_lowercase();
    let request = ctx
        .auth
        .reset_outbox()
        .into_iter()
        .rev()
        .find(|r| r.email == email)
        .ok_or("Reset request was not recorded")?;
    println!("Password reset code for {}: {}", request.email, request.token);
    println!("Run 'curio confirm-reset {} <new password>' to finish.", request.token);
    Ok(())
}

pub fn confirm_reset(ctx: &Context, token: &str, password: &str) -> CliResult {
    ctx.auth.confirm_password_reset(token, password)?;
    println!("Password updated. Sign in with the new password.");
    Ok(())
}

// --- Collections ---

pub fn list_collections(ctx: &Context) -> CliResult {
    let user = ctx.user()?;
    let collections = ctx.inventory.get_collections(&user)?;
    if collections.is_empty() {
        println!("No collections yet. Create one with 'curio collections add <name>'.");
        return Ok(());
    }

    for collection in &collections {
        let progress = ctx.inventory.inventory_progress(&user, &collection.id)?;
        let cover = ctx
            .inventory
            .first_item_image(&user, &collection.id)?
            .map(|_| " [cover]")
            .unwrap_or("");
        println!(
            "{}  {}  ({} items, {}){}",
            collection.id, collection.name, progress.total, progress, cover
        );
    }
    Ok(())
}

pub fn add_collection(ctx: &Context, name: String) -> CliResult {
    let mut form = CollectionForm::new();
    form.name = name;
    let id = form.submit(&ctx.auth, &ctx.inventory)?;
    println!("Created collection {}", id);
    Ok(())
}

pub fn rename_collection(ctx: &Context, id: &str, name: String) -> CliResult {
    let user = ctx.user()?;
    let collection = ctx
        .inventory
        .get_collection(&user, id)?
        .ok_or_else(|| format!("Collection {} not found", id))?;

    let mut form = CollectionForm::edit(collection);
    form.name = name;
    form.submit(&ctx.auth, &ctx.inventory)?;
    println!("Renamed collection {}", id);
    Ok(())
}

pub fn delete_collection(ctx: &Context, id: &str) -> CliResult {
    let user = ctx.user()?;
    let removed = ctx.inventory.delete_collection(&user, id)?;
    println!("Deleted collection {} and {} items", id, removed);
    Ok(())
}

pub fn sweep_items(ctx: &Context) -> CliResult {
    let user = ctx.user()?;
    let removed = ctx.inventory.sweep_orphaned_items(&user)?;
    println!("Removed {} orphaned items", removed);
    Ok(())
}

// --- Items ---

/// Fetch one of the user's items
fn owned_item(ctx: &Context, user: &User, id: &str) -> Result<Item, Box<dyn std::error::Error>> {
    ctx.inventory
        .get_item(user, id)?
        .ok_or_else(|| format!("Item {} not found", id).into())
}

fn read_image_file(path: &Path) -> Result<(Vec<u8>, Option<String>), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
    let mime_hint = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string());
    Ok((bytes, mime_hint))
}

pub fn list_items(ctx: &Context, collection_id: &str) -> CliResult {
    let user = ctx.user()?;
    let collection = ctx
        .inventory
        .get_collection(&user, collection_id)?
        .ok_or_else(|| format!("Collection {} not found", collection_id))?;

    let items = ctx.inventory.get_items_by_collection(&user, &collection.id)?;
    println!("{} ({} items)", collection.name, items.len());
    for item in &items {
        let found = if item.is_found() { "x" } else { " " };
        let photo = if item.image().is_some() { " [photo]" } else { "" };
        println!("  [{}] {}  {}{}", found, item.id, item.name, photo);
        if !item.description.is_empty() {
            println!("        {}", item.description);
        }
    }
    Ok(())
}

pub fn add_item(
    ctx: &mut Context,
    collection_id: String,
    name: String,
    description: String,
    image: Option<PathBuf>,
    capture: bool,
) -> CliResult {
    let user = ctx.user()?;
    if ctx.inventory.get_collection(&user, &collection_id)?.is_none() {
        return Err(format!("Collection {} not found", collection_id).into());
    }

    let mut form = ItemForm::new(collection_id);
    form.name = name;
    form.description = description;
    if let Some(path) = image {
        let (bytes, mime_hint) = read_image_file(&path)?;
        form.set_file_image(bytes, mime_hint);
    } else if capture {
        form.set_captured_image(capture_headless(ctx, None)?);
    }

    let rt = tokio::runtime::Runtime::new()?;
    if let Some(id) = rt.block_on(form.submit(&ctx.auth, &ctx.inventory, &ctx.normalizer))? {
        println!("Added item {}", id);
    }
    Ok(())
}

pub fn edit_item(
    ctx: &Context,
    id: &str,
    name: Option<String>,
    description: Option<String>,
    image: Option<PathBuf>,
    remove_image: bool,
) -> CliResult {
    let user = ctx.user()?;
    let item = owned_item(ctx, &user, id)?;

    let mut form = ItemForm::edit(item);
    if let Some(name) = name {
        form.name = name;
    }
    if let Some(description) = description {
        form.description = description;
    }
    if let Some(path) = image {
        let (bytes, mime_hint) = read_image_file(&path)?;
        form.set_file_image(bytes, mime_hint);
    } else if remove_image {
        form.remove_image();
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(form.submit(&ctx.auth, &ctx.inventory, &ctx.normalizer))?;
    println!("Updated item {}", id);
    Ok(())
}

pub fn delete_item(ctx: &Context, id: &str) -> CliResult {
    let user = ctx.user()?;
    let item = owned_item(ctx, &user, id)?;
    ctx.inventory.delete_item(&user, &item.id)?;
    println!("Deleted item '{}'", item.name);
    Ok(())
}

pub fn set_found(ctx: &Context, id: &str, found: bool) -> CliResult {
    let user = ctx.user()?;
    let item = owned_item(ctx, &user, id)?;
    ctx.inventory.set_item_found(&user, &item.id, found)?;
    println!(
        "'{}' marked as {}",
        item.name,
        if found { "found" } else { "not found" }
    );
    Ok(())
}

// --- Inventory check ---

/// Walk every collection, asking about each item not yet found
pub fn inventory(ctx: &Context, reset: bool) -> CliResult {
    let user = ctx.user()?;
    let mut walk = InventoryWalk::start(&ctx.inventory, &user)?;
    if walk.is_finished() {
        println!("No collections to check.");
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut quit = false;

    while let Some(collection) = walk.current().cloned() {
        if reset {
            ctx.inventory.reset_found(&user, &collection.id)?;
        }

        let (visited, total) = walk.position();
        println!();
        println!("[{}/{}] {}", visited + 1, total, collection.name);

        for item in walk.current_items(&ctx.inventory)? {
            if item.is_found() {
                continue;
            }
            print!("  Found '{}'? [y/N/q] ", item.name);
            std::io::stdout().flush()?;

            let answer = match lines.next() {
                Some(line) => line?,
                None => {
                    quit = true;
                    break;
                }
            };
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => ctx.inventory.set_item_found(&user, &item.id, true)?,
                "q" | "quit" => {
                    quit = true;
                    break;
                }
                _ => {}
            }
        }

        let progress = walk.current_progress(&ctx.inventory)?;
        if progress.is_complete() {
            println!("  All {} items found.", progress.total);
        } else {
            println!("  {} ({} missing)", progress, progress.missing());
        }

        if quit {
            break;
        }
        walk.next_collection();
    }

    let (visited, total) = walk.position();
    println!();
    println!("Checked {} of {} collections.", visited, total);
    Ok(())
}
