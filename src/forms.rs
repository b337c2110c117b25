// SPDX-License-Identifier: GPL-3.0-only

//! Item and collection forms
//!
//! A form holds draft fields and at most one pending image. Choosing a new
//! image source replaces whatever was pending before. Submitting resolves
//! the image in this order: pending file (normalized first), pending
//! capture, the item's existing image when editing, then none.
//!
//! File normalization is async, so an item submit runs in three steps:
//! [`ItemForm::begin_submit`] validates and snapshots the draft,
//! [`SubmitPlan::resolve`] normalizes without touching the form, and
//! [`ItemForm::finish_submit`] stores the result. Every plan carries the
//! form's ticket; a result arriving after the form was closed or reopened
//! is dropped.

use crate::auth::{AuthProvider, User, require_user};
use crate::inventory::{Collection, Inventory, Item};
use crate::pipelines::photo::{ImageNormalizer, NormalizedImage};
use tracing::{debug, error, warn};

pub const ITEM_NAME_EMPTY: &str = "Item name cannot be empty.";
pub const COLLECTION_NAME_EMPTY: &str = "Collection name cannot be empty.";
pub const NOT_AUTHENTICATED: &str = "User not authenticated.";
pub const FILE_IMAGE_FAILED: &str = "Failed to process image from file input.";

fn save_failed(editing: bool, what: &str) -> String {
    format!(
        "Failed to {} {}.",
        if editing { "update" } else { "add" },
        what
    )
}

/// The image waiting to be attached on submit
#[derive(Debug, Clone, PartialEq)]
pub enum PendingImage {
    /// Already normalized camera capture
    Captured(NormalizedImage),
    /// Raw bytes of a selected file, normalized on submit
    File {
        bytes: Vec<u8>,
        mime_hint: Option<String>,
    },
}

/// Identifies one opening of a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormTicket(u64);

#[derive(Debug, Clone, PartialEq)]
enum ItemFormMode {
    New { collection_id: String },
    Edit { item: Item },
}

/// Draft of a new or edited item
#[derive(Debug, Clone)]
pub struct ItemForm {
    mode: ItemFormMode,
    pub name: String,
    pub description: String,
    pending: Option<PendingImage>,
    existing_image: Option<String>,
    error: Option<String>,
    generation: u64,
    open: bool,
}

/// Where the submitted image comes from, snapshotted at submit time
#[derive(Debug, Clone)]
enum ImageSource {
    File {
        bytes: Vec<u8>,
        mime_hint: Option<String>,
    },
    Ready(String),
    None,
}

/// A validated submit waiting for its image
#[derive(Debug, Clone)]
pub struct SubmitPlan {
    ticket: FormTicket,
    user: User,
    name: String,
    description: String,
    source: ImageSource,
}

/// A submit whose image has been resolved
#[derive(Debug, Clone)]
pub struct ResolvedSubmit {
    ticket: FormTicket,
    user: User,
    name: String,
    description: String,
    image_data: Option<String>,
}

impl SubmitPlan {
    pub fn ticket(&self) -> FormTicket {
        self.ticket
    }

    /// Normalize a pending file; other sources pass through
    pub async fn resolve(self, normalizer: &ImageNormalizer) -> Result<ResolvedSubmit, String> {
        let image_data = match self.source {
            ImageSource::File { bytes, mime_hint } => {
                let image = normalizer
                    .normalize_file(bytes, mime_hint)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Could not normalize selected file");
                        FILE_IMAGE_FAILED.to_string()
                    })?;
                Some(image.into_data_url())
            }
            ImageSource::Ready(data_url) => Some(data_url),
            ImageSource::None => None,
        };

        Ok(ResolvedSubmit {
            ticket: self.ticket,
            user: self.user,
            name: self.name,
            description: self.description,
            image_data,
        })
    }
}

impl ItemForm {
    /// Empty form for a new item in `collection_id`
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            mode: ItemFormMode::New {
                collection_id: collection_id.into(),
            },
            name: String::new(),
            description: String::new(),
            pending: None,
            existing_image: None,
            error: None,
            generation: 0,
            open: true,
        }
    }

    /// Form prefilled from an existing item
    pub fn edit(item: Item) -> Self {
        let mut form = Self::new(item.collection_id.clone());
        form.name = item.name.clone();
        form.description = item.description.clone();
        form.existing_image = item.image().map(str::to_string);
        form.mode = ItemFormMode::Edit { item };
        form
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, ItemFormMode::Edit { .. })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn ticket(&self) -> FormTicket {
        FormTicket(self.generation)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn pending_image(&self) -> Option<&PendingImage> {
        self.pending.as_ref()
    }

    pub fn set_captured_image(&mut self, image: NormalizedImage) {
        self.pending = Some(PendingImage::Captured(image));
    }

    pub fn set_file_image(&mut self, bytes: Vec<u8>, mime_hint: Option<String>) {
        self.pending = Some(PendingImage::File { bytes, mime_hint });
    }

    /// Drop the pending image and the item's existing one
    pub fn remove_image(&mut self) {
        self.pending = None;
        self.existing_image = None;
    }

    /// Hide the form; results of earlier submits are ignored from now on
    pub fn close(&mut self) {
        self.open = false;
        self.generation += 1;
    }

    /// Show the form again with fields reset from its mode
    pub fn reopen(&mut self) {
        let generation = self.generation + 1;
        *self = match &self.mode {
            ItemFormMode::New { collection_id } => Self::new(collection_id.clone()),
            ItemFormMode::Edit { item } => Self::edit(item.clone()),
        };
        self.generation = generation;
    }

    /// Validate and snapshot the draft
    pub fn begin_submit(&mut self, auth: &dyn AuthProvider) -> Result<SubmitPlan, String> {
        self.error = None;

        if self.name.trim().is_empty() {
            return Err(self.fail(ITEM_NAME_EMPTY.to_string()));
        }
        let user = require_user(auth).map_err(|_| self.fail(NOT_AUTHENTICATED.to_string()))?;

        let source = match &self.pending {
            Some(PendingImage::File { bytes, mime_hint }) => ImageSource::File {
                bytes: bytes.clone(),
                mime_hint: mime_hint.clone(),
            },
            Some(PendingImage::Captured(image)) => ImageSource::Ready(image.data_url().to_string()),
            None => match &self.existing_image {
                Some(data_url) => ImageSource::Ready(data_url.clone()),
                None => ImageSource::None,
            },
        };

        Ok(SubmitPlan {
            ticket: self.ticket(),
            user,
            name: self.name.clone(),
            description: self.description.clone(),
            source,
        })
    }

    /// Store a resolved submit
    ///
    /// Returns `Ok(None)` when the result belongs to an earlier opening of
    /// the form and was discarded, otherwise the stored item's id. On success
    /// the form closes.
    pub fn finish_submit(
        &mut self,
        resolved: ResolvedSubmit,
        inventory: &Inventory,
    ) -> Result<Option<String>, String> {
        if resolved.ticket != self.ticket() || !self.open {
            debug!("Discarding result for a form that was closed");
            return Ok(None);
        }

        let image = resolved.image_data.as_deref();
        let result = match &self.mode {
            ItemFormMode::New { collection_id } => inventory.add_item(
                &resolved.user,
                collection_id,
                &resolved.name,
                &resolved.description,
                image,
            ),
            ItemFormMode::Edit { item } => inventory
                .update_item(
                    &resolved.user,
                    &item.id,
                    &resolved.name,
                    &resolved.description,
                    image,
                )
                .map(|()| item.id.clone()),
        };

        match result {
            Ok(id) => {
                self.close();
                Ok(Some(id))
            }
            Err(e) => {
                error!(error = %e, "Saving item failed");
                Err(self.fail(save_failed(self.is_editing(), "item")))
            }
        }
    }

    /// Report a failed image resolution on the form, if still current
    pub fn fail_submit(&mut self, ticket: FormTicket, message: String) -> String {
        if ticket == self.ticket() {
            self.error = Some(message.clone());
        }
        message
    }

    /// Validate, resolve the image and store the item in one go
    pub async fn submit(
        &mut self,
        auth: &dyn AuthProvider,
        inventory: &Inventory,
        normalizer: &ImageNormalizer,
    ) -> Result<Option<String>, String> {
        let plan = self.begin_submit(auth)?;
        let ticket = plan.ticket();
        let resolved = match plan.resolve(normalizer).await {
            Ok(resolved) => resolved,
            Err(message) => return Err(self.fail_submit(ticket, message)),
        };
        self.finish_submit(resolved, inventory)
    }

    fn fail(&mut self, message: String) -> String {
        self.error = Some(message.clone());
        message
    }
}

/// Draft of a new or renamed collection
#[derive(Debug, Clone)]
pub struct CollectionForm {
    editing: Option<Collection>,
    pub name: String,
    error: Option<String>,
}

impl CollectionForm {
    pub fn new() -> Self {
        Self {
            editing: None,
            name: String::new(),
            error: None,
        }
    }

    pub fn edit(collection: Collection) -> Self {
        Self {
            name: collection.name.clone(),
            editing: Some(collection),
            error: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Store the collection, returning its id
    pub fn submit(&mut self, auth: &dyn AuthProvider, inventory: &Inventory) -> Result<String, String> {
        self.error = None;

        if self.name.trim().is_empty() {
            return Err(self.fail(COLLECTION_NAME_EMPTY.to_string()));
        }
        let user = require_user(auth).map_err(|_| self.fail(NOT_AUTHENTICATED.to_string()))?;

        let result = match &self.editing {
            Some(collection) => inventory
                .update_collection(&user, &collection.id, &self.name)
                .map(|()| collection.id.clone()),
            None => inventory.add_collection(&user, &self.name),
        };

        result.map_err(|e| {
            error!(error = %e, "Saving collection failed");
            let message = save_failed(self.editing.is_some(), "collection");
            self.fail(message)
        })
    }

    fn fail(&mut self, message: String) -> String {
        self.error = Some(message.clone());
        message
    }
}

impl Default for CollectionForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthProvider;
    use crate::backends::camera::CameraFrame;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn setup() -> (LocalAuthProvider, Inventory, User) {
        let auth = LocalAuthProvider::in_memory().with_hash_iterations(1_000);
        let user = auth.sign_up("ana@example.com", "secret1").unwrap();
        (auth, Inventory::new(Arc::new(MemoryStore::new())), user)
    }

    fn captured() -> NormalizedImage {
        ImageNormalizer::new()
            .capture_frame(&CameraFrame::from_rgba(8, 6, vec![50u8; 8 * 6 * 4]))
            .unwrap()
    }

    #[test]
    fn test_new_source_replaces_pending_image() {
        let mut form = ItemForm::new("c1");
        form.set_captured_image(captured());
        form.set_file_image(vec![1, 2, 3], None);
        assert!(matches!(form.pending_image(), Some(PendingImage::File { .. })));

        form.set_captured_image(captured());
        assert!(matches!(form.pending_image(), Some(PendingImage::Captured(_))));
    }

    #[tokio::test]
    async fn test_empty_name_is_refused() {
        let (auth, inventory, _) = setup();
        let mut form = ItemForm::new("c1");
        form.name = "   ".into();

        let err = form
            .submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap_err();
        assert_eq!(err, ITEM_NAME_EMPTY);
        assert_eq!(form.error(), Some(ITEM_NAME_EMPTY));
    }

    #[tokio::test]
    async fn test_signed_out_user_is_refused() {
        let auth = LocalAuthProvider::in_memory();
        let inventory = Inventory::new(Arc::new(MemoryStore::new()));
        let mut form = ItemForm::new("c1");
        form.name = "Stamp".into();

        let err = form
            .submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap_err();
        assert_eq!(err, NOT_AUTHENTICATED);
    }

    #[tokio::test]
    async fn test_undecodable_file_refuses_submit() {
        let (auth, inventory, user) = setup();
        let cid = inventory.add_collection(&user, "Cards").unwrap();
        let mut form = ItemForm::new(cid.clone());
        form.name = "Card".into();
        form.set_file_image(b"not an image".to_vec(), Some("image/png".into()));

        let err = form
            .submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap_err();
        assert_eq!(err, FILE_IMAGE_FAILED);
        assert!(inventory.get_items_by_collection(&user, &cid).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_captured_image_is_stored() {
        let (auth, inventory, user) = setup();
        let cid = inventory.add_collection(&user, "Cards").unwrap();
        let mut form = ItemForm::new(cid.clone());
        form.name = "Card".into();
        form.set_captured_image(captured());

        let id = form
            .submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap()
            .unwrap();
        let item = inventory.get_item(&user, &id).unwrap().unwrap();
        assert!(item.image().unwrap().starts_with("data:image/png;base64,"));
        assert!(!form.is_open());
    }

    #[tokio::test]
    async fn test_edit_keeps_existing_image_unless_removed() {
        let (auth, inventory, user) = setup();
        let cid = inventory.add_collection(&user, "Cards").unwrap();
        let iid = inventory
            .add_item(&user, &cid, "Card", "", Some(captured().data_url()))
            .unwrap();
        let item = inventory.get_item(&user, &iid).unwrap().unwrap();

        let mut form = ItemForm::edit(item.clone());
        form.description = "mint".into();
        form.submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap();
        assert!(inventory.get_item(&user, &iid).unwrap().unwrap().image().is_some());

        let mut form = ItemForm::edit(item);
        form.remove_image();
        form.submit(&auth, &inventory, &ImageNormalizer::new())
            .await
            .unwrap();
        assert!(inventory.get_item(&user, &iid).unwrap().unwrap().image().is_none());
    }

    #[tokio::test]
    async fn test_result_for_reopened_form_is_discarded() {
        let (auth, inventory, user) = setup();
        let cid = inventory.add_collection(&user, "Cards").unwrap();
        let mut form = ItemForm::new(cid.clone());
        form.name = "Card".into();

        let plan = form.begin_submit(&auth).unwrap();
        form.reopen();
        let resolved = plan.resolve(&ImageNormalizer::new()).await.unwrap();

        assert_eq!(form.finish_submit(resolved, &inventory), Ok(None));
        assert!(inventory.get_items_by_collection(&user, &cid).unwrap().is_empty());
        assert!(form.is_open());
        assert!(form.name.is_empty());
    }

    #[test]
    fn test_collection_form_messages() {
        let (auth, inventory, user) = setup();
        let mut form = CollectionForm::new();
        assert_eq!(form.submit(&auth, &inventory), Err(COLLECTION_NAME_EMPTY.to_string()));

        form.name = "Shells".into();
        let id = form.submit(&auth, &inventory).unwrap();

        let collection = inventory.get_collection(&user, &id).unwrap().unwrap();
        let mut form = CollectionForm::edit(collection);
        form.name = "Sea shells".into();
        form.submit(&auth, &inventory).unwrap();
        assert_eq!(
            inventory.get_collection(&user, &id).unwrap().unwrap().name,
            "Sea shells"
        );

        let mut form = CollectionForm::edit(Collection {
            id: "missing".into(),
            ..inventory.get_collection(&user, &id).unwrap().unwrap()
        });
        assert_eq!(
            form.submit(&auth, &inventory),
            Err("Failed to update collection.".to_string())
        );
    }
}
