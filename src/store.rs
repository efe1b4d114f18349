//! Local stores: one JSON array file per collection.
//!
//! Every operation reads the whole collection, changes it, and writes it
//! back atomically (temp file + rename), so a crash mid-write leaves the
//! previous file intact. A missing file is an empty store; a file that
//! does not parse is reported as [`PitchforgeError::StoreCorrupt`] and is
//! never overwritten.
//!
//! Investors live in a sibling file next to the documents
//! (`<stem>.investors.json`). Deleting a document deletes the investors
//! it was pitched to.
//!
//! There is no cross-process locking. Two writers racing on the same file
//! resolve as last-writer-wins.

use crate::config::ImageConfig;
use crate::document::Document;
use crate::error::PitchforgeError;
use crate::investor::Investor;
use crate::pipeline::images::{enhance_images, HttpImageClient, ImageClient, ImagePassReport};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default store file name, relative to the working directory.
pub const DEFAULT_STORE_FILE: &str = "pitchforge-documents.json";

/// Handle to a store file. Cheap to clone; holds no open file.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    /// Point at `path`. Nothing is read until the first operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The investor store kept beside this document store.
    pub fn investors(&self) -> InvestorStore {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pitchforge".to_string());
        InvestorStore::open(self.path.with_file_name(format!("{stem}.investors.json")))
    }

    /// All documents, newest first.
    pub async fn list(&self) -> Result<Vec<Document>, PitchforgeError> {
        let mut docs = self.load().await?;
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    /// Look up by full id or by a unique id prefix.
    pub async fn get(&self, id: &str) -> Result<Document, PitchforgeError> {
        let docs = self.load().await?;
        let index = find_index(&docs, id, |d| d.id.as_str())
            .ok_or_else(|| PitchforgeError::DocumentNotFound { id: id.to_string() })?;
        Ok(docs[index].clone())
    }

    /// Insert, or replace the document with the same id.
    pub async fn save(&self, doc: &Document) -> Result<(), PitchforgeError> {
        let mut docs = self.load().await?;
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        self.persist(&docs).await?;
        info!("Saved document {} ({})", doc.id, doc.title);
        Ok(())
    }

    /// Save `doc`, then run the image pass over it and save it again.
    ///
    /// The text document is stored before the first image call. When no
    /// image client can be built the pass is skipped with a warning and
    /// `None` is returned.
    pub async fn save_with_images(
        &self,
        doc: &mut Document,
        config: &ImageConfig,
    ) -> Result<Option<ImagePassReport>, PitchforgeError> {
        self.save(doc).await?;
        let client = match HttpImageClient::from_config(config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Skipping image pass for {}: {}", doc.id, e);
                return Ok(None);
            }
        };
        self.illustrate(doc, &client, config).await.map(Some)
    }

    /// Run the image pass over `doc` and save the result.
    pub async fn illustrate(
        &self,
        doc: &mut Document,
        client: &dyn ImageClient,
        config: &ImageConfig,
    ) -> Result<ImagePassReport, PitchforgeError> {
        let report = enhance_images(doc, client, config).await;
        self.save(doc).await?;
        Ok(report)
    }

    /// Remove a document, and every investor it was pitched to, and return it.
    pub async fn delete(&self, id: &str) -> Result<Document, PitchforgeError> {
        let mut docs = self.load().await?;
        let index = find_index(&docs, id, |d| d.id.as_str())
            .ok_or_else(|| PitchforgeError::DocumentNotFound { id: id.to_string() })?;
        let removed = docs.remove(index);
        self.persist(&docs).await?;
        let investors = self.investors().delete_for_deck(&removed.id).await?;
        info!("Deleted document {} ({} investors)", removed.id, investors);
        Ok(removed)
    }

    /// Move the view cursor (clamped to the document's sections).
    pub async fn set_current_index(&self, id: &str, index: usize) -> Result<Document, PitchforgeError> {
        self.update(id, |doc| {
            doc.set_current_index(index);
            Ok(())
        })
        .await
    }

    /// Stamp completion metadata with the current time.
    pub async fn mark_completed(&self, id: &str) -> Result<Document, PitchforgeError> {
        self.update(id, |doc| {
            doc.mark_completed(Utc::now());
            Ok(())
        })
        .await
    }

    /// Attach an image to the section at `index` (0-based).
    pub async fn attach_image(
        &self,
        id: &str,
        index: usize,
        url: &str,
        prompt: Option<String>,
    ) -> Result<Document, PitchforgeError> {
        self.update(id, |doc| doc.attach_image(index, url, prompt)).await
    }

    async fn update<F>(&self, id: &str, change: F) -> Result<Document, PitchforgeError>
    where
        F: FnOnce(&mut Document) -> Result<(), PitchforgeError>,
    {
        let mut docs = self.load().await?;
        let index = find_index(&docs, id, |d| d.id.as_str())
            .ok_or_else(|| PitchforgeError::DocumentNotFound { id: id.to_string() })?;
        change(&mut docs[index])?;
        let updated = docs[index].clone();
        self.persist(&docs).await?;
        Ok(updated)
    }

    async fn load(&self) -> Result<Vec<Document>, PitchforgeError> {
        load_collection(&self.path).await
    }

    async fn persist(&self, docs: &[Document]) -> Result<(), PitchforgeError> {
        persist_collection(&self.path, docs).await
    }
}

/// Handle to an investor store file.
#[derive(Debug, Clone)]
pub struct InvestorStore {
    path: PathBuf,
}

impl InvestorStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Investors, newest first; only those pitched `deck_id` when given.
    pub async fn list(&self, deck_id: Option<&str>) -> Result<Vec<Investor>, PitchforgeError> {
        let mut investors: Vec<Investor> = load_collection(&self.path).await?;
        if let Some(deck) = deck_id {
            investors.retain(|i| i.pitched_deck_id == deck);
        }
        investors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(investors)
    }

    /// Look up by full id or by a unique id prefix.
    pub async fn get(&self, id: &str) -> Result<Investor, PitchforgeError> {
        let investors: Vec<Investor> = load_collection(&self.path).await?;
        let index = find_index(&investors, id, |i| i.id.as_str())
            .ok_or_else(|| PitchforgeError::InvestorNotFound { id: id.to_string() })?;
        Ok(investors[index].clone())
    }

    /// Insert, or replace the investor with the same id.
    ///
    /// `updated_at` is stamped now; a replaced record keeps its original
    /// `created_at`.
    pub async fn upsert(&self, investor: &Investor) -> Result<Investor, PitchforgeError> {
        let mut investors: Vec<Investor> = load_collection(&self.path).await?;
        let mut saved = investor.clone();
        saved.updated_at = Utc::now();
        match investors.iter_mut().find(|i| i.id == investor.id) {
            Some(existing) => {
                saved.created_at = existing.created_at;
                *existing = saved.clone();
            }
            None => investors.push(saved.clone()),
        }
        persist_collection(&self.path, &investors).await?;
        info!("Saved investor {} ({}, {})", saved.id, saved.name, saved.status);
        Ok(saved)
    }

    /// Remove an investor and return it.
    pub async fn delete(&self, id: &str) -> Result<Investor, PitchforgeError> {
        let mut investors: Vec<Investor> = load_collection(&self.path).await?;
        let index = find_index(&investors, id, |i| i.id.as_str())
            .ok_or_else(|| PitchforgeError::InvestorNotFound { id: id.to_string() })?;
        let removed = investors.remove(index);
        persist_collection(&self.path, &investors).await?;
        info!("Deleted investor {}", removed.id);
        Ok(removed)
    }

    /// Remove every investor pitched `deck_id`; returns how many went.
    ///
    /// Leaves the file untouched when nothing matches.
    pub async fn delete_for_deck(&self, deck_id: &str) -> Result<usize, PitchforgeError> {
        let mut investors: Vec<Investor> = load_collection(&self.path).await?;
        let before = investors.len();
        investors.retain(|i| i.pitched_deck_id != deck_id);
        let removed = before - investors.len();
        if removed > 0 {
            persist_collection(&self.path, &investors).await?;
        }
        Ok(removed)
    }
}

/// Exact id match first, then a unique non-empty prefix.
fn find_index<T>(items: &[T], id: &str, key: impl Fn(&T) -> &str) -> Option<usize> {
    if let Some(i) = items.iter().position(|item| key(item) == id) {
        return Some(i);
    }
    if id.is_empty() {
        return None;
    }
    let mut matches = items
        .iter()
        .enumerate()
        .filter(|(_, item)| key(item).starts_with(id));
    match (matches.next(), matches.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}

async fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PitchforgeError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Store {} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(PitchforgeError::StoreReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| PitchforgeError::StoreCorrupt {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

async fn persist_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<(), PitchforgeError> {
    let json = serde_json::to_vec_pretty(items)
        .map_err(|e| PitchforgeError::Internal(format!("serialise store: {e}")))?;
    write_atomic(path, &json)
        .await
        .map_err(|source| PitchforgeError::StoreWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Store {} written: {} records", path.display(), items.len());
    Ok(())
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
///
/// The temp file is removed again if either step fails.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            debug!("Could not remove {}: {}", tmp.display(), e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::document::SectionKind;
    use crate::error::ImageError;
    use crate::investor::InvestorStatus;
    use async_trait::async_trait;
    use chrono::Duration;

    fn doc(offset_secs: i64) -> Document {
        let at = Utc::now() + Duration::seconds(offset_secs);
        Document::assemble(
            &sample_request(),
            vec![
                section(1, SectionKind::Title, "a"),
                section(2, SectionKind::Problem, "b"),
                section(3, SectionKind::Solution, "c"),
            ],
            at,
            at,
        )
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("none.json"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_trip_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("nested/docs.json"));
        let old = doc(-60);
        let new = doc(0);
        store.save(&old).await.unwrap();
        store.save(&new).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, new.id);
        assert_eq!(store.get(&old.id).await.unwrap(), old);
    }

    #[tokio::test]
    async fn save_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let mut d = doc(0);
        store.save(&d).await.unwrap();
        d.title = "Renamed".into();
        store.save(&d).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Renamed");
    }

    #[tokio::test]
    async fn cursor_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let d = doc(0);
        store.save(&d).await.unwrap();
        let moved = store.set_current_index(&d.id, 99).await.unwrap();
        assert_eq!(moved.current_section_index, 2);
        assert_eq!(store.get(&d.id).await.unwrap().current_section_index, 2);
    }

    #[tokio::test]
    async fn attach_image_and_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let d = doc(0);
        store.save(&d).await.unwrap();

        let updated = store
            .attach_image(&d.id, 1, "https://img/1.png", Some("prompt".into()))
            .await
            .unwrap();
        assert_eq!(updated.sections[1].image_url.as_deref(), Some("https://img/1.png"));

        let err = store.attach_image(&d.id, 7, "x", None).await.unwrap_err();
        assert!(matches!(err, PitchforgeError::InvalidSectionIndex { index: 7, total: 3 }));
    }

    #[tokio::test]
    async fn prefix_lookup_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let d = doc(0);
        store.save(&d).await.unwrap();

        assert_eq!(store.get(&d.id[..8]).await.unwrap().id, d.id);
        store.delete(&d.id[..8]).await.unwrap();
        assert!(matches!(
            store.get(&d.id).await,
            Err(PitchforgeError::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let store = DocumentStore::open(&path);

        assert!(matches!(store.list().await, Err(PitchforgeError::StoreCorrupt { .. })));
        assert!(store.save(&doc(0)).await.is_err());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn mark_completed_stamps_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let mut d = doc(0);
        d.is_completed = false;
        d.completed_at = None;
        store.save(&d).await.unwrap();
        let done = store.mark_completed(&d.id).await.unwrap();
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());
    }

    struct FixedImages(Option<&'static str>);

    #[async_trait]
    impl ImageClient for FixedImages {
        async fn generate(&self, _prompt: &str) -> Result<String, ImageError> {
            self.0.map(str::to_string).ok_or(ImageError::EmptyResponse)
        }
    }

    fn quick_images() -> ImageConfig {
        ImageConfig {
            image_delay_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn document_is_saved_when_image_client_cannot_be_built() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let mut d = doc(0);
        let config = ImageConfig {
            api_key: Some(String::new()),
            ..quick_images()
        };

        let report = store.save_with_images(&mut d, &config).await.unwrap();
        assert!(report.is_none());
        let stored = store.get(&d.id).await.unwrap();
        assert_eq!(stored.sections.len(), 3);
        assert_eq!(stored.image_count(), 0);
    }

    #[tokio::test]
    async fn illustrate_saves_whatever_the_pass_produced() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));

        let mut failed = doc(0);
        store.save(&failed).await.unwrap();
        let report = store
            .illustrate(&mut failed, &FixedImages(None), &quick_images())
            .await
            .unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(store.get(&failed.id).await.unwrap().image_count(), 0);

        let mut ok = doc(1);
        let report = store
            .illustrate(&mut ok, &FixedImages(Some("https://img/a.png")), &quick_images())
            .await
            .unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(store.get(&ok.id).await.unwrap().image_count(), 3);
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(write_atomic(&path, b"[]").await.is_err());
        assert!(!dir.path().join("docs.json.tmp").exists());
    }

    // ── Investors ────────────────────────────────────────────────────────

    #[test]
    fn investor_file_sits_beside_documents() {
        let store = DocumentStore::open("/data/decks.json");
        assert_eq!(
            store.investors().path(),
            Path::new("/data/decks.investors.json")
        );
    }

    #[tokio::test]
    async fn investors_filter_by_deck_and_update_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let investors = DocumentStore::open(dir.path().join("docs.json")).investors();

        let early = Utc::now() - Duration::seconds(30);
        let a = Investor::new("Dana", "deck-a", early);
        let b = Investor::new("Lee", "deck-b", Utc::now());
        investors.upsert(&a).await.unwrap();
        investors.upsert(&b).await.unwrap();

        let all = investors.list(None).await.unwrap();
        assert_eq!(all.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["Lee", "Dana"]);
        let only_a = investors.list(Some("deck-a")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, a.id);

        let mut changed = investors.get(&a.id[..8]).await.unwrap();
        changed.status = InvestorStatus::Interested;
        changed.notes = Some("Wants a follow-up call".into());
        changed.created_at = Utc::now();
        let saved = investors.upsert(&changed).await.unwrap();
        assert_eq!(saved.created_at, a.created_at);
        assert!(saved.updated_at >= a.updated_at);

        let reloaded = investors.get(&a.id).await.unwrap();
        assert_eq!(reloaded.status, InvestorStatus::Interested);
        assert_eq!(investors.list(None).await.unwrap().len(), 2);

        investors.delete(&b.id).await.unwrap();
        assert!(matches!(
            investors.get(&b.id).await,
            Err(PitchforgeError::InvestorNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_a_document_deletes_its_investors() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.json"));
        let investors = store.investors();
        let kept = doc(0);
        let gone = doc(1);
        store.save(&kept).await.unwrap();
        store.save(&gone).await.unwrap();
        investors.upsert(&Investor::new("A", &kept.id, Utc::now())).await.unwrap();
        investors.upsert(&Investor::new("B", &gone.id, Utc::now())).await.unwrap();
        investors.upsert(&Investor::new("C", &gone.id, Utc::now())).await.unwrap();

        store.delete(&gone.id).await.unwrap();

        let left = investors.list(None).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].pitched_deck_id, kept.id);
        assert_eq!(investors.delete_for_deck("nothing").await.unwrap(), 0);
    }
}
