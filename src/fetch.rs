use std::collections::BTreeMap;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, CacheStore};
use crate::models::{Note, NoteEdit};
use crate::openreview::{ApiError, ReviewSource};
use crate::venue::Venue;

const FLUSH_EVERY: usize = 25;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub async fn fetch_submissions<S>(
    source: &S,
    cache: &CacheStore,
    venue: &Venue,
) -> anyhow::Result<Vec<Note>>
where
    S: ReviewSource + ?Sized,
{
    let key = venue.cache_key("submissions");
    if let Some(notes) = cache.load::<Vec<Note>>(&key)? {
        info!("Loaded {} submissions from cache ({key})", notes.len());
        return Ok(notes);
    }

    let invitation = venue.submission_invitation();
    info!("Fetching submissions for {invitation}");
    let notes = source
        .submissions(&invitation)
        .await
        .with_context(|| format!("failed to fetch submissions for {invitation}"))?;
    cache.save(&key, &notes)?;
    info!("Fetched and cached {} submissions", notes.len());
    Ok(notes)
}

/// Map of id to blob persisted as a single cache entry. Loaded once per run
/// and written back every few insertions and on `flush`.
pub struct KeyedBlob<T> {
    key: String,
    entries: BTreeMap<String, T>,
    pending: usize,
}

impl<T: Serialize + DeserializeOwned> KeyedBlob<T> {
    pub fn load(cache: &CacheStore, key: String) -> Result<Self, CacheError> {
        let entries: BTreeMap<String, T> = cache.load(&key)?.unwrap_or_default();
        Ok(Self {
            key,
            entries,
            pending: 0,
        })
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, cache: &CacheStore, id: &str, value: T) -> Result<(), CacheError> {
        self.entries.insert(id.to_string(), value);
        self.pending += 1;
        if self.pending >= FLUSH_EVERY {
            self.flush(cache)?;
        }
        Ok(())
    }

    pub fn flush(&mut self, cache: &CacheStore) -> Result<(), CacheError> {
        if self.pending == 0 {
            return Ok(());
        }
        cache.save(&self.key, &self.entries)?;
        debug!(key = %self.key, entries = self.entries.len(), "flushed");
        self.pending = 0;
        Ok(())
    }
}

pub struct ThreadFetcher<'a, S: ?Sized> {
    source: &'a S,
    cache: &'a CacheStore,
    threads: KeyedBlob<Vec<Note>>,
    edits: KeyedBlob<Vec<NoteEdit>>,
}

impl<'a, S> ThreadFetcher<'a, S>
where
    S: ReviewSource + ?Sized,
{
    pub fn open(source: &'a S, cache: &'a CacheStore, venue: &Venue) -> Result<Self, CacheError> {
        let threads = KeyedBlob::load(cache, venue.cache_key("reviews_cache"))?;
        let edits = KeyedBlob::load(cache, venue.cache_key("edits_cache"))?;
        debug!(
            threads = threads.len(),
            edits = edits.len(),
            "thread cache loaded"
        );
        Ok(Self {
            source,
            cache,
            threads,
            edits,
        })
    }

    pub async fn thread(&mut self, forum_id: &str) -> Result<Vec<Note>, FetchError> {
        if let Some(notes) = self.threads.get(forum_id) {
            return Ok(notes.clone());
        }
        let notes = self.source.forum_notes(forum_id).await?;
        self.threads.insert(self.cache, forum_id, notes.clone())?;
        Ok(notes)
    }

    pub async fn edits(&mut self, note_id: &str) -> Result<Vec<NoteEdit>, FetchError> {
        if let Some(edits) = self.edits.get(note_id) {
            return Ok(edits.clone());
        }
        let edits = self.source.note_edits(note_id).await?;
        self.edits.insert(self.cache, note_id, edits.clone())?;
        Ok(edits)
    }

    pub fn flush(&mut self) -> Result<(), CacheError> {
        self.threads.flush(self.cache)?;
        self.edits.flush(self.cache)
    }
}
