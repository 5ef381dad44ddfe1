//! Stories, partitioned by category.
//!
//! A story lives at `stories/<category>/<id>-<slug>.json`. Category and slug
//! can change between fetches, so the only stable handle is the id prefix;
//! lookups go through an index built by scanning every partition once.

use crate::error::Result;
use crate::kind::ResourceKind;
use crate::naming::{id_of, record_file_name, sanitize};
use crate::store::StagingStore;
use decant_gateway::models::{Story, UNCATEGORIZED};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::MutexGuard;

type StoryIndex = HashMap<u64, PathBuf>;

impl StagingStore {
    async fn story_index(&self) -> Result<MutexGuard<'_, Option<StoryIndex>>> {
        let mut guard = self.story_index.lock().await;
        if guard.is_none() {
            *guard = Some(self.scan_stories().await?);
        }
        Ok(guard)
    }

    async fn scan_stories(&self) -> Result<StoryIndex> {
        let root = ResourceKind::Stories.dir();
        let mut index = StoryIndex::new();
        for file in self.list_files(root).await? {
            // Only `stories/<category>/<file>`; the status record sits one level up.
            let in_partition = file.path.parent().and_then(Path::parent) == Some(root);
            let Some(id) = file.file_name().and_then(id_of).filter(|_| in_partition) else {
                continue;
            };
            if let Some(existing) = index.get(&id) {
                tracing::warn!(id, kept = %existing.display(), ignored = %file.path.display(), "story stored twice");
                continue;
            }
            index.insert(id, file.path);
        }
        tracing::debug!(stories = index.len(), "indexed stored stories");
        Ok(index)
    }

    /// Forget the story index; the next story operation rescans storage.
    pub async fn clear_cache(&self) {
        *self.story_index.lock().await = None;
    }

    /// Key a story is stored under.
    pub fn story_path(story: &Story) -> PathBuf {
        let partition = match sanitize(story.category()) {
            name if name.chars().all(|c| c == '.') => UNCATEGORIZED.to_string(),
            name => name,
        };
        ResourceKind::Stories.dir().join(partition).join(record_file_name(story.id, &story.slug))
    }

    /// Store a story, removing its previous file first when category or slug
    /// changed. Returns the key written.
    pub async fn write_story(&self, story: &Story) -> Result<PathBuf> {
        let path = Self::story_path(story);
        let mut guard = self.story_index().await?;
        let index = guard.get_or_insert_default();
        if let Some(previous) = index.get(&story.id).filter(|p| **p != path) {
            tracing::debug!(id = story.id, from = %previous.display(), to = %path.display(), "story moved");
            self.delete_file(previous).await?;
        }
        index.remove(&story.id);
        self.write_json(&path, story).await?;
        index.insert(story.id, path.clone());
        Ok(path)
    }

    /// Key of the stored story with this id, in whichever partition.
    pub async fn find_story(&self, id: u64) -> Result<Option<PathBuf>> {
        let guard = self.story_index().await?;
        Ok(guard.as_ref().and_then(|index| index.get(&id).cloned()))
    }

    pub async fn read_story(&self, id: u64) -> Result<Option<Story>> {
        let Some(path) = self.find_story(id).await? else {
            return Ok(None);
        };
        self.read_json(&path).await
    }

    /// Delete the stored story with this id. `false` if there was none.
    ///
    /// The id stays indexed until its file is actually gone.
    pub async fn remove_by_id(&self, id: u64) -> Result<bool> {
        let mut guard = self.story_index().await?;
        let index = guard.get_or_insert_default();
        let Some(path) = index.get(&id).cloned() else {
            return Ok(false);
        };
        let removed = self.delete_file(&path).await?;
        index.remove(&id);
        Ok(removed)
    }

    pub async fn story_ids(&self) -> Result<BTreeSet<u64>> {
        let guard = self.story_index().await?;
        Ok(guard.as_ref().map(|index| index.keys().copied().collect()).unwrap_or_default())
    }

    /// Every stored story, ordered by id.
    pub async fn stories(&self) -> Result<Vec<Story>> {
        let mut paths: Vec<(u64, PathBuf)> = {
            let guard = self.story_index().await?;
            guard.as_ref().map(|index| index.iter().map(|(id, p)| (*id, p.clone())).collect()).unwrap_or_default()
        };
        paths.sort_unstable_by_key(|(id, _)| *id);
        let mut stories = Vec::with_capacity(paths.len());
        for (_, path) in paths {
            if let Some(story) = self.read_json(&path).await? {
                stories.push(story);
            }
        }
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::StagingStore;
    use decant_gateway::models::Story;
    use decant_storage::StorageBackend;
    use decant_storage::backend::MemoryBackend;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Arc;

    fn story(id: u64, slug: &str, component: Option<&str>) -> Story {
        let content = component.map(|c| json!({"component": c, "name": "Jane Doe"}));
        serde_json::from_value(json!({"id": id, "slug": slug, "full_slug": slug, "content": content})).unwrap()
    }

    fn setup() -> (Arc<MemoryBackend>, StagingStore) {
        let backend = Arc::new(MemoryBackend::default());
        (backend.clone(), StagingStore::new(backend))
    }

    #[tokio::test]
    async fn test_partitioned_by_category() {
        let (backend, store) = setup();
        store.write_story(&story(42, "jane-doe", Some("person"))).await.unwrap();
        store.write_story(&story(9, "home", None)).await.unwrap();
        assert!(backend.exists(Path::new("stories/person/42-jane-doe.json")).await.unwrap());
        assert!(backend.exists(Path::new("stories/_uncategorized/9-home.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let (_backend, store) = setup();
        store.write_story(&story(42, "jane-doe", Some("person"))).await.unwrap();
        assert!(store.remove_by_id(42).await.unwrap());
        assert_eq!(store.find_story(42).await.unwrap(), None);
        assert_eq!(store.read_story(42).await.unwrap(), None);
        assert!(!store.remove_by_id(42).await.unwrap());
        assert!(!store.remove_by_id(999).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_story_indexed() {
        let backend = Arc::new(MemoryBackend::default().with_write_limit(1));
        let store = StagingStore::new(backend.clone());
        store.write_story(&story(42, "jane-doe", Some("person"))).await.unwrap();

        assert!(store.remove_by_id(42).await.is_err());
        assert_eq!(store.find_story(42).await.unwrap(), Some(Path::new("stories/person/42-jane-doe.json").to_path_buf()));
        assert_eq!(store.story_ids().await.unwrap(), BTreeSet::from([42]));

        backend.lift_write_limit();
        assert!(store.remove_by_id(42).await.unwrap());
        assert!(!backend.exists(Path::new("stories/person/42-jane-doe.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_moved_story_leaves_one_file() {
        let (backend, store) = setup();
        store.write_story(&story(42, "jane-doe", Some("person"))).await.unwrap();
        store.write_story(&story(42, "jane-smith", Some("author"))).await.unwrap();
        let files = backend.list(Some(Path::new("stories"))).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, Path::new("stories/author/42-jane-smith.json"));
        assert_eq!(store.read_story(42).await.unwrap().unwrap().slug, "jane-smith");
    }

    #[tokio::test]
    async fn test_index_built_from_existing_files() {
        let backend = Arc::new(MemoryBackend::with_files([
            ("stories/person/42-jane-doe.json", r#"{"id": 42, "slug": "jane-doe"}"#),
            ("stories/person/421-other.json", r#"{"id": 421, "slug": "other"}"#),
            ("stories/_uncategorized/9-home.json", r#"{"id": 9, "slug": "home"}"#),
            ("stories/_status.json", r#"{}"#),
        ]));
        let store = StagingStore::new(backend);
        assert_eq!(store.story_ids().await.unwrap(), BTreeSet::from([9, 42, 421]));
        assert_eq!(store.find_story(42).await.unwrap().unwrap(), Path::new("stories/person/42-jane-doe.json"));
        let ids: Vec<u64> = store.stories().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![9, 42, 421]);
    }

    #[tokio::test]
    async fn test_clear_cache_picks_up_external_changes() {
        let (backend, store) = setup();
        assert!(store.story_ids().await.unwrap().is_empty());
        backend.write(Path::new("stories/page/3-about.json"), br#"{"id": 3, "slug": "about"}"#).await.unwrap();
        assert!(store.story_ids().await.unwrap().is_empty());
        store.clear_cache().await;
        assert_eq!(store.story_ids().await.unwrap(), BTreeSet::from([3]));
    }

    #[tokio::test]
    async fn test_unsafe_category_sanitized() {
        let (backend, store) = setup();
        store.write_story(&story(5, "x", Some("../escape"))).await.unwrap();
        assert!(backend.exists(Path::new("stories/.._escape/5-x.json")).await.unwrap());
        store.write_story(&story(6, "y", Some(".."))).await.unwrap();
        assert!(backend.exists(Path::new("stories/_uncategorized/6-y.json")).await.unwrap());
    }
}
