//! In-memory vector store with brute-force cosine search
//!
//! Each collection lives only as long as the request that created it.
//! When snapshots are enabled, every insert also writes the collection to
//! `<storage_path>/<name>.json`; only the newest `max_snapshots` are kept.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::vector_store::{VectorCollection, VectorSearchResult, VectorStoreProvider};

/// Snapshots kept on disk unless configured otherwise
pub const DEFAULT_MAX_SNAPSHOTS: usize = 20;

/// In-memory vector store
pub struct MemoryVectorStore {
    storage_path: PathBuf,
    persist: bool,
    max_snapshots: usize,
}

impl MemoryVectorStore {
    /// Create a store rooted at `storage_path`, creating the directory if needed
    pub fn new(storage_path: &Path, persist: bool) -> Result<Self> {
        std::fs::create_dir_all(storage_path).map_err(|e| {
            Error::vector_db(format!(
                "Failed to create storage directory {}: {}",
                storage_path.display(),
                e
            ))
        })?;

        Ok(Self {
            storage_path: storage_path.to_path_buf(),
            persist,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        })
    }

    /// Limit the number of snapshot files kept in the storage directory
    pub fn with_max_snapshots(mut self, max_snapshots: usize) -> Self {
        self.max_snapshots = max_snapshots.max(1);
        self
    }
}

/// Delete the oldest `*.json` snapshots so that at most `keep` remain
fn prune_snapshots(dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut snapshots = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let modified = std::fs::metadata(&path)?.modified()?;
            snapshots.push((modified, path));
        }
    }

    if snapshots.len() <= keep {
        return Ok(0);
    }

    snapshots.sort();
    let excess = snapshots.len() - keep;
    for (_, path) in &snapshots[..excess] {
        std::fs::remove_file(path)?;
    }
    Ok(excess)
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStore {
    async fn create_collection(&self, name: &str) -> Result<Arc<dyn VectorCollection>> {
        let snapshot_path = self
            .persist
            .then(|| self.storage_path.join(format!("{}.json", name)));

        if self.persist {
            // Leave room for this collection's snapshot
            let dir = self.storage_path.clone();
            let keep = self.max_snapshots - 1;
            let removed = tokio::task::spawn_blocking(move || prune_snapshots(&dir, keep))
                .await?
                .map_err(|e| Error::vector_db(format!("Failed to prune snapshots: {}", e)))?;
            if removed > 0 {
                tracing::debug!("Pruned {} old snapshots", removed);
            }
        }

        tracing::debug!("Created collection {}", name);

        Ok(Arc::new(MemoryCollection {
            name: name.to_string(),
            inner: Arc::new(RwLock::new(CollectionData::default())),
            snapshot_path,
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.storage_path.is_dir())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Default)]
struct CollectionData {
    chunks: Vec<Chunk>,
    norms: Vec<f32>,
    dimensions: Option<usize>,
}

/// One in-memory collection
pub struct MemoryCollection {
    name: String,
    inner: Arc<RwLock<CollectionData>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryCollection {
    async fn write_snapshot(&self, path: PathBuf) -> Result<()> {
        let json = {
            let data = self.inner.read();
            serde_json::to_vec(&data.chunks)?
        };

        tokio::task::spawn_blocking(move || std::fs::write(&path, json))
            .await?
            .map_err(|e| Error::vector_db(format!("Failed to write snapshot: {}", e)))
    }
}

#[async_trait]
impl VectorCollection for MemoryCollection {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        {
            let mut data = self.inner.write();
            let expected = data
                .dimensions
                .or_else(|| chunks.first().map(|c| c.embedding.len()));

            for chunk in chunks {
                if !chunk.is_embedded() {
                    return Err(Error::vector_db(format!(
                        "Chunk {} has no embedding",
                        chunk.index
                    )));
                }

                let dims = expected.unwrap_or(chunk.embedding.len());
                if chunk.embedding.len() != dims {
                    return Err(Error::vector_db(format!(
                        "Dimension mismatch: expected {}, got {}",
                        dims,
                        chunk.embedding.len()
                    )));
                }
            }

            data.dimensions = expected;
            for chunk in chunks {
                data.norms.push(l2_norm(&chunk.embedding));
                data.chunks.push(chunk.clone());
            }
        }

        if let Some(path) = &self.snapshot_path {
            self.write_snapshot(path.clone()).await?;
        }

        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        let data = self.inner.read();

        if let Some(dims) = data.dimensions {
            if query_embedding.len() != dims {
                return Err(Error::vector_db(format!(
                    "Query dimension mismatch: expected {}, got {}",
                    dims,
                    query_embedding.len()
                )));
            }
        }

        let query_norm = l2_norm(query_embedding);
        let mut scored: Vec<(usize, f32)> = data
            .chunks
            .iter()
            .zip(&data.norms)
            .enumerate()
            .map(|(i, (chunk, norm))| {
                (i, cosine_similarity(query_embedding, &chunk.embedding, query_norm, *norm))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, similarity)| VectorSearchResult {
                chunk: data.chunks[i].clone(),
                similarity,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().chunks.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkSource;

    fn chunk(index: u32, content: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(index, content.to_string(), ChunkSource::default());
        chunk.embedding = embedding;
        chunk
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new(dir.path(), false).unwrap();
        let collection = store.create_collection("test").await.unwrap();

        collection
            .insert_chunks(&[
                chunk(0, "x axis", vec![1.0, 0.0]),
                chunk(1, "y axis", vec![0.0, 1.0]),
                chunk(2, "diagonal", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = collection.search(&[0.9, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "x axis");
        assert_eq!(results[1].chunk.content, "diagonal");
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new(dir.path(), false).unwrap();
        let a = store.create_collection("a").await.unwrap();
        let b = store.create_collection("b").await.unwrap();

        a.insert_chunks(&[chunk(0, "only in a", vec![1.0])]).await.unwrap();

        assert_eq!(a.len().await.unwrap(), 1);
        assert_eq!(b.len().await.unwrap(), 0);
        assert!(b.search(&[1.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unembedded_and_mismatched() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new(dir.path(), false).unwrap();
        let collection = store.create_collection("c").await.unwrap();

        let err = collection
            .insert_chunks(&[chunk(0, "empty", vec![])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VectorDb(_)));

        collection.insert_chunks(&[chunk(0, "ok", vec![1.0, 0.0])]).await.unwrap();
        assert!(collection
            .insert_chunks(&[chunk(1, "bad", vec![1.0, 0.0, 0.0])])
            .await
            .is_err());
        assert!(collection.search(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new(dir.path(), true).unwrap();
        let collection = store.create_collection("snap").await.unwrap();
        collection.insert_chunks(&[chunk(0, "saved", vec![0.5, 0.5])]).await.unwrap();

        let saved: Vec<Chunk> =
            serde_json::from_slice(&std::fs::read(dir.path().join("snap.json")).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].content, "saved");
    }

    #[tokio::test]
    async fn test_old_snapshots_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new(dir.path(), true)
            .unwrap()
            .with_max_snapshots(2);

        for name in ["first", "second", "third"] {
            let collection = store.create_collection(name).await.unwrap();
            collection.insert_chunks(&[chunk(0, name, vec![1.0])]).await.unwrap();
        }

        let remaining = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(remaining, 2);
        assert!(dir.path().join("third.json").exists());
    }

    #[tokio::test]
    async fn test_creates_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/vectors");
        let store = MemoryVectorStore::new(&path, false).unwrap();
        assert!(path.is_dir());
        assert!(store.health_check().await.unwrap());
    }
}
