use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::Retriever;
use stepflow_core::types::{RetrievedChunk, SearchRequest};

use crate::embeddings::{cosine_similarity, EmbeddingProvider, EmbeddingRegistry, InputType};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        knowledge_base TEXT NOT NULL,
        embedding_model TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_kb
        ON chunks(knowledge_base, embedding_model);";

/// A chunk as persisted in a knowledge base.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub knowledge_base: String,
    pub embedding_model: String,
    pub chunk_index: usize,
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed knowledge bases with brute-force cosine search.
///
/// Vectors are only compared against chunks embedded with the same model.
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
    embeddings: EmbeddingRegistry,
}

fn db_err(e: impl std::fmt::Display) -> StepflowError {
    StepflowError::Database(e.to_string())
}

impl KnowledgeStore {
    /// Open or create a database at the given path.
    pub fn open(path: &Path, embeddings: EmbeddingRegistry) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| db_err(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Knowledge store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            embeddings,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory(embeddings: EmbeddingRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embeddings,
        })
    }

    fn provider(&self, knowledge_base: &str, model: &str) -> Result<std::sync::Arc<dyn EmbeddingProvider>> {
        self.embeddings.get(model).ok_or_else(|| StepflowError::Retrieval {
            knowledge_base: knowledge_base.to_string(),
            message: format!("unknown embedding model '{}'", model),
        })
    }

    /// Embed and store `texts` in `knowledge_base`. Every chunk gets a copy
    /// of `metadata` plus its `chunk_index`. Returns the new chunk ids.
    pub async fn add_texts(
        &self,
        knowledge_base: &str,
        embedding_model: &str,
        texts: &[String],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.provider(knowledge_base, embedding_model)?;
        let vectors = provider.embed(texts, InputType::Document).await?;

        let mut conn = self.conn.lock().map_err(db_err)?;
        let start = next_chunk_index(&conn, knowledge_base)?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction().map_err(db_err)?;
        let mut ids = Vec::with_capacity(texts.len());

        for (offset, (text, vector)) in texts.iter().zip(&vectors).enumerate() {
            let id = uuid::Uuid::new_v4().to_string();
            let index = start + offset;
            let mut meta = metadata.clone();
            meta.insert("chunk_index".into(), index.into());

            tx.execute(
                "INSERT INTO chunks
                    (id, knowledge_base, embedding_model, chunk_index, text, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    knowledge_base,
                    embedding_model,
                    index as i64,
                    text,
                    serde_json::Value::Object(meta).to_string(),
                    encode_vector(vector),
                    now,
                ],
            )
            .map_err(db_err)?;
            ids.push(id);
        }
        tx.commit().map_err(db_err)?;

        info!(knowledge_base, embedding_model, chunks = ids.len(), "Stored chunks");
        Ok(ids)
    }

    /// Chunks of `knowledge_base` ranked by similarity to `query`, best
    /// first, at most `top_k`. An empty knowledge base yields an empty vec.
    pub async fn search(
        &self,
        knowledge_base: &str,
        embedding_model: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let provider = self.provider(knowledge_base, embedding_model)?;
        if self.count(knowledge_base)? == 0 || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = provider
            .embed(&[query.to_string()], InputType::Query)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT text, metadata, embedding FROM chunks
                 WHERE knowledge_base = ?1 AND embedding_model = ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![knowledge_base, embedding_model], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(db_err)?;

        let mut scored = Vec::new();
        for row in rows {
            let (text, metadata, blob) = row.map_err(db_err)?;
            let score = cosine_similarity(&query_vec, &decode_vector(&blob));
            let mut chunk = RetrievedChunk::new(text).with_score(score);
            chunk.metadata = parse_metadata(&metadata);
            scored.push(chunk);
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn count(&self, knowledge_base: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE knowledge_base = ?1",
                params![knowledge_base],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n as usize)
    }

    /// All chunks of a knowledge base in insertion order.
    pub fn chunks(&self, knowledge_base: &str) -> Result<Vec<StoredChunk>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, knowledge_base, embedding_model, chunk_index, text, metadata, created_at
                 FROM chunks WHERE knowledge_base = ?1 ORDER BY chunk_index",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![knowledge_base], |row| {
                let created: String = row.get(6)?;
                Ok(StoredChunk {
                    id: row.get(0)?,
                    knowledge_base: row.get(1)?,
                    embedding_model: row.get(2)?,
                    chunk_index: row.get::<_, i64>(3)? as usize,
                    text: row.get(4)?,
                    metadata: parse_metadata(&row.get::<_, String>(5)?),
                    created_at: DateTime::parse_from_rfc3339(&created)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(db_err)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)
    }

    /// Returns whether a chunk was removed.
    pub fn delete_chunk(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute("DELETE FROM chunks WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(n > 0)
    }

    /// Drop every chunk of a knowledge base; returns how many were removed.
    pub fn delete_knowledge_base(&self, knowledge_base: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute(
                "DELETE FROM chunks WHERE knowledge_base = ?1",
                params![knowledge_base],
            )
            .map_err(db_err)?;
        info!(knowledge_base, removed = n, "Deleted knowledge base");
        Ok(n)
    }

    /// `(knowledge_base, chunk_count)` pairs, sorted by name.
    pub fn list_knowledge_bases(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT knowledge_base, COUNT(*) FROM chunks
                 GROUP BY knowledge_base ORDER BY knowledge_base",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .map_err(db_err)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)
    }
}

fn next_chunk_index(conn: &Connection, knowledge_base: &str) -> Result<usize> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(chunk_index) FROM chunks WHERE knowledge_base = ?1",
            params![knowledge_base],
            |row| row.get(0),
        )
        .map_err(db_err)?;
    Ok(max.map_or(0, |m| m as usize + 1))
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_metadata(raw: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

impl Retriever for KnowledgeStore {
    fn search_similar(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<RetrievedChunk>>> {
        Box::pin(async move {
            self.search(
                &request.knowledge_base_id,
                &request.embedding_model,
                &request.query,
                request.top_k,
            )
            .await
            .map_err(|e| match e {
                StepflowError::Retrieval { .. } => e,
                other => StepflowError::Retrieval {
                    knowledge_base: request.knowledge_base_id.clone(),
                    message: other.to_string(),
                },
            })
        })
    }
}
