//! Chunked upload session management.
//!
//! Tracks in-flight uploads with automatic reclamation of idle sessions.
//! Each session owns a private temp file that chunks are written into at
//! arbitrary offsets; finalize requires full byte coverage, then runs the
//! validate / harden / transcode pipeline and persists the Image row.
//!
//! All mutation of a single session happens under its own mutex, so chunk
//! writes serialize against the finalize coverage check and two finalize
//! calls cannot both observe `Accumulating`.

use std::collections::HashSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use stillbox_common::{Error, ImageId, ImageKind, Result, SessionToken};
use stillbox_db::models::Image;
use stillbox_db::pool::DbPool;
use stillbox_db::queries::images;

use super::harden::secure_file;
use super::paths::StoragePaths;
use super::sanitize::sanitize_filename;
use super::transcode;
use super::validate::{check_size, validate};

/// Upload session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting chunks.
    Accumulating,
    /// Finalize in progress; no further chunks.
    Finalizing,
    Complete,
    Failed,
}

/// One in-flight chunked upload.
#[derive(Debug)]
pub struct UploadSession {
    pub token: SessionToken,
    pub owner_user_id: i64,
    pub declared_mime: String,
    /// Sanitized at init; kept for the Image row's original_filename.
    pub declared_filename: String,
    pub declared_total_size: u64,
    pub image_kind: ImageKind,
    pub temp_path: PathBuf,
    /// Sorted, merged half-open byte ranges received so far.
    ranges: Vec<(u64, u64)>,
    pub state: SessionState,
    pub last_activity: DateTime<Utc>,
}

impl UploadSession {
    /// Total bytes covered by received ranges.
    pub fn received_bytes(&self) -> u64 {
        self.ranges.iter().map(|(s, e)| e - s).sum()
    }

    /// Whether the received ranges cover `[0, declared_total_size)` exactly.
    pub fn is_complete(&self) -> bool {
        self.ranges == [(0, self.declared_total_size)]
    }

    fn add_range(&mut self, start: u64, end: u64) {
        self.ranges.push((start, end));
        self.ranges.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.ranges.len());
        for &(s, e) in &self.ranges {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.ranges = merged;
    }
}

/// Result of a successful finalize or single-shot ingest.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedUpload {
    pub id: ImageId,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    pub file_size: u64,
}

/// Thread-safe manager for all in-flight upload sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<SessionToken, Arc<Mutex<UploadSession>>>>,
    db: DbPool,
    paths: StoragePaths,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, paths: StoragePaths, idle_timeout_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            db,
            paths,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        }
    }

    /// Start a new chunked upload.
    ///
    /// Validates the declared size against the ceiling before a token is
    /// issued, sanitizes the filename, and creates the private temp file.
    pub fn init(
        &self,
        user_id: i64,
        filename: &str,
        declared_mime: &str,
        declared_size: u64,
        image_kind: ImageKind,
    ) -> Result<SessionToken> {
        if user_id <= 0 {
            return Err(Error::validation("User ID must be a positive integer"));
        }
        if declared_size == 0 {
            return Err(Error::validation("Declared size must be greater than zero"));
        }
        check_size(declared_size)?;

        let token = SessionToken::new();
        let temp_path = self.paths.session_temp_path(token);
        std::fs::File::create(&temp_path)?;

        let session = UploadSession {
            token,
            owner_user_id: user_id,
            declared_mime: declared_mime.to_string(),
            declared_filename: sanitize_filename(filename),
            declared_total_size: declared_size,
            image_kind,
            temp_path,
            ranges: Vec::new(),
            state: SessionState::Accumulating,
            last_activity: Utc::now(),
        };

        self.sessions.insert(token, Arc::new(Mutex::new(session)));
        tracing::info!(
            token = %token,
            user_id = user_id,
            declared_size = declared_size,
            kind = %image_kind,
            "Upload session started"
        );

        Ok(token)
    }

    fn get(&self, token: SessionToken) -> Result<Arc<Mutex<UploadSession>>> {
        self.sessions
            .get(&token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::session("Unknown or expired session token"))
    }

    /// Write one chunk at the given offset.
    ///
    /// Returns total bytes received so far. Fails with a Session error for
    /// unknown/foreign tokens, sessions past `Accumulating`, or writes that
    /// would exceed the declared size.
    pub fn accept_chunk(
        &self,
        token: SessionToken,
        user_id: i64,
        offset: u64,
        bytes: &[u8],
    ) -> Result<u64> {
        let session = self.get(token)?;
        let mut session = session.lock();

        if session.owner_user_id != user_id {
            return Err(Error::session("Session does not belong to this user"));
        }
        if session.state != SessionState::Accumulating {
            return Err(Error::session("Session is no longer accepting chunks"));
        }
        if bytes.is_empty() {
            return Err(Error::validation("Chunk data cannot be empty"));
        }

        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| Error::session("Chunk offset overflow"))?;
        if end > session.declared_total_size {
            return Err(Error::session("Chunk would exceed the declared upload size"));
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(&session.temp_path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;

        session.add_range(offset, end);
        session.last_activity = Utc::now();

        tracing::debug!(
            token = %token,
            offset = offset,
            len = bytes.len(),
            received = session.received_bytes(),
            "Chunk accepted"
        );

        Ok(session.received_bytes())
    }

    /// Finalize an upload: validate, harden, transcode, persist.
    ///
    /// All-or-nothing: on any failure the temp file is removed, no Image
    /// row exists, and the session is gone. At most one finalize can
    /// succeed for a given token.
    pub fn finalize(&self, token: SessionToken, user_id: i64, raw: bool) -> Result<CompletedUpload> {
        let session = self.get(token)?;
        let mut session = session.lock();

        if session.owner_user_id != user_id {
            return Err(Error::session("Session does not belong to this user"));
        }
        if session.state != SessionState::Accumulating {
            return Err(Error::session("Session was already finalized"));
        }
        if !session.is_complete() {
            return Err(Error::session(format!(
                "Upload incomplete: {} of {} bytes received",
                session.received_bytes(),
                session.declared_total_size
            )));
        }

        session.state = SessionState::Finalizing;

        let result = self.finalize_inner(&session, raw);

        // Success or failure, the temp file and the registry entry go away.
        if let Err(e) = std::fs::remove_file(&session.temp_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(token = %token, error = %e, "Failed to remove temp file");
            }
        }
        session.state = match result {
            Ok(_) => SessionState::Complete,
            Err(_) => SessionState::Failed,
        };
        drop(session);
        self.sessions.remove(&token);

        match &result {
            Ok(done) => {
                tracing::info!(token = %token, id = %done.id, size = done.file_size, "Upload finalized");
            }
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "Upload finalize failed");
            }
        }

        result
    }

    fn finalize_inner(&self, session: &UploadSession, raw: bool) -> Result<CompletedUpload> {
        secure_file(&session.temp_path)?;
        let bytes = std::fs::read(&session.temp_path)?;

        self.store_validated(
            session.owner_user_id,
            &session.declared_filename,
            &session.declared_mime,
            session.image_kind,
            &bytes,
            raw,
        )
    }

    /// Single-shot ingest for inline (base64-supplied) media.
    ///
    /// Bypasses the chunk protocol but runs the identical validation,
    /// hardening, and transcoding pipeline.
    pub fn ingest(
        &self,
        user_id: i64,
        filename: &str,
        declared_mime: &str,
        image_kind: ImageKind,
        bytes: &[u8],
        raw: bool,
    ) -> Result<CompletedUpload> {
        if user_id <= 0 {
            return Err(Error::validation("User ID must be a positive integer"));
        }
        self.store_validated(
            user_id,
            &sanitize_filename(filename),
            declared_mime,
            image_kind,
            bytes,
            raw,
        )
    }

    /// The shared back half of the pipeline: validate bytes, transcode or
    /// pass through, write the final file, harden it, insert the row.
    fn store_validated(
        &self,
        user_id: i64,
        original_filename: &str,
        declared_mime: &str,
        image_kind: ImageKind,
        bytes: &[u8],
        raw: bool,
    ) -> Result<CompletedUpload> {
        let validated = validate(bytes, declared_mime)?;

        let output = if raw {
            transcode::raw(bytes, &validated.mime_type)
        } else {
            transcode::process(bytes, &validated.mime_type, image_kind)?
        };

        let stored_filename = generate_stored_filename(user_id, output.extension);
        self.paths.user_dir(user_id)?;
        let final_path = self.paths.image_path(user_id, &stored_filename)?;

        std::fs::write(&final_path, &output.bytes)?;
        if let Err(e) = secure_file(&final_path) {
            let _ = std::fs::remove_file(&final_path);
            return Err(e);
        }

        let id = ImageId::new();
        let image = Image {
            id,
            user_id,
            stored_filename,
            original_filename: original_filename.to_string(),
            image_kind,
            mime_type: output.mime_type.clone(),
            width: output.width,
            height: output.height,
            file_size: output.bytes.len() as i64,
            etag: compute_etag(&output.bytes),
            created_at: Utc::now(),
        };

        let conn = stillbox_db::pool::get_conn(&self.db)?;
        if let Err(e) = images::insert_image(&conn, &image) {
            // Keep row and file in lockstep
            let _ = std::fs::remove_file(&final_path);
            return Err(e);
        }

        Ok(CompletedUpload {
            id,
            url: format!("/api/images/{}", id),
            width: output.width,
            height: output.height,
            file_size: output.bytes.len() as u64,
        })
    }

    /// Reclaim sessions idle past the timeout.
    ///
    /// Sessions whose lock is held (a finalize in flight) are left alone.
    ///
    /// # Returns
    /// The number of sessions reclaimed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let idle = chrono::Duration::from_std(self.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        let mut removed = 0;
        self.sessions.retain(|token, slot| {
            let Some(mut session) = slot.try_lock() else {
                return true;
            };
            if session.state != SessionState::Accumulating {
                return true;
            }
            if now - session.last_activity <= idle {
                return true;
            }
            // A racing chunk or finalize may already hold this Arc; it must
            // observe a dead session, not a missing temp file.
            session.state = SessionState::Failed;
            if let Err(e) = std::fs::remove_file(&session.temp_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(token = %token, error = %e, "Failed to remove temp file");
                }
            }
            tracing::info!(
                token = %token,
                user_id = session.owner_user_id,
                idle_secs = (now - session.last_activity).num_seconds(),
                "Idle upload session reclaimed"
            );
            removed += 1;
            false
        });

        removed
    }

    /// Temp paths owned by live sessions; the temp pruner skips these.
    pub fn live_temp_paths(&self) -> HashSet<PathBuf> {
        self.sessions
            .iter()
            .map(|entry| entry.value().lock().temp_path.clone())
            .collect()
    }

    /// Number of in-flight sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// On-disk name for a stored image: `{user}_{unix_ts}_{16 hex}.{ext}`.
fn generate_stored_filename(user_id: i64, extension: &str) -> String {
    let mut random = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut random);
    format!(
        "{}_{}_{}.{}",
        user_id,
        Utc::now().timestamp(),
        hex::encode(random),
        extension
    )
}

/// Strong ETag: leading 8 bytes of the content's SHA-256, hex-encoded.
pub fn compute_etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

/// Start a background task that periodically reclaims idle sessions.
pub fn start_cleanup_task(
    manager: SessionManager,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let manager = manager.clone();
            let removed = tokio::task::spawn_blocking(move || manager.cleanup_expired())
                .await
                .unwrap_or(0);
            if removed > 0 {
                tracing::debug!(removed = removed, "Reclaimed idle upload sessions");
            }
        }
    })
}
