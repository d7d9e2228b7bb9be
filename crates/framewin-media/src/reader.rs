//! The video reader: one decode backend, one frame cache, one working zone.
//!
//! The reader works in one of two modes:
//! - **Caching**: the whole working zone is resident; navigation only moves
//!   the cache's current pointer.
//! - **Frame-by-frame**: the cache holds just the current frame and every
//!   navigation step decodes.
//!
//! Working-zone changes go through [`ZoneDecision`]. Imports run wherever the
//! caller's [`Scheduler`] puts them and stream frames back over a channel;
//! the reader applies them to its cache on its own thread whenever it is
//! called, so the cache has a single writer.

use crate::backend::{share_boxed, DecodeBackend, NextFrame, ReaderFlags, SharedBackend, VideoInfo, VideoSummary};
use crate::cache::FrameCache;
use crate::config::{CacheBudget, ImageAspectRatio, ReaderConfig, VideoOptions};
use crate::import::{ImportHandle, ImportJob, ImportMessage, ImportOutcome, ImportProgress, Scheduler};
use crate::zone::{ZoneDecision, ZoneRequest};
use crossbeam_channel::TryRecvError;
use framewin_core::{
    FrameSlot, OpenError, Result, SharedFrameBuffer, TimeSection, Timestamp,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Orchestrates a frame cache and a decode backend for one open source.
pub struct VideoReader {
    backend: SharedBackend,
    info: VideoInfo,
    flags: ReaderFlags,
    options: VideoOptions,
    working_zone: TimeSection,
    cache: FrameCache,
    caching: bool,
    import: Option<ImportHandle>,
    last_outcome: Option<ImportOutcome>,
    /// Timestamp of the last frame navigated to.
    position: Option<Timestamp>,
    /// The backend's decode position no longer follows `position`.
    needs_seek: bool,
    dropped: u64,
}

impl VideoReader {
    /// Open `source` with `backend`.
    ///
    /// The working zone starts as the whole stream. Backends flagged
    /// `always_caching` have their zone imported before this returns.
    pub fn open(
        mut backend: Box<dyn DecodeBackend>,
        source: &Path,
        config: &ReaderConfig,
    ) -> std::result::Result<Self, OpenError> {
        let info = backend.open(source)?;
        let flags = backend.flags();
        info!(
            "Opened {} ({}, {}, {} timestamps)",
            source.display(),
            info.original_size,
            info.frame_rate,
            info.duration_timestamps
        );

        let cache = FrameCache::new(
            config.budget,
            info.time_base,
            info.average_timestamps_per_frame,
        );
        let mut reader = Self {
            backend: share_boxed(backend),
            working_zone: info.full_section(),
            info,
            flags,
            options: VideoOptions::default(),
            cache,
            caching: false,
            import: None,
            last_outcome: None,
            position: None,
            needs_seek: false,
            dropped: 0,
        };

        let invalid = |e: framewin_core::FrameWinError| OpenError::InvalidSource(e.to_string());
        reader
            .change_aspect_ratio(config.options.aspect_ratio)
            .map_err(invalid)?;
        reader
            .change_deinterlace(config.options.deinterlace)
            .map_err(invalid)?;

        if flags.always_caching {
            reader.load_whole_zone().map_err(invalid)?;
        }

        Ok(reader)
    }

    /// Release the source and everything cached from it.
    pub fn close(&mut self) {
        self.abandon_import();
        self.cache.clear();
        self.backend.lock().close();
        self.working_zone = TimeSection::Empty;
        self.position = None;
        info!("Closed {}", self.info.file_path.display());
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn flags(&self) -> ReaderFlags {
        self.flags
    }

    pub fn options(&self) -> VideoOptions {
        self.options
    }

    pub fn file_path(&self) -> &Path {
        &self.info.file_path
    }

    pub fn is_single_frame(&self) -> bool {
        self.info.is_single_frame()
    }

    pub fn working_zone(&self) -> TimeSection {
        self.working_zone
    }

    /// True while the whole working zone is resident.
    pub fn is_caching(&self) -> bool {
        self.caching
    }

    pub fn is_importing(&self) -> bool {
        self.import.is_some()
    }

    /// Progress of the in-flight import, if any.
    pub fn import_progress(&self) -> Option<ImportProgress> {
        self.import.as_ref().map(|h| h.progress)
    }

    /// How the most recent import ended.
    pub fn last_import_outcome(&self) -> Option<&ImportOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// The frame last navigated to.
    pub fn current(&self) -> Option<&FrameSlot> {
        self.cache.current()
    }

    pub fn current_image(&self) -> Option<&SharedFrameBuffer> {
        self.cache.current().map(|s| &s.image)
    }

    /// Asynchronous frame requests that could not be served in time.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    pub fn reset_drops(&mut self) {
        self.dropped = 0;
    }

    // ── Working zone ────────────────────────────────────────────

    /// Move the working zone to `new_zone`, importing it into the cache if
    /// the backend says it fits `budget`.
    ///
    /// Any import is handed to `scheduler`. Returns the action taken.
    pub fn update_working_zone(
        &mut self,
        new_zone: TimeSection,
        force_reload: bool,
        budget: CacheBudget,
        scheduler: &dyn Scheduler,
    ) -> Result<ZoneDecision> {
        self.poll_import()?;

        let request = ZoneRequest {
            old_zone: self.working_zone,
            new_zone,
            always_caching: self.flags.always_caching,
            fits_budget: self.can_cache(new_zone, &budget),
            caching: self.caching,
            importing: self.import.is_some(),
            force_reload,
        };
        let decision = ZoneDecision::decide(&request);
        debug!(
            "Working zone {} -> {} (force: {}): {}",
            self.working_zone, new_zone, force_reload, decision
        );

        if decision == ZoneDecision::AlwaysCached {
            return Ok(decision);
        }

        self.working_zone = new_zone;

        match decision {
            ZoneDecision::AlwaysCached | ZoneDecision::AlreadyImporting => {}
            ZoneDecision::StopCaching | ZoneDecision::FullReload | ZoneDecision::ReloadBothSides => {
                self.abandon_import();
                self.cache.clear();
            }
            ZoneDecision::Reduce | ZoneDecision::Prepend(_) | ZoneDecision::Append(_) => {
                self.cache.purge_outsiders(new_zone);
            }
        }

        // Only frames of the new zone are left to weigh against the budget.
        let evictions = self.cache.evictions();
        self.cache.set_budget(budget);
        if self.caching && self.cache.evictions() > evictions {
            warn!(
                "Working zone {} no longer fits the cache budget, staying frame-by-frame",
                new_zone
            );
            self.caching = false;
        }

        if let Some((section, prepend)) = decision.import(new_zone) {
            self.start_import(section, prepend, scheduler)?;
        }

        Ok(decision)
    }

    /// Ask the backend whether `section` fits `budget`. While an import
    /// holds the backend, answer from the stream description instead of
    /// waiting for it.
    fn can_cache(&self, section: TimeSection, budget: &CacheBudget) -> bool {
        match self.backend.try_lock() {
            Some(backend) => backend.can_cache_section(section, budget),
            None => self.info.section_fits(section, budget),
        }
    }

    fn start_import(
        &mut self,
        section: TimeSection,
        prepend: bool,
        scheduler: &dyn Scheduler,
    ) -> Result<()> {
        let (job, mut handle) = ImportJob::new(
            Arc::clone(&self.backend),
            section,
            prepend,
            self.info.average_timestamps_per_frame,
        );
        handle.evictions_at_start = self.cache.evictions();
        if prepend {
            self.cache.begin_prepend_block();
        }
        self.caching = false;
        self.needs_seek = true;
        self.import = Some(handle);

        scheduler.schedule(job);

        // Inline schedulers have already finished; pick up their frames now.
        self.poll_import()?;
        Ok(())
    }

    /// Import the whole working zone on the calling thread.
    fn load_whole_zone(&mut self) -> Result<()> {
        let zone = self.working_zone;
        let (job, handle) = ImportJob::new(
            Arc::clone(&self.backend),
            zone,
            false,
            self.info.average_timestamps_per_frame,
        );
        self.cache.set_budget(CacheBudget::new(f64::INFINITY, usize::MAX));
        self.import = Some(handle);
        job.run();

        match self.wait_for_import()? {
            Some(ImportOutcome::Completed) => {
                if let Some(first) = self.cache.first().map(|s| s.timestamp) {
                    let moved = self.cache.move_to(first);
                    self.settle(moved);
                }
                Ok(())
            }
            Some(outcome) => Err(framewin_core::FrameWinError::Decoder(format!(
                "Loading {} failed: {:?}",
                zone, outcome
            ))),
            None => Ok(()),
        }
    }

    /// Apply every frame the in-flight import has delivered so far, without
    /// blocking. Returns the import's outcome if it finished.
    pub fn poll_import(&mut self) -> Result<Option<ImportOutcome>> {
        self.drain_import(false)
    }

    /// Block until the in-flight import finishes, applying its frames.
    pub fn wait_for_import(&mut self) -> Result<Option<ImportOutcome>> {
        self.drain_import(true)
    }

    /// Stop the in-flight import. Frames already applied stay in the cache;
    /// the cache is no longer trusted as a full working zone.
    pub fn cancel_import(&mut self) {
        if self.import.is_some() {
            self.abandon_import();
            self.last_outcome = Some(ImportOutcome::Cancelled);
        }
    }

    fn drain_import(&mut self, block: bool) -> Result<Option<ImportOutcome>> {
        loop {
            let Some(handle) = self.import.as_mut() else {
                return Ok(None);
            };

            let message = if block {
                handle.rx.recv().ok()
            } else {
                match handle.rx.try_recv() {
                    Ok(message) => Some(message),
                    Err(TryRecvError::Empty) => return Ok(None),
                    Err(TryRecvError::Disconnected) => None,
                }
            };

            match message {
                Some(ImportMessage::Frame(slot)) => {
                    let prepend = handle.prepend;
                    handle.progress.read += 1;
                    if let Err(e) = self.cache.add(slot, prepend) {
                        error!("Import delivered a frame out of order: {}", e);
                        self.abandon_import();
                        self.last_outcome = Some(ImportOutcome::Failed(e.to_string()));
                        return Err(e);
                    }
                }
                Some(ImportMessage::Finished(outcome)) => {
                    self.finish_import(outcome.clone());
                    return Ok(Some(outcome));
                }
                None => {
                    let outcome =
                        ImportOutcome::Failed("import task ended without reporting".into());
                    self.finish_import(outcome.clone());
                    return Ok(Some(outcome));
                }
            }
        }
    }

    fn finish_import(&mut self, outcome: ImportOutcome) {
        let Some(handle) = self.import.take() else {
            return;
        };

        match &outcome {
            ImportOutcome::Completed if self.cache.evictions() > handle.evictions_at_start => {
                warn!(
                    "Import of {} overflowed the cache budget, staying frame-by-frame",
                    handle.section
                );
                self.caching = false;
            }
            ImportOutcome::Completed if self.cache.is_empty() => {
                warn!("Import of {} produced no frames", handle.section);
                self.caching = false;
            }
            ImportOutcome::Completed => {
                debug!(
                    "Import of {} complete, {} frames cached",
                    handle.section,
                    self.cache.len()
                );
                self.caching = true;
                if self.cache.current().is_none() {
                    if let Some(position) = self.position {
                        let target = self.cache.section().clamp(position);
                        self.cache.move_to(target);
                    }
                }
            }
            ImportOutcome::Cancelled => {
                debug!("Import of {} cancelled", handle.section);
                self.caching = false;
            }
            ImportOutcome::Failed(reason) => {
                warn!(
                    "Import of {} failed, falling back to frame-by-frame: {}",
                    handle.section, reason
                );
                self.caching = false;
            }
        }
        self.last_outcome = Some(outcome);
    }

    /// Drop the in-flight import, if any, and leave caching mode.
    fn abandon_import(&mut self) {
        if let Some(handle) = self.import.take() {
            debug!("Abandoning import of {}", handle.section);
            handle.cancel.cancel();
        }
        self.caching = false;
    }

    // ── Navigation ──────────────────────────────────────────────

    /// Advance one frame.
    ///
    /// With `synchronous` set this blocks until the next frame is current.
    /// Otherwise a frame that is not immediately available counts as a drop
    /// and `Ok(false)` is returned with `current` unchanged. `Ok(false)` is
    /// also returned at the end of the working zone.
    pub fn move_next(&mut self, synchronous: bool) -> Result<bool> {
        self.poll_import()?;

        if self.caching {
            return Ok(self.step_cached());
        }

        if self.import.is_some() {
            if self.step_cached() {
                return Ok(true);
            }
            if !synchronous {
                self.record_drop();
                return Ok(false);
            }
            self.wait_for_import()?;
            if self.caching {
                return Ok(self.step_cached());
            }
        }

        self.decode_next(synchronous)
    }

    /// Make the frame displayed at `timestamp` current. Always synchronous.
    ///
    /// In caching mode the timestamp is clamped to the cached zone.
    pub fn move_to(&mut self, timestamp: Timestamp) -> Result<bool> {
        self.poll_import()?;

        if self.caching {
            return Ok(self.seek_cached(timestamp));
        }

        if self.import.is_some() {
            let moved = self.cache.move_to(timestamp);
            if self.settle(moved) {
                return Ok(true);
            }
            self.wait_for_import()?;
            if self.caching {
                return Ok(self.seek_cached(timestamp));
            }
        }

        let slot = self.backend.lock().decode_at(timestamp)?;
        self.needs_seek = false;
        self.install(slot)?;
        Ok(true)
    }

    /// Step back one frame.
    pub fn move_prev(&mut self) -> Result<bool> {
        match self.current_timestamp() {
            Some(ts) => self.move_to(ts - self.info.average_timestamps_per_frame),
            None => self.move_first(),
        }
    }

    /// Go to the first frame of the working zone.
    pub fn move_first(&mut self) -> Result<bool> {
        let zone = self.navigable_zone();
        match zone.start() {
            Some(start) => self.move_to(start),
            None => Ok(false),
        }
    }

    /// Go to the last frame of the working zone.
    pub fn move_last(&mut self) -> Result<bool> {
        let zone = self.navigable_zone();
        match zone.end() {
            Some(end) => self.move_to(zone.clamp(end - 1)),
            None => Ok(false),
        }
    }

    /// Move by `frames` frames. A single step forward is a non-blocking
    /// `move_next`; everything else seeks, clamped at timestamp zero.
    pub fn move_by(&mut self, frames: i64) -> Result<bool> {
        if frames == 1 {
            return self.move_next(false);
        }
        let base = self.current_timestamp().unwrap_or(0);
        let target = (base + self.info.average_timestamps_per_frame * frames).max(0);
        self.move_to(target)
    }

    fn current_timestamp(&self) -> Option<Timestamp> {
        self.cache.current().map(|s| s.timestamp).or(self.position)
    }

    fn navigable_zone(&self) -> TimeSection {
        if self.working_zone.is_empty() {
            self.info.full_section()
        } else {
            self.working_zone
        }
    }

    /// Step to the resident frame after the current one.
    fn step_cached(&mut self) -> bool {
        let moved = if self.cache.current().is_some() {
            self.cache.move_by(1)
        } else {
            let next = match self.position {
                Some(position) => self.cache.iter().find(|s| s.timestamp > position),
                None => self.cache.first(),
            }
            .map(|s| s.timestamp);
            next.is_some_and(|ts| self.cache.move_to(ts))
        };
        self.settle(moved)
    }

    fn seek_cached(&mut self, timestamp: Timestamp) -> bool {
        let target = self.cache.section().clamp(timestamp);
        let moved = self.cache.move_to(target);
        self.settle(moved)
    }

    fn decode_next(&mut self, synchronous: bool) -> Result<bool> {
        let next = if synchronous {
            let mut backend = self.backend.lock();
            if self.needs_seek {
                if let Some(position) = self.position {
                    backend.decode_at(position)?;
                }
                self.needs_seek = false;
            }
            backend.decode_next(true)?
        } else {
            match self.backend.try_lock() {
                Some(mut backend) => {
                    if self.needs_seek {
                        if let Some(position) = self.position {
                            backend.decode_at(position)?;
                        }
                        self.needs_seek = false;
                    }
                    backend.decode_next(false)?
                }
                None => NextFrame::NotReady,
            }
        };

        match next {
            NextFrame::Frame(slot) => {
                if self
                    .working_zone
                    .end()
                    .is_some_and(|end| slot.timestamp >= end)
                {
                    trace!("Reached the end of the working zone at {}", slot.timestamp);
                    return Ok(false);
                }
                self.install(slot)?;
                Ok(true)
            }
            NextFrame::NotReady => {
                self.record_drop();
                Ok(false)
            }
            NextFrame::EndOfStream => Ok(false),
        }
    }

    /// Make `slot` the only resident frame and the current one.
    fn install(&mut self, slot: FrameSlot) -> Result<()> {
        let timestamp = slot.timestamp;
        self.cache.clear();
        self.cache.add(slot, false)?;
        let moved = self.cache.move_to(timestamp);
        self.settle(moved);
        Ok(())
    }

    fn settle(&mut self, moved: bool) -> bool {
        if moved {
            self.position = self.cache.current().map(|s| s.timestamp);
        }
        moved
    }

    fn record_drop(&mut self) {
        self.dropped += 1;
        trace!("Dropped frame ({} so far)", self.dropped);
    }

    // ── Options ─────────────────────────────────────────────────

    /// Force an aspect ratio. Returns true if the cache was invalidated.
    pub fn change_aspect_ratio(&mut self, ratio: ImageAspectRatio) -> Result<bool> {
        if !self.flags.can_change_aspect_ratio || self.options.aspect_ratio == ratio {
            return Ok(false);
        }
        self.apply_options(VideoOptions {
            aspect_ratio: ratio,
            ..self.options
        })?;
        Ok(true)
    }

    /// Turn deinterlacing on or off. Returns true if the cache was invalidated.
    pub fn change_deinterlace(&mut self, deinterlace: bool) -> Result<bool> {
        if !self.flags.can_change_deinterlace || self.options.deinterlace == deinterlace {
            return Ok(false);
        }
        self.apply_options(VideoOptions {
            deinterlace,
            ..self.options
        })?;
        Ok(true)
    }

    fn apply_options(&mut self, options: VideoOptions) -> Result<()> {
        self.abandon_import();
        let info = self.backend.lock().apply_options(options)?;
        debug!(
            "Decoding options changed to {:?}, decoding at {}",
            options, info.aspect_ratio_size
        );
        self.cache
            .configure(info.time_base, info.average_timestamps_per_frame);
        self.cache.clear();
        self.info = info;
        self.options = options;

        // Frame-by-frame callers still expect a current frame.
        if let Some(position) = self.position {
            self.move_to(position)?;
        }
        Ok(())
    }

    // ── Pass-through ────────────────────────────────────────────

    /// Thumbnails and facts about `source`.
    pub fn extract_summary(
        &self,
        source: &Path,
        thumbnail_count: usize,
        width: u32,
    ) -> Result<VideoSummary> {
        self.backend
            .lock()
            .extract_summary(source, thumbnail_count, width)
    }

    pub fn read_metadata(&self) -> Option<String> {
        self.backend.lock().read_metadata()
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if let Some(handle) = self.import.take() {
            handle.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for VideoReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoReader")
            .field("file_path", &self.info.file_path)
            .field("working_zone", &self.working_zone)
            .field("caching", &self.caching)
            .field("importing", &self.import.is_some())
            .field("cached_frames", &self.cache.len())
            .finish()
    }
}
