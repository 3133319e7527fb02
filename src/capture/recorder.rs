//! Recorder for capturing the spiral into a GIF or video file.

use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use image::RgbaImage;
use log::{debug, info, warn};

use super::{
    EncoderError, FrameEncoder, PendingGrab, RecordError, RenderSurface, SceneGrabber, Storage,
    create_encoder, output_file_name,
};
use crate::geometry::PixelRect;
use crate::schema::{FrameRate, RecordingConfig};

/// Message from the encode worker: the encoder handed back plus the push result.
type EncodeDone = (Box<dyn FrameEncoder>, Result<(), EncoderError>);

struct Session {
    path: PathBuf,
    /// Frames for which a grab was started.
    frame_number: u64,
    started: Instant,
}

/// The single frame that may be between `add_frame` and completion.
enum InFlight {
    Idle,
    Grabbing {
        grab: PendingGrab,
        position: (u32, u32),
    },
    Encoding {
        worker: JoinHandle<()>,
        done: Receiver<EncodeDone>,
    },
}

/// Records frames of a render surface into a file.
///
/// Usage:
/// ```ignore
/// let mut recorder = Recorder::create(config, grabber, storage);
/// recorder.start_recording(FrameRate::Fps10, "")?;
/// recorder.add_frame(&mut surface, dirty_rect)?;
/// while recorder.poll(Duration::from_millis(40)).is_none() {
///     // keep rendering
/// }
/// let stats = recorder.stop_recording(true)?;
/// ```
pub struct Recorder {
    /// `None` while the encode worker owns it.
    encoder: Option<Box<dyn FrameEncoder>>,
    partial_frames: bool,
    grabber: SceneGrabber,
    storage: Arc<dyn Storage>,
    config: RecordingConfig,
    full_frame_rect: PixelRect,
    session: Option<Session>,
    in_flight: InFlight,
    frames_encoded: u64,
}

impl Recorder {
    pub fn new(
        encoder: Box<dyn FrameEncoder>,
        grabber: SceneGrabber,
        storage: Arc<dyn Storage>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            partial_frames: encoder.can_encode_partial_frame(),
            encoder: Some(encoder),
            full_frame_rect: grabber.spiral_cut_rect(),
            grabber,
            storage,
            config,
            session: None,
            in_flight: InFlight::Idle,
            frames_encoded: 0,
        }
    }

    /// Recorder with the encoder selected by `config.format`.
    pub fn create(
        config: RecordingConfig,
        grabber: SceneGrabber,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self::new(create_encoder(&config), grabber, storage, config)
    }

    pub fn grabber(&self) -> &SceneGrabber {
        &self.grabber
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    pub fn full_frame_rect(&self) -> PixelRect {
        self.full_frame_rect
    }

    pub fn can_encode_partial_frame(&self) -> bool {
        self.partial_frames
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a frame is being grabbed or encoded.
    pub fn is_busy(&self) -> bool {
        !matches!(self.in_flight, InFlight::Idle)
    }

    pub fn frame_number(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.frame_number)
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Open a new output file. Nothing is left on disk when this fails.
    pub fn start_recording(
        &mut self,
        frame_rate: FrameRate,
        suffix: &str,
    ) -> Result<(), RecordError> {
        if self.session.is_some() {
            warn!("Recording already started");
            return Ok(());
        }
        let encoder = self.encoder.as_mut().ok_or(RecordError::Busy)?;

        let dir = self.storage.output_directory().map_err(|e| {
            warn!("Cannot record: {}", e);
            RecordError::StorageUnavailable(e)
        })?;
        let name = output_file_name("VID", Local::now(), suffix, encoder.file_extension());
        let path = dir.join(name);
        let rect = self.full_frame_rect;

        info!(
            "Start recording {}x{} at {} fps: {}",
            rect.width,
            rect.height,
            frame_rate.fps(),
            path.display()
        );
        if let Err(source) = encoder.open(
            &path,
            rect.width,
            rect.height,
            frame_rate.fps(),
            self.config.bits_per_frame,
        ) {
            warn!("Cannot open {}: {}", path.display(), source);
            if let Err(e) = encoder.close() {
                debug!("Closing failed encoder: {}", e);
            }
            remove_output(&path);
            return Err(RecordError::EncoderOpenFailed { path, source });
        }

        self.session = Some(Session {
            path,
            frame_number: 0,
            started: Instant::now(),
        });
        self.frames_encoded = 0;
        Ok(())
    }

    /// Start capturing a frame.
    ///
    /// The first frame, and every frame of an encoder without partial frame
    /// support, covers the full frame rectangle. Later frames cover
    /// `recording_rect` clipped to it. Completion is reported by [`poll`].
    ///
    /// [`poll`]: Recorder::poll
    pub fn add_frame(
        &mut self,
        surface: &mut dyn RenderSurface,
        recording_rect: PixelRect,
    ) -> Result<(), RecordError> {
        let session = self.session.as_mut().ok_or(RecordError::NotRecording)?;
        if !matches!(self.in_flight, InFlight::Idle) {
            return Err(RecordError::Busy);
        }

        let full = self.full_frame_rect;
        let frame_rect = if session.frame_number == 0 || !self.partial_frames {
            full
        } else {
            let clipped = recording_rect.intersected(&full);
            if clipped.is_empty() { full } else { clipped }
        };
        let position = ((frame_rect.x - full.x) as u32, (frame_rect.y - full.y) as u32);

        let grab = self.grabber.grab(surface, frame_rect).inspect_err(|_| {
            debug!("Could not grab frame {}", session.frame_number);
        })?;

        session.frame_number += 1;
        self.in_flight = InFlight::Grabbing { grab, position };
        Ok(())
    }

    /// Drive the frame in flight for at most `timeout`.
    ///
    /// Returns `None` while the frame is still pending (or none was added),
    /// otherwise the outcome of the frame. At most one frame is ever in
    /// flight, so frames reach the encoder in the order they were added.
    pub fn poll(&mut self, timeout: Duration) -> Option<Result<(), RecordError>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match mem::replace(&mut self.in_flight, InFlight::Idle) {
                InFlight::Idle => return None,
                InFlight::Grabbing { grab, position } => match grab.wait_timeout(remaining) {
                    None => {
                        self.in_flight = InFlight::Grabbing { grab, position };
                        return None;
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    Some(Ok(image)) => {
                        if let Err(e) = self.spawn_encode(image, position) {
                            return Some(Err(e));
                        }
                    }
                },
                InFlight::Encoding { worker, done } => match done.recv_timeout(remaining) {
                    Ok((encoder, result)) => {
                        self.encoder = Some(encoder);
                        join_worker(worker);
                        return Some(match result {
                            Ok(()) => {
                                self.frames_encoded += 1;
                                Ok(())
                            }
                            Err(e) => Err(RecordError::EncodeFailed(e)),
                        });
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        self.in_flight = InFlight::Encoding { worker, done };
                        return None;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        join_worker(worker);
                        return Some(Err(RecordError::EncodeFailed(EncoderError::WorkerLost)));
                    }
                },
            }
        }
    }

    fn spawn_encode(&mut self, image: RgbaImage, position: (u32, u32)) -> Result<(), RecordError> {
        let mut encoder = self.encoder.take().ok_or(RecordError::Busy)?;
        let (tx, rx) = bounded(1);
        let worker = thread::spawn(move || {
            let result = encoder.push(&image, position.0, position.1);
            // Nobody listens any more if the recorder went away.
            let _ = tx.send((encoder, result));
        });
        self.in_flight = InFlight::Encoding { worker, done: rx };
        Ok(())
    }

    /// Wait for a running encode to finish; a pending grab is dropped.
    fn finish_in_flight(&mut self) -> Option<Result<(), EncoderError>> {
        match mem::replace(&mut self.in_flight, InFlight::Idle) {
            InFlight::Idle => None,
            InFlight::Grabbing { .. } => {
                debug!("Dropping frame grab in progress");
                None
            }
            InFlight::Encoding { worker, done } => {
                debug!("Wait for encode worker to finish");
                let received = done.recv();
                join_worker(worker);
                match received {
                    Ok((encoder, result)) => {
                        self.encoder = Some(encoder);
                        if result.is_ok() {
                            self.frames_encoded += 1;
                        }
                        Some(result)
                    }
                    Err(_) => Some(Err(EncoderError::WorkerLost)),
                }
            }
        }
    }

    /// Finalize the output file and optionally announce it to storage.
    ///
    /// If the file cannot be finalized it is removed.
    pub fn stop_recording(&mut self, notify: bool) -> Result<RecordingStats, RecordError> {
        let Some(session) = self.session.take() else {
            return Err(RecordError::NotRecording);
        };

        let pending = self.finish_in_flight().unwrap_or(Ok(()));
        let closed = match self.encoder.as_mut() {
            Some(encoder) => encoder.close(),
            None => Err(EncoderError::WorkerLost),
        };
        if let Err(e) = pending.and(closed) {
            warn!("Recording failed, removing {}: {}", session.path.display(), e);
            remove_output(&session.path);
            return Err(RecordError::EncodeFailed(e));
        }

        let stats = RecordingStats {
            total_bytes: fs::metadata(&session.path).map_or(0, |m| m.len()),
            path: session.path,
            frame_count: self.frames_encoded,
            elapsed: session.started.elapsed(),
        };
        info!("Recording stopped: {}", stats);

        if notify {
            self.storage.notify_file_ready(&stats.path);
        }
        Ok(stats)
    }

    /// Cancel: join the worker, close the encoder and delete an unfinished file.
    pub fn abort(&mut self) {
        if let Some(Err(e)) = self.finish_in_flight() {
            debug!("Discarding frame: {}", e);
        }
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(e) = encoder.close() {
                debug!("Closing aborted recording: {}", e);
            }
        }
        info!("Stop recording and remove file: {}", session.path.display());
        remove_output(&session.path);
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.session.is_some() || self.is_busy() {
            self.abort();
        }
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        warn!("Encode worker panicked");
    }
}

fn remove_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}

/// Statistics of a finished recording.
#[derive(Debug, Clone)]
pub struct RecordingStats {
    pub path: PathBuf,
    /// Frames successfully pushed to the encoder.
    pub frame_count: u64,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl std::fmt::Display for RecordingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes in {:.2}s ({})",
            self.frame_count,
            self.total_bytes,
            self.elapsed.as_secs_f64(),
            self.path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{MockEncoder, init_logging};
    use crate::capture::{DirectoryStorage, RasterSurface, VideoEncoder};
    use crate::engine::{CircleChain, DrawTracker};
    use crate::geometry::Point;
    use crate::schema::{Color, SpiralConfig};
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn scene() -> (CircleChain, RasterSurface, SceneGrabber) {
        let mut chain = SpiralConfig::default()
            .to_chain(5.0, Point::new(100.0, 100.0))
            .unwrap();
        let mut tracker = DrawTracker::new(1.0);
        tracker.prepare(&mut chain);
        let mut surface = RasterSurface::new(200.0, 200.0, 1.0, Color::BLACK);
        surface.render(&chain, &mut tracker, true);
        let grabber = SceneGrabber::for_chain(&chain, 1.0, 20);
        (chain, surface, grabber)
    }

    fn files_in(dir: &Path) -> usize {
        fs::read_dir(dir).map_or(0, |entries| entries.count())
    }

    #[test]
    fn test_gif_recording() {
        init_logging();
        let dir = tempdir().unwrap();
        let storage = Arc::new(DirectoryStorage::new(dir.path()));
        let (chain, mut surface, grabber) = scene();

        let mut recorder = Recorder::create(RecordingConfig::default(), grabber, storage.clone());
        recorder.start_recording(FrameRate::Fps10, "_test").unwrap();
        assert!(recorder.is_recording());
        let path = recorder.output_path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("VID_") && name.ends_with("_test.gif"));

        // The first frame ignores the dirty rectangle.
        let dirty = recorder.grabber().bounding_rectangle(&chain);
        recorder.add_frame(&mut surface, dirty).unwrap();
        assert!(recorder.is_busy());
        recorder.poll(WAIT).unwrap().unwrap();
        assert!(!recorder.is_busy());

        recorder.add_frame(&mut surface, dirty).unwrap();
        recorder.poll(WAIT).unwrap().unwrap();

        let stats = recorder.stop_recording(true).unwrap();
        assert_eq!(stats.frame_count, 2);
        assert!(stats.total_bytes > 0);
        assert_eq!(storage.ready_files(), vec![path.clone()]);

        let mut decoder = gif::DecodeOptions::new()
            .read_info(fs::File::open(&path).unwrap())
            .unwrap();
        let full = recorder.full_frame_rect();
        let first = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!((first.width as u32, first.height as u32), (full.width, full.height));
        let second = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(
            (second.left as i32, second.top as i32),
            (dirty.x - full.x, dirty.y - full.y)
        );
        assert_eq!((second.width as u32, second.height as u32), (dirty.width, dirty.height));
        assert!(decoder.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn test_full_frame_only_encoder() {
        let dir = tempdir().unwrap();
        let (chain, mut surface, grabber) = scene();
        let (encoder, pushes) = MockEncoder::new(false);
        let mut recorder = Recorder::new(
            Box::new(encoder),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
            RecordingConfig::default(),
        );

        recorder.start_recording(FrameRate::Fps25, "").unwrap();
        let dirty = recorder.grabber().bounding_rectangle(&chain);
        for _ in 0..3 {
            recorder.add_frame(&mut surface, dirty).unwrap();
            recorder.poll(WAIT).unwrap().unwrap();
        }
        recorder.stop_recording(false).unwrap();

        let full = recorder.full_frame_rect();
        let pushes = pushes.lock().unwrap();
        assert_eq!(pushes.len(), 3);
        assert!(pushes.iter().all(|p| *p == (0, 0, full.width, full.height)));
    }

    #[test]
    fn test_storage_unavailable() {
        let (_, _, grabber) = scene();
        let mut recorder = Recorder::create(
            RecordingConfig::default(),
            grabber,
            Arc::new(DirectoryStorage::new("/dev/null/spiral-fun")),
        );
        assert!(matches!(
            recorder.start_recording(FrameRate::Fps10, ""),
            Err(RecordError::StorageUnavailable(_))
        ));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_encoder_open_failure_leaves_no_file() {
        let dir = tempdir().unwrap();
        let (_, _, grabber) = scene();
        let encoder = VideoEncoder::new().with_program("spiral-fun-no-such-ffmpeg");
        let mut recorder = Recorder::new(
            Box::new(encoder),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
            RecordingConfig::default(),
        );

        assert!(matches!(
            recorder.start_recording(FrameRate::Fps10, ""),
            Err(RecordError::EncoderOpenFailed { .. })
        ));
        assert!(!recorder.is_recording());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn test_one_frame_in_flight() {
        let dir = tempdir().unwrap();
        let (_, mut surface, grabber) = scene();
        let mut recorder = Recorder::create(
            RecordingConfig::default(),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
        );

        assert!(matches!(
            recorder.add_frame(&mut surface, PixelRect::default()),
            Err(RecordError::NotRecording)
        ));

        recorder.start_recording(FrameRate::Fps10, "").unwrap();
        recorder.add_frame(&mut surface, PixelRect::default()).unwrap();
        assert!(matches!(
            recorder.add_frame(&mut surface, PixelRect::default()),
            Err(RecordError::Busy)
        ));
        recorder.poll(WAIT).unwrap().unwrap();
        assert!(recorder.poll(Duration::ZERO).is_none());
        recorder.stop_recording(false).unwrap();
    }

    #[test]
    fn test_grab_failure_keeps_recorder_usable() {
        let dir = tempdir().unwrap();
        let (chain, _, grabber) = scene();
        let mut unrendered = RasterSurface::new(200.0, 200.0, 1.0, Color::BLACK);
        let mut recorder = Recorder::create(
            RecordingConfig::default(),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
        );
        recorder.start_recording(FrameRate::Fps10, "").unwrap();

        let dirty = recorder.grabber().bounding_rectangle(&chain);
        assert!(matches!(
            recorder.add_frame(&mut unrendered, dirty),
            Err(RecordError::GrabFailed)
        ));
        assert!(!recorder.is_busy());
        assert_eq!(recorder.frame_number(), 0);
    }

    #[test]
    fn test_drop_removes_unfinished_file() {
        let dir = tempdir().unwrap();
        let (_, mut surface, grabber) = scene();
        let mut recorder = Recorder::create(
            RecordingConfig::default(),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
        );
        recorder.start_recording(FrameRate::Fps10, "").unwrap();
        recorder.add_frame(&mut surface, PixelRect::default()).unwrap();
        recorder.poll(WAIT).unwrap().unwrap();
        let path = recorder.output_path().unwrap().to_path_buf();
        assert!(path.exists());

        drop(recorder);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_joins_running_worker() {
        let dir = tempdir().unwrap();
        let (_, mut surface, grabber) = scene();
        let (encoder, pushes) = MockEncoder::new(true);
        let encoder = encoder.with_delay(Duration::from_millis(100));
        let mut recorder = Recorder::new(
            Box::new(encoder),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
            RecordingConfig::default(),
        );
        recorder.start_recording(FrameRate::Fps10, "").unwrap();
        recorder.add_frame(&mut surface, PixelRect::default()).unwrap();
        // Hands the image to the worker without waiting for the push.
        assert!(recorder.poll(Duration::ZERO).is_none());
        assert!(recorder.is_busy());
        let path = recorder.output_path().unwrap().to_path_buf();

        drop(recorder);
        assert_eq!(pushes.lock().unwrap().len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_encode_failure_is_reported() {
        let dir = tempdir().unwrap();
        let (_, mut surface, grabber) = scene();
        let (encoder, _) = MockEncoder::new(true);
        let mut recorder = Recorder::new(
            Box::new(encoder.failing_from(0)),
            grabber,
            Arc::new(DirectoryStorage::new(dir.path())),
            RecordingConfig::default(),
        );
        recorder.start_recording(FrameRate::Fps10, "").unwrap();
        recorder.add_frame(&mut surface, PixelRect::default()).unwrap();
        assert!(matches!(
            recorder.poll(WAIT),
            Some(Err(RecordError::EncodeFailed(_)))
        ));
        recorder.abort();
        assert!(!recorder.is_recording());
        assert_eq!(files_in(dir.path()), 0);
    }
}
