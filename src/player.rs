//! Player driving the rotation loop and, optionally, a recording.
//!
//! The player is cooperative: every [`Player::tick`] stands for one firing
//! of the step timer. A tick performs a batch of rotation steps, or, while a
//! recorded frame is in flight, pumps the recorder instead. Stepping stays
//! paused until the frame completes, which keeps at most one frame in flight
//! and the frames in rotation order.

use std::mem;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::capture::{
    RecordError, Recorder, RecordingStats, RenderSurface, SceneGrabber, Storage, write_image,
};
use crate::engine::{CircleChain, DrawTracker, RotationEngine};
use crate::geometry::PixelRect;
use crate::schema::{ConfigError, PlayerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Stepping,
    /// Stepping is paused until the recorder finishes the current frame.
    WaitingForFrame,
    Done,
}

/// Union of the moving circles' rectangles since the last capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingRect {
    rect: PixelRect,
}

impl RecordingRect {
    pub fn add(&mut self, rect: PixelRect) {
        self.rect = self.rect.united(&rect);
    }

    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_empty()
    }

    /// Return the accumulated rectangle and start over.
    pub fn take(&mut self) -> PixelRect {
        mem::take(&mut self.rect)
    }
}

/// Summary of a finished play.
#[derive(Debug, Clone, Default)]
pub struct PlayerStats {
    pub elapsed: Duration,
    pub steps: u64,
    pub average_step_time: Duration,
    /// Frames written to the output file.
    pub frames: u64,
    pub vertices: usize,
    pub segments: usize,
    pub output_file: Option<PathBuf>,
    pub recording_error: Option<String>,
}

impl std::fmt::Display for PlayerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} steps in {:.2}s ({:.1} us/step), {} vertices, {} segments, {} frames",
            self.steps,
            self.elapsed.as_secs_f64(),
            self.average_step_time.as_secs_f64() * 1e6,
            self.vertices,
            self.segments,
            self.frames
        )?;
        if let Some(err) = &self.recording_error {
            write!(f, ", recording failed: {}", err)?;
        }
        Ok(())
    }
}

pub struct Player {
    chain: CircleChain,
    tracker: DrawTracker,
    engine: RotationEngine,
    config: PlayerConfig,
    surface: Box<dyn RenderSurface>,
    recorder: Option<Recorder>,
    recording_rect: RecordingRect,
    /// Moving circles at the last capture, whose outlines that frame shows.
    captured_outlines: PixelRect,
    steps_since_capture: u32,
    /// The cycle is complete; only the closing frame may still be pending.
    finishing: bool,
    state: PlayState,
    started: Option<Instant>,
    last_refresh: Option<Instant>,
    step_time: Duration,
    recording_error: Option<RecordError>,
    stats: Option<PlayerStats>,
}

impl Player {
    pub fn new(
        chain: CircleChain,
        surface: Box<dyn RenderSurface>,
        config: PlayerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracker: DrawTracker::new(config.min_draw_length),
            engine: RotationEngine::new(config.step_angle()),
            chain,
            config,
            surface,
            recorder: None,
            recording_rect: RecordingRect::default(),
            captured_outlines: PixelRect::default(),
            steps_since_capture: 0,
            finishing: false,
            state: PlayState::Idle,
            started: None,
            last_refresh: None,
            step_time: Duration::ZERO,
            recording_error: None,
            stats: None,
        })
    }

    pub fn chain(&self) -> &CircleChain {
        &self.chain
    }

    pub fn tracker(&self) -> &DrawTracker {
        &self.tracker
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Statistics of the last finished play.
    pub fn stats(&self) -> Option<&PlayerStats> {
        self.stats.as_ref()
    }

    /// Why the last recording was abandoned, if it was.
    pub fn recording_error(&self) -> Option<&RecordError> {
        self.recording_error.as_ref()
    }

    /// Start a full rotation cycle, recording into `recorder` if given.
    ///
    /// The recorder must already be recording. A recording that fails later
    /// is abandoned while the rotation runs to the end.
    pub fn play(&mut self, recorder: Option<Recorder>) {
        if matches!(self.state, PlayState::Stepping | PlayState::WaitingForFrame) {
            warn!("Already playing");
            return;
        }

        self.engine.reset();
        self.tracker.prepare(&mut self.chain);
        self.recording_rect = RecordingRect::default();
        self.captured_outlines = PixelRect::default();
        self.steps_since_capture = 0;
        self.finishing = false;
        self.step_time = Duration::ZERO;
        self.recording_error = None;
        self.stats = None;
        self.started = Some(Instant::now());

        self.surface.render(&self.chain, &mut self.tracker, true);
        self.last_refresh = Some(Instant::now());
        self.state = PlayState::Stepping;

        info!(
            "Play {} circles, {} steps",
            self.chain.len(),
            self.engine.cycle_steps()
        );

        match recorder {
            Some(recorder) if recorder.is_recording() => {
                let full = recorder.full_frame_rect();
                self.recorder = Some(recorder);
                self.capture(full);
            }
            Some(_) => warn!("Recorder not started, playing without recording"),
            None => {}
        }
    }

    /// One firing of the step timer.
    pub fn tick(&mut self) -> PlayState {
        match self.state {
            PlayState::Idle | PlayState::Done => {}
            PlayState::Stepping => self.step_batch(),
            PlayState::WaitingForFrame => {
                self.refresh_if_due();
                self.pump_recorder(self.config.refresh_interval());
            }
        }
        self.state
    }

    /// Tick until the cycle is complete.
    pub fn run(&mut self) -> Option<PlayerStats> {
        while matches!(self.state, PlayState::Stepping | PlayState::WaitingForFrame) {
            self.tick();
        }
        self.stats.clone()
    }

    /// Cancel playing. An unfinished recording is deleted.
    pub fn stop(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
        }
        if matches!(self.state, PlayState::Stepping | PlayState::WaitingForFrame) {
            info!("Play stopped after {} steps", self.engine.steps());
        }
        self.finishing = false;
        self.state = PlayState::Idle;
    }

    fn step_batch(&mut self) {
        let threshold = self.recorder.as_ref().map(|r| r.config().steps_per_frame);

        for _ in 0..self.config.steps_per_interval {
            let start = Instant::now();
            let done = self.engine.step(&mut self.chain, &mut self.tracker);
            self.step_time += start.elapsed();

            if let Some(recorder) = &self.recorder {
                self.recording_rect
                    .add(recorder.grabber().bounding_rectangle(&self.chain));
                self.steps_since_capture += 1;
            }

            if done {
                self.finish();
                return;
            }

            if threshold.is_some_and(|k| self.steps_since_capture >= k) {
                self.surface.render(&self.chain, &mut self.tracker, true);
                self.last_refresh = Some(Instant::now());
                let rect = self.recording_rect.take();
                if self.capture(rect) {
                    return;
                }
            }
        }

        self.refresh_if_due();
    }

    /// Hand a frame to the recorder; pauses stepping on success.
    fn capture(&mut self, rect: PixelRect) -> bool {
        let Some(recorder) = self.recorder.as_mut() else {
            return false;
        };
        let outlines = recorder.grabber().bounding_rectangle(&self.chain);
        match recorder.add_frame(self.surface.as_mut(), rect) {
            Ok(()) => {
                self.captured_outlines = outlines;
                self.steps_since_capture = 0;
                self.state = PlayState::WaitingForFrame;
                true
            }
            Err(e) => {
                self.fail_recording(e);
                false
            }
        }
    }

    fn pump_recorder(&mut self, timeout: Duration) {
        let outcome = match self.recorder.as_mut() {
            Some(recorder) if recorder.is_busy() => recorder.poll(timeout),
            _ => Some(Ok(())),
        };
        match outcome {
            None => {}
            Some(Ok(())) => self.frame_done(),
            Some(Err(e)) => {
                self.fail_recording(e);
                self.frame_done();
            }
        }
    }

    fn frame_done(&mut self) {
        if self.finishing {
            self.complete();
        } else {
            self.state = PlayState::Stepping;
        }
    }

    fn fail_recording(&mut self, err: RecordError) {
        warn!("Recording failed: {}", err);
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
        }
        self.recording_error = Some(err);
    }

    /// Close the lines, then take the closing frame without circle outlines.
    fn finish(&mut self) {
        self.finishing = true;
        self.tracker.force_draw_to_center(&mut self.chain);
        self.surface.render(&self.chain, &mut self.tracker, false);
        self.last_refresh = Some(Instant::now());

        // The previous frame still shows the outlines; paint over them.
        self.recording_rect.add(self.captured_outlines);
        let rect = self.recording_rect.take();
        if !self.capture(rect) {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let mut recording: Option<RecordingStats> = None;
        if let Some(mut recorder) = self.recorder.take() {
            match recorder.stop_recording(true) {
                Ok(stats) => recording = Some(stats),
                Err(e) => {
                    warn!("Cannot finish recording: {}", e);
                    self.recording_error = Some(e);
                }
            }
        }

        let steps = self.engine.steps();
        let stats = PlayerStats {
            elapsed: self.started.map(|t| t.elapsed()).unwrap_or_default(),
            steps,
            average_step_time: if steps > 0 {
                self.step_time.div_f64(steps as f64)
            } else {
                Duration::ZERO
            },
            frames: recording.as_ref().map_or(0, |r| r.frame_count),
            vertices: self.tracker.vertex_count(),
            segments: self.tracker.segment_count(),
            output_file: recording.map(|r| r.path),
            recording_error: self.recording_error.as_ref().map(ToString::to_string),
        };
        info!("Play finished: {}", stats);

        self.stats = Some(stats);
        self.finishing = false;
        self.state = PlayState::Done;
    }

    fn refresh_if_due(&mut self) {
        let now = Instant::now();
        let interval = self.config.refresh_interval();
        if self.last_refresh.is_none_or(|t| now.duration_since(t) >= interval) {
            self.surface
                .render(&self.chain, &mut self.tracker, !self.finishing);
            self.last_refresh = Some(now);
        }
    }

    /// Save the spiral cut rectangle as a PNG without circle outlines.
    pub fn save_image(
        &mut self,
        storage: &dyn Storage,
        suffix: &str,
        margin: u32,
    ) -> Result<PathBuf, RecordError> {
        let grabber =
            SceneGrabber::for_chain(&self.chain, self.surface.device_pixel_ratio(), margin);
        self.surface.render(&self.chain, &mut self.tracker, false);
        let pending = grabber.grab(self.surface.as_mut(), grabber.spiral_cut_rect())?;
        // Deferred surfaces deliver on the next pass.
        self.surface.render(&self.chain, &mut self.tracker, false);
        let image = pending.try_take().unwrap_or(Err(RecordError::GrabFailed))?;
        write_image(storage, &image, suffix)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if self.recorder.is_some() {
            self.stop();
        }
    }
}
