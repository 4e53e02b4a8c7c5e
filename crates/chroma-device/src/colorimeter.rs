//! The colorimeter orchestrator.
//!
//! [`Colorimeter`] owns every component of the pipeline and is the only
//! place where they meet. All methods run on the caller's thread; the
//! only cross-context signal is the [`AmbientFlag`], which an interrupt
//! handler may raise at any time and [`Colorimeter::tick`] consumes.
//!
//! # Scan pipeline
//!
//! ```text
//! optimize_sensor_settings ─> LED brightness search ─> quality burst
//!        ▲                                                   │
//!        └──────────── retry once if score < 50 ◄────────────┤
//!                                                            ▼
//!   white/black correction ─> calibration store (or naive) ─> sRGB
//! ```

use chroma_calib::{
    average_counts, load_references, save_references, CalibrationStats, CalibrationStore,
    CalibrationWorkflow, KeyValueStore, ReferencePoint, WorkflowEvent, WorkflowStatus,
};
use chroma_color::{
    correlated_color_temperature, naive_srgb, prepare_channels, xyz_to_xyy, CalibrationMode,
    IrThresholds, MatrixType,
};
use chroma_core::{
    adc, BlackCalibration, Error, LightingCondition, RawChannelData, SensorConfig,
    WhiteCalibration, DEFAULT_LED_BRIGHTNESS, LED_MAX_BRIGHTNESS, LED_MIN_BRIGHTNESS,
};
use chroma_sensor::{
    Adjustment, AmbientFlag, Clock, DynamicSensorController, Illumination, QualityEngine,
    QualityReading, RawChannelReader, SensorTransport, Watchdog,
};
#[cfg(any(test, feature = "sim"))]
use chroma_sensor::sim::SimRig;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::DeviceResult;
use crate::samples::{lookup_paint, ColorSample, PaintMatcher, SampleBuffer};
use crate::scan::{Consistency, ContinuousScan, ScanResult};

/// Indicator brightness used to show a measured colour.
pub const INDICATOR_BRIGHTNESS: u8 = DEFAULT_LED_BRIGHTNESS;

/// Hardware handed to a [`Colorimeter`].
pub struct Peripherals {
    /// Sensor register access.
    pub transport: Box<dyn SensorTransport>,
    /// Illumination LED and indicator.
    pub illumination: Box<dyn Illumination>,
    /// Time source for every delay in the pipeline.
    pub clock: Rc<dyn Clock>,
    /// Watchdog fed during long loops.
    pub watchdog: Box<dyn Watchdog>,
    /// Persistent key-value storage.
    pub storage: Box<dyn KeyValueStore>,
}

#[cfg(any(test, feature = "sim"))]
impl Peripherals {
    /// Handles onto a simulated rig.
    pub fn simulated(rig: &SimRig, storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            transport: Box::new(rig.transport()),
            illumination: Box::new(rig.illumination()),
            clock: Rc::new(rig.clock()),
            watchdog: Box::new(rig.watchdog()),
            storage,
        }
    }
}

/// Built-in reference patch sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferenceSet {
    /// 12 ColorChecker patches.
    ColorChecker,
    /// 7 primary paints.
    Primaries,
}

/// What one [`Colorimeter::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// An ambient-light event was consumed.
    pub ambient_event: bool,
    /// Calibration session progress.
    pub workflow: Option<WorkflowEvent>,
    /// Background sensor optimisation result.
    pub adjustment: Option<Adjustment>,
}

/// Device state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Live sensor configuration.
    pub sensor: SensorConfig,
    /// Lighting tier of the live configuration.
    pub lighting_condition: LightingCondition,
    /// Controller initialised.
    pub initialized: bool,
    /// At least one calibration matrix is valid.
    pub calibration_valid: bool,
    /// Dual-matrix blending enabled.
    pub dual_mode: bool,
    /// IR blend thresholds.
    pub ir_thresholds: IrThresholds,
    /// Origin of the low-IR matrix.
    pub low_ir_source: String,
    /// Origin of the high-IR matrix.
    pub high_ir_source: String,
    /// Last fit or evaluation.
    pub calibration_stats: CalibrationStats,
    /// Reference points held.
    pub reference_points: usize,
    /// Calibration session progress.
    pub workflow: WorkflowStatus,
    /// White reference available.
    pub white_valid: bool,
    /// Black reference available.
    pub black_valid: bool,
    /// Samples stored.
    pub sample_count: usize,
    /// LED held on by the user.
    pub led_manual: bool,
    /// Consecutive failed preset applications.
    pub adjustment_failures: u32,
    /// Last exhausted sensor read.
    pub last_sensor_error: Option<String>,
    /// Milliseconds since boot.
    pub uptime_ms: u64,
}

/// Top-level device: sensor, LED, calibration, session and samples.
pub struct Colorimeter {
    config: DeviceConfig,
    reader: RawChannelReader,
    controller: DynamicSensorController,
    quality: QualityEngine,
    led: Box<dyn Illumination>,
    watchdog: Box<dyn Watchdog>,
    storage: Box<dyn KeyValueStore>,
    store: CalibrationStore,
    workflow: CalibrationWorkflow,
    white: WhiteCalibration,
    black: BlackCalibration,
    samples: SampleBuffer,
    matcher: Option<Box<dyn PaintMatcher>>,
    ambient: Arc<AmbientFlag>,
    manual_led: Option<u8>,
    last_optimize_ms: u64,
    last_scan: Option<ScanResult>,
}

impl Colorimeter {
    /// Assembles a device. Nothing touches the hardware until
    /// [`initialize`](Self::initialize).
    pub fn new(config: DeviceConfig, hw: Peripherals) -> Self {
        let reader = RawChannelReader::with_config(hw.transport, hw.clock, config.reader);
        let controller =
            DynamicSensorController::with_config(config.controller, config.sensor.sensor_config());
        Self {
            reader,
            controller,
            quality: QualityEngine::new(config.quality),
            led: hw.illumination,
            watchdog: hw.watchdog,
            storage: hw.storage,
            store: CalibrationStore::new(),
            workflow: CalibrationWorkflow::new(config.workflow.clone()),
            white: WhiteCalibration::default(),
            black: BlackCalibration::default(),
            samples: SampleBuffer::new(config.sample_capacity),
            matcher: None,
            ambient: Arc::new(AmbientFlag::new()),
            manual_led: None,
            last_optimize_ms: 0,
            last_scan: None,
            config,
        }
    }

    /// Attaches a paint-match service.
    pub fn with_paint_matcher(mut self, matcher: Box<dyn PaintMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Replaces or removes the paint-match service.
    pub fn set_paint_matcher(&mut self, matcher: Option<Box<dyn PaintMatcher>>) {
        self.matcher = matcher;
    }

    /// Brings up the sensor and restores persisted calibration.
    ///
    /// A missing or unreadable calibration falls back to the factory
    /// matrices; only sensor failures are errors.
    pub fn initialize(&mut self) -> DeviceResult<()> {
        info!("initializing colorimeter");
        let sensor = self.config.sensor;
        self.reader
            .configure_auto_zero(sensor.auto_zero_mode, sensor.auto_zero_frequency)?;
        self.controller.initialize(&mut self.reader)?;
        self.led.set_led_brightness(0);

        match self.store.load(self.storage.as_ref()) {
            Ok(true) => info!(dual_mode = self.store.is_dual_mode(), "stored calibration restored"),
            Ok(false) => self.load_factory_calibration()?,
            Err(e) => {
                warn!(error = %e, "stored calibration unreadable");
                self.load_factory_calibration()?;
            }
        }

        let (white, black) = load_references(self.storage.as_ref());
        self.white = white;
        self.black = black;
        self.samples = SampleBuffer::load(self.storage.as_ref(), self.config.sample_capacity);
        self.last_optimize_ms = self.reader.now_ms();
        info!(
            white = self.white.valid,
            black = self.black.valid,
            calibrated = self.store.is_calibration_valid(),
            "colorimeter ready"
        );
        Ok(())
    }

    fn load_factory_calibration(&mut self) -> DeviceResult<()> {
        self.store.load_factory_defaults();
        let t = self.config.ir_thresholds;
        self.store.set_ir_thresholds(t.low, t.high)?;
        info!("factory calibration loaded");
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Milliseconds since boot.
    pub fn now_ms(&self) -> u64 {
        self.reader.now_ms()
    }

    /// Live sensor configuration.
    pub fn sensor_config(&self) -> &SensorConfig {
        self.controller.current_config()
    }

    /// Calibration matrices and reference points.
    pub fn calibration(&self) -> &CalibrationStore {
        &self.store
    }

    /// Stored white reference.
    pub fn white_reference(&self) -> &WhiteCalibration {
        &self.white
    }

    /// Stored black reference.
    pub fn black_reference(&self) -> &BlackCalibration {
        &self.black
    }

    /// Flag for the ambient-light interrupt handler.
    pub fn ambient_flag(&self) -> Arc<AmbientFlag> {
        Arc::clone(&self.ambient)
    }

    /// Most recent successful scan.
    pub fn last_scan(&self) -> Option<&ScanResult> {
        self.last_scan.as_ref()
    }

    // ---------------------------------------------------------------------
    // LED
    // ---------------------------------------------------------------------

    /// Holds the LED on at `level`, or releases it with `None`.
    ///
    /// While held, scans use this level instead of searching for one and
    /// leave the LED on afterwards.
    pub fn set_led_manual(&mut self, level: Option<u8>) {
        self.manual_led = level.map(|l| l.clamp(LED_MIN_BRIGHTNESS, LED_MAX_BRIGHTNESS));
        match self.manual_led {
            Some(l) => {
                self.led.set_led_brightness(l);
                info!(level = l, "LED held on");
            }
            None => {
                self.led.set_led_brightness(0);
                info!("LED released");
            }
        }
    }

    /// `true` while the LED is held on.
    pub fn is_led_manual(&self) -> bool {
        self.manual_led.is_some()
    }

    fn release_led(&mut self) {
        if self.manual_led.is_none() {
            self.led.set_led_brightness(0);
        }
    }

    // ---------------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------------

    /// Measures the surface in front of the sensor.
    ///
    /// The LED is switched off afterwards unless held on, and the indicator
    /// shows the measured colour.
    pub fn perform_scan(&mut self) -> DeviceResult<ScanResult> {
        let outcome = self.acquire().map(|(reading, brightness)| {
            let raw = reading.raw;
            let (rgb, calibrated, mode) = self.colorize(&raw);
            let xyy = xyz_to_xyy(calibrated);
            ScanResult {
                rgb,
                raw,
                calibrated,
                mode,
                quality: reading.quality,
                brightness,
                xyy,
                cct: correlated_color_temperature(xyy.x, xyy.y),
            }
        });
        self.release_led();

        let scan = outcome?;
        self.led.set_indicator_color(scan.rgb, INDICATOR_BRIGHTNESS);
        info!(
            rgb = ?scan.rgb,
            %scan.mode,
            quality = scan.quality.quality_score,
            brightness = scan.brightness,
            "scan complete"
        );
        self.last_scan = Some(scan.clone());
        Ok(scan)
    }

    /// Optimises the sensor and LED, then takes a scored burst.
    fn acquire(&mut self) -> DeviceResult<(QualityReading, u8)> {
        self.watchdog.feed();
        let adjustment = self.controller.optimize_sensor_settings(&mut self.reader)?;
        debug!(?adjustment, "pre-scan sensor optimisation");

        let brightness = match self.manual_led {
            Some(level) => {
                self.led.set_led_brightness(level);
                self.reader.delay_ms(self.config.led.stabilize_ms);
                level
            }
            None => {
                let start = self.controller.current_config().led_brightness;
                let outcome = self.controller.optimize_led_brightness(
                    &mut self.reader,
                    self.led.as_mut(),
                    &self.config.led,
                    start,
                )?;
                if !outcome.converged {
                    warn!(control = outcome.control, "LED brightness outside target window");
                }
                outcome.brightness
            }
        };

        self.watchdog.feed();
        let mut reading = self.quality.perform_quality_reading(&mut self.reader)?;
        if !reading.quality.is_acceptable() {
            warn!(
                score = reading.quality.quality_score,
                "poor reading quality, re-optimising and retrying"
            );
            self.controller.optimize_sensor_settings(&mut self.reader)?;
            self.watchdog.feed();
            reading = self.quality.perform_quality_reading(&mut self.reader)?;
        }
        Ok((reading, brightness))
    }

    /// Corrects and converts a capture.
    ///
    /// Without a white reference, or without a usable matrix, the counts
    /// take the naive conversion and the result is marked uncalibrated.
    fn colorize(&self, raw: &RawChannelData) -> ([u8; 3], [f32; 3], CalibrationMode) {
        let (channels, mode) = prepare_channels(raw, &self.white, &self.black);
        if mode == CalibrationMode::Uncalibrated {
            debug!("no white reference, using naive conversion");
            return (naive_srgb(raw.xyz()), channels, mode);
        }
        if !self.store.is_calibration_valid() {
            warn!("no valid calibration matrix, using naive conversion");
            return (naive_srgb(raw.xyz()), channels, CalibrationMode::Uncalibrated);
        }
        match self.store.convert(channels, raw) {
            Ok(rgb) => (rgb, channels, mode),
            Err(e) => {
                warn!(error = %e, "calibrated conversion failed, using naive conversion");
                (naive_srgb(raw.xyz()), channels, CalibrationMode::Uncalibrated)
            }
        }
    }

    /// Reads repeatedly for the configured window and reports how stable
    /// the surface reads.
    pub fn continuous_scan(&mut self) -> DeviceResult<ContinuousScan> {
        let cfg = self.config.continuous;
        let brightness = self
            .manual_led
            .unwrap_or(self.controller.current_config().led_brightness);
        self.led.set_led_brightness(brightness);
        self.reader.delay_ms(self.config.led.stabilize_ms);

        info!(duration_ms = cfg.duration_ms, max = cfg.max_readings, "continuous scan");
        let start = self.reader.now_ms();
        let mut readings = Vec::with_capacity(cfg.max_readings);
        for _ in 0..cfg.max_readings {
            if self.reader.now_ms().saturating_sub(start) >= cfg.duration_ms {
                break;
            }
            let raw = self.reader.read();
            self.watchdog.feed();
            if raw.valid {
                readings.push(raw);
            }
            self.reader.delay_ms(cfg.interval_ms);
        }
        let duration_ms = self.reader.now_ms().saturating_sub(start);
        self.release_led();

        if readings.is_empty() {
            return Err(Error::invalid_state("continuous scan collected no valid readings").into());
        }

        let (channels, max_variation_pct) = ContinuousScan::summarize(&readings);
        let mut result = ContinuousScan {
            readings: readings.len(),
            duration_ms,
            channels,
            max_variation_pct,
            consistency: Consistency::from_variation(max_variation_pct),
            rgb: [0; 3],
            mode: CalibrationMode::Uncalibrated,
        };
        let (rgb, _, mode) = self.colorize(&result.mean_capture());
        result.rgb = rgb;
        result.mode = mode;

        info!(
            readings = result.readings,
            variation = result.max_variation_pct,
            %result.consistency,
            "continuous scan complete"
        );
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Calibration session
    // ---------------------------------------------------------------------

    /// Starts a white/black calibration session.
    ///
    /// `brightness` defaults to the live LED level.
    pub fn start_calibration(&mut self, brightness: Option<u8>) -> DeviceResult<()> {
        let level = brightness.unwrap_or(self.controller.current_config().led_brightness);
        self.workflow.start(level, self.reader.now_ms())?;
        Ok(())
    }

    /// Session progress.
    pub fn calibration_status(&self) -> WorkflowStatus {
        self.workflow.status(self.reader.now_ms())
    }

    /// Captures and validates the white reference.
    pub fn submit_white_scan(&mut self) -> DeviceResult<WhiteCalibration> {
        self.workflow.begin_white_scan()?;
        let brightness = self.workflow.brightness();
        self.led.set_led_brightness(brightness);
        self.reader.delay_ms(self.workflow.config().led_stabilize_ms);
        let counts = self.collect_reference(self.workflow.config().white_readings);
        self.release_led();

        let [x, y, z, ir, _] = match counts {
            Ok(c) => c,
            Err(e) => {
                self.workflow.fail(format!("White calibration failed: {e}"));
                return Err(e);
            }
        };
        let white = WhiteCalibration {
            x,
            y,
            z,
            ir,
            brightness,
            ..Default::default()
        };
        Ok(self.workflow.complete_white_scan(white, self.reader.now_ms())?)
    }

    /// Confirms the black reference is in place and starts its countdown.
    pub fn confirm_black(&mut self) -> DeviceResult<()> {
        self.workflow.confirm_black(self.reader.now_ms())?;
        Ok(())
    }

    /// Captures and validates the black reference with the LED off.
    pub fn submit_black_scan(&mut self) -> DeviceResult<BlackCalibration> {
        self.workflow.begin_black_scan()?;
        self.led.set_led_brightness(0);
        self.reader.delay_ms(self.workflow.config().led_stabilize_ms);
        let counts = self.collect_reference(self.workflow.config().black_readings);
        if let Some(level) = self.manual_led {
            self.led.set_led_brightness(level);
        }

        let [x, y, z, ir, _] = match counts {
            Ok(c) => c,
            Err(e) => {
                self.workflow.fail(format!("Black calibration failed: {e}"));
                return Err(e);
            }
        };
        let black = BlackCalibration {
            x,
            y,
            z,
            ir,
            ..Default::default()
        };
        Ok(self.workflow.complete_black_scan(black, self.reader.now_ms())?)
    }

    /// Averages `count` readings after checking the sensor status.
    fn collect_reference(&mut self, count: usize) -> DeviceResult<[u16; 5]> {
        self.reader.delay_ms(self.workflow.config().sensor_stabilize_ms);
        let status = self.reader.status()?;
        if status & adc::STATUS_ERROR != 0 {
            return Err(Error::invalid_state(format!("sensor reports error status 0x{status:02x}")).into());
        }

        let interval = self.workflow.config().reading_interval_ms;
        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            self.reader.delay_ms(interval);
            let raw = self.reader.read();
            self.watchdog.feed();
            if raw.valid {
                debug!(reading = i, x = raw.r, y = raw.g, z = raw.b, ir = raw.ir, "reference reading");
                samples.push(raw);
            } else {
                warn!(reading = i, "reference reading failed");
            }
        }
        average_counts(&samples).ok_or_else(|| Error::SensorNotInitialized.into())
    }

    /// Persists the session's references and makes them active.
    pub fn save_calibration(&mut self) -> DeviceResult<()> {
        self.workflow.begin_save()?;
        let white = *self.workflow.white();
        let black = *self.workflow.black();
        let outcome = save_references(self.storage.as_mut(), &white, &black);
        self.workflow.finish_save(&outcome);
        outcome?;
        self.white = white;
        self.black = black;
        info!(white = white.valid, black = black.valid, "calibration references active");
        Ok(())
    }

    /// Abandons the session. Stored references are untouched.
    pub fn cancel_calibration(&mut self) {
        self.workflow.cancel();
        self.release_led();
    }

    /// Clears the stored white and black references.
    pub fn clear_references(&mut self) -> DeviceResult<()> {
        self.white = WhiteCalibration::default();
        self.black = BlackCalibration::default();
        save_references(self.storage.as_mut(), &self.white, &self.black)?;
        info!("white and black references cleared");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Matrix calibration
    // ---------------------------------------------------------------------

    /// Captures a corrected reading for a reference patch.
    ///
    /// Reference points hold white/black corrected counts so a fitted
    /// matrix sees the same input as a scan.
    fn capture_corrected(&mut self) -> DeviceResult<RawChannelData> {
        let acquired = self.acquire();
        self.release_led();
        let (reading, _) = acquired?;
        let raw = reading.raw;
        let (channels, _) = prepare_channels(&raw, &self.white, &self.black);
        let [x, y, z] = channels.map(|c| c.round().clamp(0.0, adc::FULL_SCALE as f32) as u16);
        let mut corrected = RawChannelData::new(x, y, z, raw.ir).at(raw.timestamp_ms);
        corrected.ir2 = raw.ir2;
        Ok(corrected)
    }

    /// Measures the patch in front of the sensor as a new reference point.
    pub fn capture_reference(&mut self, reference: [u8; 3], name: &str) -> DeviceResult<usize> {
        let raw = self.capture_corrected()?;
        Ok(self.store.add_reference_point(reference, &raw, name)?)
    }

    /// Measures the patch for a loaded reference point.
    pub fn measure_reference(&mut self, index: usize) -> DeviceResult<()> {
        let raw = self.capture_corrected()?;
        self.store.measure_reference(index, &raw)?;
        Ok(())
    }

    /// Replaces the reference points with a built-in set.
    pub fn load_reference_set(&mut self, set: ReferenceSet) -> usize {
        match set {
            ReferenceSet::ColorChecker => self.store.load_color_checker_references(),
            ReferenceSet::Primaries => self.store.load_primary_references(),
        }
    }

    /// Reference points in insertion order.
    pub fn reference_points(&self) -> &[ReferencePoint] {
        self.store.reference_points()
    }

    /// Drops every reference point.
    pub fn clear_reference_points(&mut self) {
        self.store.clear_reference_points();
    }

    /// Fits the matrix of type `ty` and persists the calibration.
    pub fn fit_matrix(&mut self, ty: MatrixType) -> DeviceResult<CalibrationStats> {
        let now = self.reader.now_ms();
        let stats = self.store.compute_matrix(ty, now)?;
        self.store.save(self.storage.as_mut(), now)?;
        Ok(stats)
    }

    /// Scores the active calibration against the reference points.
    pub fn evaluate_calibration(&mut self) -> CalibrationStats {
        self.store.evaluate_calibration()
    }

    /// Enables or disables IR blending and persists the choice.
    pub fn set_dual_matrix_mode(&mut self, enable: bool) -> DeviceResult<()> {
        self.store.enable_dual_matrix_mode(enable)?;
        self.store.save(self.storage.as_mut(), self.reader.now_ms())?;
        Ok(())
    }

    /// Sets and persists the IR blend thresholds.
    pub fn set_ir_thresholds(&mut self, low: f32, high: f32) -> DeviceResult<()> {
        self.store.set_ir_thresholds(low, high)?;
        self.store.save(self.storage.as_mut(), self.reader.now_ms())?;
        Ok(())
    }

    /// Restores and persists the factory matrices.
    pub fn reset_calibration(&mut self) -> DeviceResult<()> {
        self.load_factory_calibration()?;
        self.store.save(self.storage.as_mut(), self.reader.now_ms())?;
        Ok(())
    }

    /// Calibration as pretty-printed JSON.
    pub fn export_calibration(&self) -> DeviceResult<String> {
        Ok(self.store.export_json(self.reader.now_ms())?)
    }

    // ---------------------------------------------------------------------
    // Samples
    // ---------------------------------------------------------------------

    /// Stores a colour with its paint match and persists the samples.
    ///
    /// A failing paint-match service does not fail the save.
    pub fn save_sample(&mut self, rgb: [u8; 3]) -> DeviceResult<ColorSample> {
        let paint = lookup_paint(&mut self.matcher, rgb);
        let sample = ColorSample {
            rgb,
            paint,
            timestamp_ms: self.reader.now_ms(),
        };
        self.samples.push(sample.clone());
        self.samples.save(self.storage.as_mut())?;
        info!(?rgb, paint = %sample.paint.name, count = self.samples.len(), "sample saved");
        Ok(sample)
    }

    /// Stored samples, newest first.
    pub fn samples(&self) -> impl Iterator<Item = &ColorSample> {
        self.samples.iter()
    }

    /// Number of stored samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Removes the sample at `index`, newest first.
    pub fn delete_sample(&mut self, index: usize) -> DeviceResult<ColorSample> {
        let removed = self.samples.remove(index)?;
        self.samples.save(self.storage.as_mut())?;
        info!(index, rgb = ?removed.rgb, "sample deleted");
        Ok(removed)
    }

    /// Drops every sample.
    pub fn clear_samples(&mut self) -> DeviceResult<()> {
        self.samples.clear();
        self.samples.save(self.storage.as_mut())?;
        info!("samples cleared");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Main loop
    // ---------------------------------------------------------------------

    /// One control-loop iteration.
    ///
    /// Feeds the watchdog, consumes the ambient flag, advances the session
    /// and runs the background sensor optimisation when it is due. An
    /// ambient event makes the optimisation due immediately. The
    /// optimisation is paused while a session is in progress.
    pub fn tick(&mut self) -> TickReport {
        self.watchdog.feed();
        let now = self.reader.now_ms();
        let mut report = TickReport::default();

        if self.ambient.take() {
            info!("ambient light threshold crossed");
            report.ambient_event = true;
        }

        report.workflow = self.workflow.tick(now);
        if report.workflow == Some(WorkflowEvent::TimedOut) {
            self.release_led();
        }

        let due = report.ambient_event
            || now.saturating_sub(self.last_optimize_ms) >= self.config.optimize_interval_ms;
        if due && self.controller.is_initialized() && !self.workflow.is_in_progress() {
            self.last_optimize_ms = now;
            match self.controller.optimize_sensor_settings(&mut self.reader) {
                Ok(adjustment) => report.adjustment = Some(adjustment),
                Err(e) => warn!(error = %e, "background sensor optimisation failed"),
            }
        }
        report
    }

    /// Returns the sensor to its start-up configuration.
    pub fn reset_sensor(&mut self) -> DeviceResult<()> {
        self.controller.reset(&mut self.reader)?;
        Ok(())
    }

    /// Current device state.
    pub fn diagnostics(&self) -> Diagnostics {
        let sensor = *self.controller.current_config();
        Diagnostics {
            sensor,
            lighting_condition: sensor.lighting_condition,
            initialized: self.controller.is_initialized(),
            calibration_valid: self.store.is_calibration_valid(),
            dual_mode: self.store.is_dual_mode(),
            ir_thresholds: self.store.ir_thresholds(),
            low_ir_source: self.store.matrix(MatrixType::LowIr).source.clone(),
            high_ir_source: self.store.matrix(MatrixType::HighIr).source.clone(),
            calibration_stats: self.store.last_stats(),
            reference_points: self.store.reference_points().len(),
            workflow: self.calibration_status(),
            white_valid: self.white.valid,
            black_valid: self.black.valid,
            sample_count: self.samples.len(),
            led_manual: self.manual_led.is_some(),
            adjustment_failures: self.controller.adjustment_failures(),
            last_sensor_error: self.reader.last_error().map(ToString::to_string),
            uptime_ms: self.reader.now_ms(),
        }
    }
}
