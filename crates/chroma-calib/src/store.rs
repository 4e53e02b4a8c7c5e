//! Dual-matrix calibration store.
//!
//! [`CalibrationStore`] owns the low-IR and high-IR matrices, the blend
//! thresholds and the reference points used to fit new matrices. It picks
//! the conversion path for every capture:
//!
//! ```text
//! dual mode, both valid, same kind  ->  smoothstep blend of low and high
//! low valid                          ->  low only
//! high valid                         ->  high only
//! neither                            ->  InvalidMatrix (caller falls back)
//! ```
//!
//! Matrices fitted by [`compute_matrix`](CalibrationStore::compute_matrix)
//! map `[R, G, B, 1]` straight to display sRGB; factory matrices map
//! `[R, G, B, IR]` to CIE XYZ. See [`MatrixKind`].

use chroma_color::delta_e::{ACCEPTABLE_DELTA_E, EXCELLENT_DELTA_E};
use chroma_color::{
    apply_smooth_step_blending, delta_e, validate_matrix, CalibrationMatrix, DeltaEMethod,
    IrThresholds, MatrixKind, MatrixType,
};
use chroma_core::{adc, Error, RawChannelData};
use chroma_math::{LeastSquares, Mat4};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CalibError, CalibResult};
use crate::kv::KeyValueStore;
use crate::references::{
    patch_set, ReferencePoint, COLOR_CHECKER, MAX_REFERENCE_POINTS, MIN_FIT_POINTS, PRIMARIES,
    RECOMMENDED_FIT_POINTS,
};

/// Storage keys.
pub mod keys {
    /// Dual-mode flag.
    pub const DUAL_MODE: &str = "dual_mode";
    /// Set when at least one matrix was saved.
    pub const CAL_VALID: &str = "cal_valid";
    /// Save time.
    pub const CAL_TIMESTAMP: &str = "cal_timestamp";
    /// Lower IR threshold.
    pub const IR_LOW: &str = "ir_low";
    /// Upper IR threshold.
    pub const IR_HIGH: &str = "ir_high";

    /// `<type>_matrix`, `<type>_scale` or `<type>_kind`.
    pub fn matrix_key(ty: chroma_color::MatrixType, field: &str) -> String {
        format!("{}_{field}", ty.name())
    }
}

/// Summary of a calibration evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationStats {
    /// Reference points considered.
    pub total_points: usize,
    /// Mean Delta-E over evaluated points.
    pub mean_delta_e: f32,
    /// Population standard deviation of Delta-E.
    pub std_delta_e: f32,
    /// Worst Delta-E.
    pub max_delta_e: f32,
    /// Points with Delta-E below 2.
    pub points_under_2: usize,
    /// Points with Delta-E below 5.
    pub points_under_5: usize,
    /// 0 to 100, weighted toward the excellent bucket.
    pub quality_score: f32,
    /// `true` if a valid matrix was available.
    pub matrix_valid: bool,
}

impl CalibrationStats {
    fn from_delta_es(total_points: usize, values: &[f32]) -> Self {
        let mut stats = Self {
            total_points,
            matrix_valid: true,
            ..Default::default()
        };
        if values.is_empty() {
            return stats;
        }

        let n = values.len() as f32;
        let sum: f32 = values.iter().sum();
        let sum_sq: f32 = values.iter().map(|v| v * v).sum();
        stats.mean_delta_e = sum / n;
        if values.len() > 1 {
            let variance = sum_sq / n - stats.mean_delta_e * stats.mean_delta_e;
            stats.std_delta_e = variance.max(0.0).sqrt();
        }
        stats.max_delta_e = values.iter().copied().fold(0.0, f32::max);
        stats.points_under_2 = values.iter().filter(|&&v| v < EXCELLENT_DELTA_E).count();
        stats.points_under_5 = values.iter().filter(|&&v| v < ACCEPTABLE_DELTA_E).count();

        let excellent = stats.points_under_2 as f32 / n;
        let acceptable = stats.points_under_5 as f32 / n;
        stats.quality_score = ((excellent * 100.0 + acceptable * 50.0) / 1.5).min(100.0);
        stats
    }
}

/// JSON export document.
#[derive(Debug, Serialize)]
struct Export<'a> {
    version: &'static str,
    device: &'static str,
    timestamp_ms: u64,
    low_ir: Option<&'a CalibrationMatrix>,
    high_ir: Option<&'a CalibrationMatrix>,
    dual_mode: bool,
    ir_thresholds: IrThresholds,
    reference_points: &'a [ReferencePoint],
    statistics: CalibrationStats,
}

/// Dual-matrix calibration state.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    low: CalibrationMatrix,
    high: CalibrationMatrix,
    dual_mode: bool,
    thresholds: IrThresholds,
    references: Vec<ReferencePoint>,
    last_stats: CalibrationStats,
}

impl CalibrationStore {
    /// Creates an empty store with no valid matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated with the factory matrices.
    pub fn with_factory_defaults() -> Self {
        let mut store = Self::new();
        store.load_factory_defaults();
        store
    }

    /// Replaces both matrices with the factory tables and enables dual mode.
    pub fn load_factory_defaults(&mut self) {
        self.low = CalibrationMatrix::factory(MatrixType::LowIr);
        self.high = CalibrationMatrix::factory(MatrixType::HighIr);
        self.dual_mode = true;
        info!("loaded factory calibration matrices");
    }

    /// Matrix of the given type.
    pub fn matrix(&self, ty: MatrixType) -> &CalibrationMatrix {
        match ty {
            MatrixType::LowIr => &self.low,
            MatrixType::HighIr => &self.high,
        }
    }

    fn matrix_mut(&mut self, ty: MatrixType) -> &mut CalibrationMatrix {
        match ty {
            MatrixType::LowIr => &mut self.low,
            MatrixType::HighIr => &mut self.high,
        }
    }

    /// Installs a matrix after checking every entry is finite.
    pub fn set_calibration_matrix(
        &mut self,
        ty: MatrixType,
        matrix: Mat4,
        kind: MatrixKind,
        timestamp_ms: u64,
    ) -> CalibResult<()> {
        validate_matrix(&matrix)?;
        let scale = self.matrix(ty).scale;
        *self.matrix_mut(ty) = CalibrationMatrix {
            timestamp_ms,
            ..CalibrationMatrix::new(matrix, kind, format!("custom_{ty}")).with_scale(scale)
        };
        info!(%ty, ?kind, "calibration matrix set");
        Ok(())
    }

    /// Sets the output scale factors `[kX, kY, kZ]`.
    pub fn set_scaling_factors(&mut self, ty: MatrixType, scale: [f32; 3]) -> CalibResult<()> {
        if scale.iter().any(|k| !k.is_finite()) {
            return Err(Error::invalid_matrix(format!("non-finite scaling factors {scale:?}")).into());
        }
        self.matrix_mut(ty).scale = scale;
        debug!(%ty, ?scale, "scaling factors set");
        Ok(())
    }

    /// Enables or disables blending. Enabling requires both matrices valid.
    pub fn enable_dual_matrix_mode(&mut self, enable: bool) -> CalibResult<()> {
        if enable && !(self.low.valid && self.high.valid) {
            return Err(Error::invalid_matrix("dual mode needs both matrices valid").into());
        }
        self.dual_mode = enable;
        info!(enable, "dual matrix mode");
        Ok(())
    }

    /// `true` if blending is enabled.
    pub fn is_dual_mode(&self) -> bool {
        self.dual_mode
    }

    /// Sets the blend thresholds, requiring `0 <= low < high <= 1`.
    pub fn set_ir_thresholds(&mut self, low: f32, high: f32) -> CalibResult<()> {
        self.thresholds = IrThresholds::new(low, high)?;
        debug!(low, high, "IR thresholds set");
        Ok(())
    }

    /// Current blend thresholds.
    pub fn ir_thresholds(&self) -> IrThresholds {
        self.thresholds
    }

    /// Blend weight toward the high-IR matrix for a capture.
    pub fn ir_weight(&self, raw: &RawChannelData) -> f32 {
        self.thresholds.weight(chroma_color::ir_ratio(raw))
    }

    /// `true` if at least one matrix is valid.
    pub fn is_calibration_valid(&self) -> bool {
        self.low.valid || self.high.valid
    }

    /// Applies the active conversion path to normalised tristimulus counts.
    ///
    /// `channels` are the (possibly white/black corrected) X/Y/Z counts;
    /// `raw` supplies IR and the blend ratio. Returns the matrix output and
    /// its kind.
    pub fn apply(
        &self,
        channels: [f32; 3],
        raw: &RawChannelData,
    ) -> CalibResult<([f32; 3], MatrixKind)> {
        let ir = raw.ir as f32;
        if self.dual_mode && self.low.valid && self.high.valid && self.low.kind == self.high.kind {
            let kind = self.low.kind;
            let input = kind.input(channels, ir);
            let out = apply_smooth_step_blending(input, raw, &self.low, &self.high, &self.thresholds)?;
            return Ok((out, kind));
        }

        let m = if self.low.valid {
            &self.low
        } else if self.high.valid {
            &self.high
        } else {
            return Err(Error::invalid_matrix("no valid calibration matrix").into());
        };
        Ok((m.apply(m.kind.input(channels, ir))?, m.kind))
    }

    /// Calibrated output for a capture without white/black correction.
    ///
    /// For tristimulus matrices this is CIE XYZ.
    pub fn calibrated_xyz(&self, raw: &RawChannelData) -> CalibResult<[f32; 3]> {
        Ok(self.apply(raw.xyz().map(f32::from), raw)?.0)
    }

    /// Converts normalised counts to 8-bit sRGB.
    pub fn convert(&self, channels: [f32; 3], raw: &RawChannelData) -> CalibResult<[u8; 3]> {
        let (out, kind) = self.apply(channels, raw)?;
        Ok(kind.to_srgb(out))
    }

    /// Converts a capture to 8-bit sRGB without white/black correction.
    pub fn apply_calibrated_conversion(&self, raw: &RawChannelData) -> CalibResult<[u8; 3]> {
        self.convert(raw.xyz().map(f32::from), raw)
    }

    /// Adds a measured reference point and returns its index.
    ///
    /// When a calibration is active the live RGB Delta-E of the current
    /// prediction is recorded on the point.
    pub fn add_reference_point(
        &mut self,
        reference: [u8; 3],
        raw: &RawChannelData,
        name: &str,
    ) -> CalibResult<usize> {
        if self.references.len() >= MAX_REFERENCE_POINTS {
            return Err(CalibError::ReferenceSetFull {
                capacity: MAX_REFERENCE_POINTS,
            });
        }
        let mut point = ReferencePoint::new(reference, name);
        point.record(raw)?;
        if let Ok(predicted) = self.apply_calibrated_conversion(raw) {
            point.delta_e = delta_e(predicted, reference, DeltaEMethod::Rgb);
        }
        info!(
            index = self.references.len(),
            name,
            ?reference,
            sensor = ?point.sensor,
            delta_e = point.delta_e,
            "reference point added"
        );
        self.references.push(point);
        Ok(self.references.len() - 1)
    }

    /// Fills in the measurement of a loaded reference patch.
    pub fn measure_reference(&mut self, index: usize, raw: &RawChannelData) -> CalibResult<()> {
        let count = self.references.len();
        let point = self
            .references
            .get_mut(index)
            .ok_or(CalibError::NoSuchReference { index, count })?;
        point.record(raw)?;
        debug!(index, name = %point.name, sensor = ?point.sensor, "reference measured");
        Ok(())
    }

    /// Drops every reference point and the last statistics.
    pub fn clear_reference_points(&mut self) {
        self.references.clear();
        self.last_stats = CalibrationStats::default();
        info!("reference points cleared");
    }

    /// Reference points in insertion order.
    pub fn reference_points(&self) -> &[ReferencePoint] {
        &self.references
    }

    /// Replaces the reference points with the 12 ColorChecker patches.
    pub fn load_color_checker_references(&mut self) -> usize {
        self.load_patch_set(&COLOR_CHECKER)
    }

    /// Replaces the reference points with the 7 primary paints.
    pub fn load_primary_references(&mut self) -> usize {
        self.load_patch_set(&PRIMARIES)
    }

    fn load_patch_set(&mut self, table: &[([u8; 3], &str)]) -> usize {
        self.clear_reference_points();
        self.references = patch_set(table);
        info!(count = self.references.len(), "reference patches loaded");
        self.references.len()
    }

    /// Fits a `[R, G, B, 1] -> sRGB` matrix to the measured reference points.
    ///
    /// The fitted matrix replaces the matrix of type `ty` and is evaluated
    /// on the same points; its quality score comes from that evaluation.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientCalibrationData`] with fewer than 4 measured points
    /// - [`Error::SingularSystem`] when the points do not span the space
    pub fn compute_matrix(&mut self, ty: MatrixType, timestamp_ms: u64) -> CalibResult<CalibrationStats> {
        let measured: Vec<&ReferencePoint> = self.references.iter().filter(|p| p.measured).collect();
        if measured.len() < MIN_FIT_POINTS {
            return Err(Error::insufficient_points(measured.len(), MIN_FIT_POINTS).into());
        }
        if measured.len() < RECOMMENDED_FIT_POINTS {
            warn!(points = measured.len(), "fitting with fewer than {RECOMMENDED_FIT_POINTS} points");
        }

        let fs = adc::FULL_SCALE as f32;
        let mut ls = LeastSquares::new();
        for p in &measured {
            let input = [p.sensor[0] as f32 / fs, p.sensor[1] as f32 / fs, p.sensor[2] as f32 / fs];
            let target = p.reference.map(|c| c as f32 / 255.0);
            ls.add(input, target);
        }
        let rows = ls.solve()?;
        let matrix = Mat4::from_rows([rows[0], rows[1], rows[2], Mat4::HOMOGENEOUS_ROW]);
        validate_matrix(&matrix)?;

        let mut fitted = CalibrationMatrix::new(matrix, MatrixKind::DisplayRgb, format!("fit_{ty}"));
        fitted.timestamp_ms = timestamp_ms;

        let predictions: Vec<Option<[u8; 3]>> = self
            .references
            .iter()
            .map(|p| {
                p.measured
                    .then(|| fitted.apply_raw(&p.capture()).ok().map(|out| fitted.kind.to_srgb(out)))
                    .flatten()
            })
            .collect();
        let stats = self.score_predictions(&predictions);
        fitted.quality_score = stats.quality_score;

        info!(
            %ty,
            points = ls.len(),
            mean_delta_e = stats.mean_delta_e,
            max_delta_e = stats.max_delta_e,
            quality = stats.quality_score,
            "matrix fitted"
        );
        *self.matrix_mut(ty) = fitted;
        Ok(stats)
    }

    /// Scores the active conversion path against every measured point.
    ///
    /// Delta-E is computed in CIE LAB.
    pub fn evaluate_calibration(&mut self) -> CalibrationStats {
        if self.references.is_empty() || !self.is_calibration_valid() {
            return CalibrationStats {
                total_points: self.references.len(),
                ..Default::default()
            };
        }
        let predictions: Vec<Option<[u8; 3]>> = self
            .references
            .iter()
            .map(|p| {
                p.measured
                    .then(|| self.apply_calibrated_conversion(&p.capture()).ok())
                    .flatten()
            })
            .collect();
        let stats = self.score_predictions(&predictions);
        debug!(?stats, "calibration evaluated");
        stats
    }

    fn score_predictions(&mut self, predictions: &[Option<[u8; 3]>]) -> CalibrationStats {
        let mut values = Vec::with_capacity(predictions.len());
        for (point, predicted) in self.references.iter_mut().zip(predictions) {
            if let Some(rgb) = predicted {
                point.delta_e = delta_e(*rgb, point.reference, DeltaEMethod::Lab);
                values.push(point.delta_e);
            }
        }
        let stats = CalibrationStats::from_delta_es(self.references.len(), &values);
        self.last_stats = stats;
        stats
    }

    /// Statistics of the last fit or evaluation.
    pub fn last_stats(&self) -> CalibrationStats {
        self.last_stats
    }

    /// Persists valid matrices, scales, kinds, thresholds and dual mode.
    ///
    /// Keys of invalid matrices are removed so stale data cannot return.
    pub fn save(&self, kv: &mut dyn KeyValueStore, timestamp_ms: u64) -> CalibResult<()> {
        for ty in MatrixType::ALL {
            let m = self.matrix(ty);
            let (mk, sk, kk) = (
                keys::matrix_key(ty, "matrix"),
                keys::matrix_key(ty, "scale"),
                keys::matrix_key(ty, "kind"),
            );
            if m.valid {
                kv.put_bytes(&mk, &m.matrix.to_bytes())?;
                let scale: Vec<u8> = m.scale.iter().flat_map(|k| k.to_le_bytes()).collect();
                kv.put_bytes(&sk, &scale)?;
                kv.put_text(&kk, kind_name(m.kind))?;
            } else {
                kv.remove(&mk)?;
                kv.remove(&sk)?;
                kv.remove(&kk)?;
            }
        }
        kv.put_bool(keys::DUAL_MODE, self.dual_mode)?;
        kv.put_f32(keys::IR_LOW, self.thresholds.low)?;
        kv.put_f32(keys::IR_HIGH, self.thresholds.high)?;
        kv.put_bool(keys::CAL_VALID, self.is_calibration_valid())?;
        kv.put_u64(keys::CAL_TIMESTAMP, timestamp_ms)?;
        info!(dual_mode = self.dual_mode, "calibration saved");
        Ok(())
    }

    /// Restores a saved calibration.
    ///
    /// Returns `Ok(false)` when nothing valid is stored; the caller keeps
    /// (or loads) the factory defaults. Matrices that are missing or
    /// malformed in storage are left as they were.
    pub fn load(&mut self, kv: &dyn KeyValueStore) -> CalibResult<bool> {
        if !kv.get_bool(keys::CAL_VALID, false) {
            info!("no stored calibration");
            return Ok(false);
        }

        for ty in MatrixType::ALL {
            let Some(matrix) = kv
                .get_bytes(&keys::matrix_key(ty, "matrix"))
                .and_then(|b| Mat4::from_bytes(&b))
            else {
                continue;
            };
            let Some(scale) = kv
                .get_bytes(&keys::matrix_key(ty, "scale"))
                .and_then(|b| scale_from_bytes(&b))
            else {
                warn!(%ty, "stored matrix has no scaling factors");
                continue;
            };
            if let Err(e) = validate_matrix(&matrix) {
                warn!(%ty, error = %e, "stored matrix rejected");
                continue;
            }
            let kind = kv
                .get_text(&keys::matrix_key(ty, "kind"))
                .and_then(|k| kind_from_name(&k))
                .unwrap_or_default();
            let timestamp_ms = kv.get_u64(keys::CAL_TIMESTAMP, 0);
            *self.matrix_mut(ty) = CalibrationMatrix {
                timestamp_ms,
                ..CalibrationMatrix::new(matrix, kind, format!("stored_{ty}")).with_scale(scale)
            };
            info!(%ty, ?kind, "matrix loaded");
        }

        if let Ok(t) = IrThresholds::new(
            kv.get_f32(keys::IR_LOW, self.thresholds.low),
            kv.get_f32(keys::IR_HIGH, self.thresholds.high),
        ) {
            self.thresholds = t;
        }
        self.dual_mode = kv.get_bool(keys::DUAL_MODE, false) && self.low.valid && self.high.valid;
        Ok(self.is_calibration_valid())
    }

    /// Serialises matrices, thresholds, reference points and statistics.
    pub fn export_json(&self, timestamp_ms: u64) -> CalibResult<String> {
        let doc = Export {
            version: "1.0",
            device: "TCS3430",
            timestamp_ms,
            low_ir: self.low.valid.then_some(&self.low),
            high_ir: self.high.valid.then_some(&self.high),
            dual_mode: self.dual_mode,
            ir_thresholds: self.thresholds,
            reference_points: &self.references,
            statistics: self.last_stats,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

fn kind_name(kind: MatrixKind) -> &'static str {
    match kind {
        MatrixKind::Tristimulus => "tristimulus",
        MatrixKind::DisplayRgb => "display_rgb",
    }
}

fn kind_from_name(name: &str) -> Option<MatrixKind> {
    match name {
        "tristimulus" => Some(MatrixKind::Tristimulus),
        "display_rgb" => Some(MatrixKind::DisplayRgb),
        _ => None,
    }
}

fn scale_from_bytes(bytes: &[u8]) -> Option<[f32; 3]> {
    if bytes.len() != 12 {
        return None;
    }
    let mut out = [0.0; 3];
    for (v, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(out)
}
