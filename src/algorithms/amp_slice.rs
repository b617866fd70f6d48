use super::envelope::{Follower, HighPass};
use super::{amp_to_db, CHUNK_SIZE};
use crate::params::ParamSpec;
use crate::types::{AlgorithmOutput, AudioBuffer};
use crate::{Algorithm, AlgorithmContext};

const FAST_RAMP_UP: usize = 0;
const FAST_RAMP_DOWN: usize = 1;
const SLOW_RAMP_UP: usize = 2;
const SLOW_RAMP_DOWN: usize = 3;
const ON_THRESHOLD: usize = 4;
const OFF_THRESHOLD: usize = 5;
const FLOOR: usize = 6;
const MIN_SLICE_LENGTH: usize = 7;
const HIGH_PASS: usize = 8;

/// Amplitude-based slicer.
///
/// Tracks the signal level with a fast and a slow envelope (in dB). An onset
/// is reported when the fast envelope rises `On Threshold` dB above the slow
/// one, and the detector re-arms once the difference falls below
/// `Off Threshold`.
#[derive(Debug, Default, Clone)]
pub struct AmpSliceAlgorithm;

impl AmpSliceAlgorithm {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for AmpSliceAlgorithm {
    fn name(&self) -> &str {
        "Amp Slice"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("Fast Ramp Up Length (samples)", 3, 1, 88_200),
            ParamSpec::int("Fast Ramp Down Length (samples)", 383, 1, 88_200),
            ParamSpec::int("Slow Ramp Up Length (samples)", 2205, 1, 88_200),
            ParamSpec::int("Slow Ramp Down Length (samples)", 2205, 1, 88_200),
            ParamSpec::int("On Threshold (dB)", 19, -144, 144),
            ParamSpec::int("Off Threshold (dB)", 8, -144, 144),
            ParamSpec::int("Floor (dB)", -70, -144, 144),
            ParamSpec::int("Minimum Slice Length (samples)", 1323, 1, 88_200),
            ParamSpec::int("High-Pass Cutoff (Hz)", 2000, 0, 10_000),
        ]
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn supports_regions(&self) -> bool {
        true
    }

    fn process(
        &self,
        source: &AudioBuffer,
        params: &[f64],
        ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        let specs = self.parameters();
        let param = |i: usize| {
            params
                .get(i)
                .copied()
                .unwrap_or_else(|| specs[i].default_value())
        };

        let floor = param(FLOOR);
        let on_threshold = param(ON_THRESHOLD);
        let off_threshold = param(OFF_THRESHOLD);
        let min_slice = param(MIN_SLICE_LENGTH).max(1.0) as usize;

        let mut high_pass = HighPass::new(param(HIGH_PASS), source.sample_rate);
        let mut fast = Follower::new(param(FAST_RAMP_UP), param(FAST_RAMP_DOWN), floor);
        let mut slow = Follower::new(param(SLOW_RAMP_UP), param(SLOW_RAMP_DOWN), floor);

        let mono = source.mono_mix();
        let chunks = mono.len().div_ceil(CHUNK_SIZE);
        let mut slices = Vec::new();
        let mut triggered = false;
        let mut last_slice: Option<usize> = None;

        for (chunk_idx, chunk) in mono.chunks(CHUNK_SIZE).enumerate() {
            if ctx.is_cancelled() {
                anyhow::bail!("amp slice cancelled at chunk {}", chunk_idx);
            }
            let offset = chunk_idx * CHUNK_SIZE;
            for (j, &x) in chunk.iter().enumerate() {
                let level = amp_to_db(high_pass.next(x as f64).abs(), floor);
                let diff = fast.next(level) - slow.next(level);

                if !triggered && diff > on_threshold {
                    let pos = offset + j;
                    if last_slice.map_or(true, |last| pos - last >= min_slice) {
                        slices.push(pos as f64);
                        last_slice = Some(pos);
                    }
                    triggered = true;
                } else if triggered && diff < off_threshold {
                    triggered = false;
                }
            }
            ctx.report_steps(chunk_idx + 1, chunks);
        }

        log::debug!("amp slice: {} onsets in {} frames", slices.len(), mono.len());
        Ok(AlgorithmOutput::Slices(slices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bursts(rate: u32, len: usize, starts: &[usize], burst_len: usize) -> AudioBuffer {
        let mut samples = vec![0.0f32; len];
        for &s in starts {
            for v in samples.iter_mut().skip(s).take(burst_len) {
                *v = 0.5;
            }
        }
        AudioBuffer::mono(rate, samples)
    }

    fn params_without_filter() -> Vec<f64> {
        let algo = AmpSliceAlgorithm::new();
        let mut params: Vec<f64> = algo.parameters().iter().map(|p| p.default_value()).collect();
        params[HIGH_PASS] = 0.0;
        params[FAST_RAMP_UP] = 1.0;
        params
    }

    #[test]
    fn test_detects_bursts() {
        let source = bursts(8_000, 6_000, &[1_000, 3_000], 500);
        let ctx = AlgorithmContext::detached();
        let out = AmpSliceAlgorithm::new()
            .process(&source, &params_without_filter(), &ctx)
            .unwrap();

        assert_eq!(out, AlgorithmOutput::Slices(vec![1_000.0, 3_000.0]));
        assert_eq!(ctx.progress(), 1.0);
    }

    #[test]
    fn test_silence_has_no_slices() {
        let source = AudioBuffer::silent(8_000, 2, 10_000);
        let out = AmpSliceAlgorithm::new()
            .process(&source, &[], &AlgorithmContext::detached())
            .unwrap();
        assert_eq!(out, AlgorithmOutput::Slices(Vec::new()));
    }

    #[test]
    fn test_cancelled_context_fails() {
        let ctx = AlgorithmContext::detached();
        ctx.shared.cancel();
        let source = AudioBuffer::silent(8_000, 1, 100);
        assert!(AmpSliceAlgorithm::new()
            .process(&source, &[], &ctx)
            .is_err());
    }
}
