use super::envelope::Follower;
use super::{db_to_amp, CHUNK_SIZE};
use crate::params::ParamSpec;
use crate::types::{AlgorithmOutput, AudioBuffer};
use crate::{Algorithm, AlgorithmContext};

const RAMP_UP: usize = 0;
const RAMP_DOWN: usize = 1;
const ON_THRESHOLD: usize = 2;
const OFF_THRESHOLD: usize = 3;
const MIN_LENGTH: usize = 4;
const ENVELOPE_LENGTH: usize = 5;

/// Amplitude gate rendering the gated signal as a new take.
///
/// The gate opens when the envelope rises above `On Threshold`, and closes
/// once it falls below `Off Threshold` after staying open for at least
/// `Minimum Length` samples.
#[derive(Debug, Default, Clone)]
pub struct AmpGateAlgorithm;

impl AmpGateAlgorithm {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for AmpGateAlgorithm {
    fn name(&self) -> &str {
        "Amp Gate"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("Ramp Up Length (samples)", 10, 1, 88_200),
            ParamSpec::int("Ramp Down Length (samples)", 10, 1, 88_200),
            ParamSpec::double("On Threshold (dB)", -20.0, -144.0, 144.0),
            ParamSpec::double("Off Threshold (dB)", -30.0, -144.0, 144.0),
            ParamSpec::int("Minimum Length (samples)", 441, 1, 88_200),
            ParamSpec::int("Envelope Length (samples)", 64, 1, 88_200),
        ]
    }

    fn creates_takes(&self) -> bool {
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

        let up_step = 1.0 / param(RAMP_UP).max(1.0);
        let down_step = 1.0 / param(RAMP_DOWN).max(1.0);
        let on_threshold = db_to_amp(param(ON_THRESHOLD));
        let off_threshold = db_to_amp(param(OFF_THRESHOLD));
        let min_length = param(MIN_LENGTH).max(1.0) as usize;
        let mut envelope = Follower::new(1.0, param(ENVELOPE_LENGTH), 0.0);

        let mono = source.mono_mix();
        let frames = mono.len();
        let chunks = frames.div_ceil(CHUNK_SIZE);
        let mut gains = Vec::with_capacity(frames);
        let mut open = false;
        let mut open_for = 0usize;
        let mut gain = 0.0f64;

        for (chunk_idx, chunk) in mono.chunks(CHUNK_SIZE).enumerate() {
            if ctx.is_cancelled() {
                anyhow::bail!("amp gate cancelled at chunk {}", chunk_idx);
            }
            for &x in chunk {
                let level = envelope.next((x as f64).abs());
                if !open && level > on_threshold {
                    open = true;
                    open_for = 0;
                } else if open && level < off_threshold && open_for >= min_length {
                    open = false;
                }
                if open {
                    open_for += 1;
                    gain = (gain + up_step).min(1.0);
                } else {
                    gain = (gain - down_step).max(0.0);
                }
                gains.push(gain as f32);
            }
            ctx.report_steps(chunk_idx + 1, chunks);
        }

        let channels = source
            .channels
            .iter()
            .map(|channel| {
                channel
                    .iter()
                    .zip(gains.iter())
                    .map(|(s, g)| s * g)
                    .collect()
            })
            .collect();

        Ok(AlgorithmOutput::Audio(vec![AudioBuffer::new(
            source.sample_rate,
            channels,
        )]))
    }
}
