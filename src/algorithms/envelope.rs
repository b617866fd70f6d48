/// One-pole lag follower with separate rise and fall lengths (in samples).
#[derive(Debug, Clone)]
pub(crate) struct Follower {
    rise: f64,
    fall: f64,
    value: f64,
}

impl Follower {
    pub(crate) fn new(rise_samples: f64, fall_samples: f64, initial: f64) -> Self {
        Self {
            rise: rise_samples.max(1.0),
            fall: fall_samples.max(1.0),
            value: initial,
        }
    }

    pub(crate) fn next(&mut self, input: f64) -> f64 {
        let len = if input > self.value { self.rise } else { self.fall };
        self.value += (input - self.value) / len;
        self.value
    }
}

/// First-order high-pass filter. A cutoff of zero passes the input through.
#[derive(Debug, Clone)]
pub(crate) struct HighPass {
    coeff: Option<f64>,
    prev_in: f64,
    prev_out: f64,
}

impl HighPass {
    pub(crate) fn new(cutoff_hz: f64, sample_rate: u32) -> Self {
        let coeff = (cutoff_hz > 0.0 && sample_rate > 0).then(|| {
            (-2.0 * std::f64::consts::PI * cutoff_hz / sample_rate as f64).exp()
        });
        Self {
            coeff,
            prev_in: 0.0,
            prev_out: 0.0,
        }
    }

    pub(crate) fn next(&mut self, input: f64) -> f64 {
        let Some(a) = self.coeff else {
            return input;
        };
        let out = a * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = out;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follower_rises_faster_than_it_falls() {
        let mut f = Follower::new(1.0, 10.0, 0.0);
        assert_eq!(f.next(1.0), 1.0);
        let after_fall = f.next(0.0);
        assert!((after_fall - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut hp = HighPass::new(100.0, 1000);
        let mut last = 1.0;
        for _ in 0..200 {
            last = hp.next(1.0);
        }
        assert!(last.abs() < 1e-3);
    }

    #[test]
    fn test_highpass_zero_cutoff_bypasses() {
        let mut hp = HighPass::new(0.0, 48_000);
        assert_eq!(hp.next(0.25), 0.25);
    }
}
