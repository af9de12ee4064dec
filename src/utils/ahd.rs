//! Attack, hold, decay envelope evaluation for single grains.

// -------------------------------------------------------------------------------------------------

/// Current processing stage in an [`AhdEnvelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum AhdStage {
    Attack,
    Hold,
    Decay,
    #[default]
    /// After decay (zero volume).
    Finished,
}

// -------------------------------------------------------------------------------------------------

/// Linear attack, hold, decay envelope that is fitted into a grain's duration.
///
/// Envelope times are given in samples. When attack + hold + decay exceed the grain's
/// duration, all three stages get scaled down proportionally, so the envelope reaches exactly
/// zero at the grain's end. When all stages are zero, the envelope is bypassed and evaluates
/// to 1 over the entire grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhdEnvelope {
    attack: f64,
    hold: f64,
    decay: f64,
    bypassed: bool,
}

impl AhdEnvelope {
    /// Create a new envelope from attack, hold and decay times in samples, fitted into the
    /// given grain duration in samples.
    pub fn new(attack: u32, hold: u32, decay: u32, duration: u32) -> Self {
        let (mut attack, mut hold, mut decay) = (attack as f64, hold as f64, decay as f64);
        let total = attack + hold + decay;
        let bypassed = total <= 0.0;
        let duration = duration as f64;
        if total > duration && total > 0.0 {
            let scale = duration / total;
            attack *= scale;
            hold *= scale;
            decay *= scale;
        }
        Self {
            attack,
            hold,
            decay,
            bypassed,
        }
    }

    /// Scaled attack time in samples.
    pub fn attack(&self) -> f64 {
        self.attack
    }
    /// Scaled hold time in samples.
    pub fn hold(&self) -> f64 {
        self.hold
    }
    /// Scaled decay time in samples.
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Get the envelope's stage at the given phase (samples elapsed).
    pub fn stage(&self, phase: f64) -> AhdStage {
        if self.bypassed {
            return AhdStage::Hold;
        }
        if phase < self.attack {
            AhdStage::Attack
        } else if phase < self.attack + self.hold {
            AhdStage::Hold
        } else if phase < self.attack + self.hold + self.decay {
            AhdStage::Decay
        } else {
            AhdStage::Finished
        }
    }

    /// Evaluate the envelope at the given phase (samples elapsed). Always in range [0, 1].
    #[inline]
    pub fn evaluate(&self, phase: f64) -> f32 {
        let value = match self.stage(phase) {
            AhdStage::Attack => phase / self.attack,
            AhdStage::Hold => 1.0,
            AhdStage::Decay => {
                let decay_phase = phase - self.attack - self.hold;
                1.0 - decay_phase / self.decay
            }
            AhdStage::Finished => 0.0,
        };
        value.clamp(0.0, 1.0) as f32
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    #[test]
    fn stages() {
        let env = AhdEnvelope::new(10, 10, 10, 100);
        assert_eq!(env.stage(0.0), AhdStage::Attack);
        assert_eq!(env.stage(15.0), AhdStage::Hold);
        assert_eq!(env.stage(25.0), AhdStage::Decay);
        assert_eq!(env.stage(30.0), AhdStage::Finished);
        assert_eq!(env.evaluate(0.0), 0.0);
        assert_eq_with_epsilon!(env.evaluate(5.0), 0.5, 1e-6);
        assert_eq!(env.evaluate(12.0), 1.0);
        assert_eq_with_epsilon!(env.evaluate(25.0), 0.5, 1e-6);
        assert_eq!(env.evaluate(50.0), 0.0);
    }

    #[test]
    fn scaled_into_duration() {
        let duration = 50;
        let env = AhdEnvelope::new(40, 20, 40, duration);
        assert_eq_with_epsilon!(env.attack() + env.hold() + env.decay(), 50.0, 1e-9);
        assert_eq_with_epsilon!(env.attack(), 20.0, 1e-9);
        for phase in 0..=duration {
            let value = env.evaluate(phase as f64);
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(env.evaluate(duration as f64), 0.0);
    }

    #[test]
    fn zero_attack_and_bypass() {
        let env = AhdEnvelope::new(0, 0, 10, 10);
        assert_eq!(env.evaluate(0.0), 1.0);
        assert_eq!(env.evaluate(10.0), 0.0);

        let bypassed = AhdEnvelope::new(0, 0, 0, 10);
        assert_eq!(bypassed.evaluate(0.0), 1.0);
        assert_eq!(bypassed.evaluate(10.0), 1.0);
    }
}
