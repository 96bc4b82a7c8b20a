//! Scan-position evolution so long renders don't settle into a static loop.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-frame advance for `position_evolution == 1.0`.
pub const EVOLUTION_SCALE: f64 = 1e-5;

/// Seconds between jumps in [`EvolutionMode::Random`].
const RANDOM_JUMP_SECS: f64 = 2.0;

const PING_PONG_LOW: f64 = 0.05;
const PING_PONG_HIGH: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionMode {
    /// Advance and wrap 1 → 0
    #[default]
    Forward,
    /// Retreat and wrap 0 → 1
    Backward,
    /// Bounce between 0.05 and 0.95
    PingPong,
    /// Jump to a uniform random position every ~2 s
    Random,
}

/// Normalized scan position over the active source.
#[derive(Debug, Clone, Copy)]
pub struct ScanPosition {
    position: f64,
    direction: f64,
    frames_until_jump: f64,
}

impl ScanPosition {
    pub fn new(position: f64) -> Self {
        Self {
            position: position.clamp(0.0, 1.0),
            direction: 1.0,
            frames_until_jump: 0.0,
        }
    }

    pub fn get(&self) -> f64 {
        self.position
    }

    pub fn set(&mut self, position: f64) {
        self.position = position.clamp(0.0, 1.0);
    }

    /// Move by `evolution * EVOLUTION_SCALE * frames` following `mode`.
    pub fn advance<R: Rng>(
        &mut self,
        mode: EvolutionMode,
        evolution: f64,
        frames: usize,
        sample_rate: f64,
        rng: &mut R,
    ) {
        if evolution <= 0.0 || frames == 0 {
            return;
        }
        let step = evolution * EVOLUTION_SCALE * frames as f64;

        match mode {
            EvolutionMode::Forward => {
                self.position += step;
                if self.position >= 1.0 {
                    self.position = self.position.fract();
                }
            }
            EvolutionMode::Backward => {
                self.position -= step;
                if self.position < 0.0 {
                    self.position = 1.0 + self.position.fract();
                    if self.position >= 1.0 {
                        self.position = 0.0;
                    }
                }
            }
            EvolutionMode::PingPong => {
                self.position += step * self.direction;
                if self.position >= PING_PONG_HIGH {
                    self.position = PING_PONG_HIGH;
                    self.direction = -1.0;
                } else if self.position <= PING_PONG_LOW {
                    self.position = PING_PONG_LOW;
                    self.direction = 1.0;
                }
            }
            EvolutionMode::Random => {
                self.frames_until_jump -= frames as f64;
                if self.frames_until_jump <= 0.0 {
                    self.position = rng.gen::<f64>();
                    self.frames_until_jump = RANDOM_JUMP_SECS * sample_rate;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    #[test]
    fn test_forward_wraps() {
        let mut scan = ScanPosition::new(0.99);
        // 1.0 * 1e-5 * 2000 = 0.02
        scan.advance(EvolutionMode::Forward, 1.0, 2000, 44100.0, &mut rng());
        assert_relative_eq!(scan.get(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_backward_wraps() {
        let mut scan = ScanPosition::new(0.01);
        scan.advance(EvolutionMode::Backward, 1.0, 2000, 44100.0, &mut rng());
        assert_relative_eq!(scan.get(), 0.99, epsilon = 1e-9);
    }

    #[test]
    fn test_ping_pong_reverses_at_bounds() {
        let mut rng = rng();
        let mut scan = ScanPosition::new(0.94);
        scan.advance(EvolutionMode::PingPong, 1.0, 2000, 44100.0, &mut rng);
        assert_eq!(scan.get(), 0.95);
        scan.advance(EvolutionMode::PingPong, 1.0, 1000, 44100.0, &mut rng);
        assert_relative_eq!(scan.get(), 0.94, epsilon = 1e-9);

        for _ in 0..1000 {
            scan.advance(EvolutionMode::PingPong, 1.0, 4096, 44100.0, &mut rng);
            assert!((PING_PONG_LOW..=PING_PONG_HIGH).contains(&scan.get()));
        }
    }

    #[test]
    fn test_random_jumps_on_schedule() {
        let mut rng = rng();
        let mut scan = ScanPosition::new(0.5);
        // First call jumps immediately
        scan.advance(EvolutionMode::Random, 1.0, 512, 1000.0, &mut rng);
        let first = scan.get();
        assert!((0.0..1.0).contains(&first));

        // Within the next 2 s no further jump
        scan.advance(EvolutionMode::Random, 1.0, 1000, 1000.0, &mut rng);
        assert_eq!(scan.get(), first);

        scan.advance(EvolutionMode::Random, 1.0, 1000, 1000.0, &mut rng);
        assert!((0.0..1.0).contains(&scan.get()));
    }

    #[test]
    fn test_zero_evolution_is_static() {
        let mut scan = ScanPosition::new(0.3);
        scan.advance(EvolutionMode::Forward, 0.0, 44100, 44100.0, &mut rng());
        assert_eq!(scan.get(), 0.3);
    }
}
