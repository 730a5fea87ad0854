//! Draw simulators
//!
//! [`DrawSimulator`] is the seam between the outcome resolver and whatever
//! produces a draw order. [`PhysicsDrawSimulator`] is the production chamber;
//! the engine also plugs in a recorded-draw simulator for replays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use raffle_core::{DrawLabel, RngAlgorithm, SignupId, SimulationError};

use crate::chamber::Chamber;
use crate::config::ChamberConfig;
use crate::rng::{DrawSeed, RngState};
use crate::trace::{DrawOrder, DrawTrace, ExitEvent, Frame};

/// One competing signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub signup_id: SignupId,
    pub registration_intent: DateTime<Utc>,
}

impl Entrant {
    pub fn new(signup_id: impl Into<SignupId>, registration_intent: DateTime<Utc>) -> Self {
        Self {
            signup_id: signup_id.into(),
            registration_intent,
        }
    }

    /// Total order key: intent timestamp, then signup id
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.registration_intent, self.signup_id.as_str())
    }
}

/// Sort entrants into the stable draw-input order
pub fn sort_entrants(entrants: &mut [Entrant]) {
    entrants.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}

/// Verify entrants are strictly ascending by [`Entrant::order_key`]
pub fn check_stable_order(label: &DrawLabel, entrants: &[Entrant]) -> Result<(), SimulationError> {
    for (index, pair) in entrants.windows(2).enumerate() {
        if pair[0].order_key() >= pair[1].order_key() {
            return Err(SimulationError::NonDeterministicInput {
                label: label.clone(),
                index: index + 1,
                signup_id: pair[1].signup_id.clone(),
            });
        }
    }
    Ok(())
}

/// Result of one draw
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub order: DrawOrder,
    pub trace: DrawTrace,
}

/// Produces a draw order for a labelled group of entrants
pub trait DrawSimulator: Send + Sync {
    fn draw(
        &self,
        label: &DrawLabel,
        entrants: &[Entrant],
        seed: &DrawSeed,
    ) -> Result<Draw, SimulationError>;
}

/// Lottery-chamber simulator
#[derive(Debug, Clone, Default)]
pub struct PhysicsDrawSimulator {
    config: ChamberConfig,
    algorithm: RngAlgorithm,
}

impl PhysicsDrawSimulator {
    pub fn new(config: ChamberConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            config,
            algorithm: RngAlgorithm::CURRENT,
        })
    }

    /// Simulate with a historical RNG algorithm (re-simulation of old runs)
    pub fn with_algorithm(mut self, algorithm: RngAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn config(&self) -> &ChamberConfig {
        &self.config
    }
}

impl DrawSimulator for PhysicsDrawSimulator {
    fn draw(
        &self,
        label: &DrawLabel,
        entrants: &[Entrant],
        seed: &DrawSeed,
    ) -> Result<Draw, SimulationError> {
        if entrants.is_empty() {
            return Err(SimulationError::EmptyDraw {
                label: label.clone(),
            });
        }
        check_stable_order(label, entrants)?;

        let rng = RngState::with_algorithm(self.algorithm, seed.as_str());
        let mut chamber = Chamber::new(&self.config, entrants.len(), rng);
        let initial = chamber.positions();

        let mut exits = Vec::with_capacity(entrants.len());
        let mut frames = Vec::new();
        let mut opening = 0u32;

        while chamber.remaining() > 0 {
            chamber.step();
            let tick = chamber.tick();

            if let Some(interval) = self.config.frame_interval {
                if tick % interval as u64 == 0 {
                    frames.push(Frame {
                        tick,
                        balls: chamber.frame(),
                    });
                }
            }

            if tick >= self.config.exit_tick(opening) {
                if let Some((ball, at)) = chamber.open_gate() {
                    exits.push(ExitEvent {
                        tick,
                        ball,
                        signup_id: entrants[ball].signup_id.clone(),
                        x: at.x,
                        y: at.y,
                    });
                }
                opening += 1;
            }
        }

        log::debug!(
            "{label}: drew {} entrants in {} ticks ({} rng words)",
            entrants.len(),
            chamber.tick(),
            chamber.rng_words()
        );

        let trace = DrawTrace {
            label: label.clone(),
            algorithm: self.algorithm,
            seed: seed.clone(),
            entrants: entrants.iter().map(|e| e.signup_id.clone()).collect(),
            initial,
            exits,
            frames,
            ticks: chamber.tick(),
            rng_words: chamber.rng_words(),
        };

        Ok(Draw {
            order: trace.order(),
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn entrants(n: usize) -> Vec<Entrant> {
        (0..n)
            .map(|i| Entrant::new(format!("s{i:03}"), at(i as i64)))
            .collect()
    }

    fn simulator() -> PhysicsDrawSimulator {
        PhysicsDrawSimulator::new(ChamberConfig::quick()).unwrap()
    }

    #[test]
    fn test_same_seed_byte_identical() {
        let sim = simulator();
        let label = DrawLabel::Open;
        let seed = DrawSeed::new("test-1");
        let list = entrants(25);

        let a = sim.draw(&label, &list, &seed).unwrap();
        let b = sim.draw(&label, &list, &seed).unwrap();
        assert_eq!(a.order, b.order);
        assert_eq!(a.trace.to_bytes().unwrap(), b.trace.to_bytes().unwrap());
    }

    #[test]
    fn test_order_is_permutation() {
        let list = entrants(30);
        let draw = simulator()
            .draw(&DrawLabel::Open, &list, &DrawSeed::new("perm"))
            .unwrap();

        let mut drawn = draw.order.clone().into_inner();
        drawn.sort();
        let expected: Vec<SignupId> = list.iter().map(|e| e.signup_id.clone()).collect();
        assert_eq!(drawn, expected);
        assert!(draw.trace.is_complete());
    }

    #[test]
    fn test_seeds_change_order() {
        let sim = simulator();
        let list = entrants(20);
        let orders: Vec<DrawOrder> = (0..5)
            .map(|i| {
                sim.draw(&DrawLabel::Open, &list, &DrawSeed::new(format!("seed-{i}")))
                    .unwrap()
                    .order
            })
            .collect();
        assert!(orders.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_empty_draw() {
        let err = simulator()
            .draw(&DrawLabel::Open, &[], &DrawSeed::new("x"))
            .unwrap_err();
        assert_eq!(
            err,
            SimulationError::EmptyDraw {
                label: DrawLabel::Open
            }
        );
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let mut list = entrants(3);
        list.swap(0, 2);
        let err = simulator()
            .draw(&DrawLabel::Open, &list, &DrawSeed::new("x"))
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::NonDeterministicInput { index: 1, .. }
        ));
    }

    #[test]
    fn test_duplicate_entrant_rejected() {
        let mut list = entrants(2);
        list.push(list[1].clone());
        let err = check_stable_order(&DrawLabel::Open, &list).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::NonDeterministicInput { index: 2, .. }
        ));
    }

    #[test]
    fn test_intent_ties_broken_by_id() {
        let mut list = vec![
            Entrant::new("b", at(0)),
            Entrant::new("a", at(0)),
            Entrant::new("c", at(-5)),
        ];
        sort_entrants(&mut list);
        let ids: Vec<&str> = list.iter().map(|e| e.signup_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert!(check_stable_order(&DrawLabel::Open, &list).is_ok());
    }

    #[test]
    fn test_frames_recorded() {
        let sim = PhysicsDrawSimulator::new(ChamberConfig::quick().with_frames(5)).unwrap();
        let draw = sim
            .draw(&DrawLabel::Open, &entrants(4), &DrawSeed::new("frames"))
            .unwrap();
        assert!(!draw.trace.frames.is_empty());
        assert!(draw.trace.frames.iter().all(|f| f.tick % 5 == 0));
        assert_eq!(draw.trace.ticks, ChamberConfig::quick().exit_tick(3));
    }

    #[test]
    fn test_single_entrant() {
        let draw = simulator()
            .draw(&DrawLabel::Open, &entrants(1), &DrawSeed::new("one"))
            .unwrap();
        assert_eq!(draw.order.as_slice(), &[SignupId::new("s000")]);
    }
}
