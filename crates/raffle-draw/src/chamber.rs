//! Lottery chamber physics
//!
//! Balls are agitated by air jets inside a rectangular drum; a suction gate
//! in the middle of the lid pulls out the nearest ball each time it opens.
//!
//! ```text
//!         gate
//!   ┌──────▽──────┐  y = height
//!   │  o    o   o │
//!   │ o  o    o   │  jets push up, gravity pulls down,
//!   │   o   o  o  │  walls bounce with restitution
//!   └─────────────┘  y = 0
//! ```
//!
//! Per tick and per ball (ascending index order) exactly two RNG words are
//! consumed, so the stream position depends only on tick count and the
//! number of balls still inside.

use crate::config::ChamberConfig;
use crate::fixed::Fixed;
use crate::rng::RngState;
use crate::trace::{BallFrame, BallPosition};

#[derive(Debug, Clone, Copy)]
struct Ball {
    x: Fixed,
    y: Fixed,
    vx: Fixed,
    vy: Fixed,
    inside: bool,
}

/// Mutable chamber state for one draw
pub struct Chamber {
    balls: Vec<Ball>,
    rng: RngState,
    tick: u64,
    remaining: usize,
    // Cached fixed-point constants
    width: Fixed,
    height: Fixed,
    radius: Fixed,
    gravity: Fixed,
    jet: Fixed,
    restitution: Fixed,
    damping: Fixed,
    max_speed: Fixed,
}

impl Chamber {
    /// Lay `count` balls out in rows from the floor, index order left to right
    pub fn new(config: &ChamberConfig, count: usize, rng: RngState) -> Self {
        let radius = config.radius_fx();
        let diameter = radius + radius;
        let columns = (config.width / (config.ball_radius * 2)).max(1) as usize;
        let layers = (config.height / (config.ball_radius * 2)).max(1) as usize;

        let balls = (0..count)
            .map(|i| {
                let column = (i % columns) as i64;
                // Wrap when the drum is over-full; overlapping balls are harmless
                let row = ((i / columns) % layers) as i64;
                Ball {
                    x: radius + Fixed::from_raw(diameter.raw() * column),
                    y: radius + Fixed::from_raw(diameter.raw() * row),
                    vx: Fixed::ZERO,
                    vy: Fixed::ZERO,
                    inside: true,
                }
            })
            .collect();

        Self {
            balls,
            rng,
            tick: 0,
            remaining: count,
            width: config.width_fx(),
            height: config.height_fx(),
            radius,
            gravity: Fixed::from_milli(config.gravity_milli),
            jet: Fixed::from_milli(config.jet_strength_milli),
            restitution: Fixed::from_milli(config.restitution_milli),
            damping: Fixed::from_milli(config.damping_milli),
            max_speed: config.max_speed_fx(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn rng_words(&self) -> u64 {
        self.rng.words_drawn()
    }

    pub fn positions(&self) -> Vec<BallPosition> {
        self.balls
            .iter()
            .map(|b| BallPosition { x: b.x, y: b.y })
            .collect()
    }

    /// Balls still inside
    pub fn frame(&self) -> Vec<BallFrame> {
        self.balls
            .iter()
            .enumerate()
            .filter(|(_, b)| b.inside)
            .map(|(ball, b)| BallFrame { ball, x: b.x, y: b.y })
            .collect()
    }

    /// Advance one fixed time step
    pub fn step(&mut self) {
        self.tick += 1;

        let two = Fixed::from_int(2);
        let lo_x = self.radius;
        let hi_x = self.width - self.radius;
        let lo_y = self.radius;
        let hi_y = self.height - self.radius;

        for i in 0..self.balls.len() {
            if !self.balls[i].inside {
                continue;
            }
            let lateral = self.rng.next_unit_fixed();
            let lift = self.rng.next_unit_fixed();

            let ball = &mut self.balls[i];

            // Jets: lateral in [-jet, jet), upward in [0, jet)
            ball.vx += (lateral * two - Fixed::ONE) * self.jet;
            ball.vy += lift * self.jet - self.gravity;

            ball.vx = (ball.vx * self.damping).clamp(-self.max_speed, self.max_speed);
            ball.vy = (ball.vy * self.damping).clamp(-self.max_speed, self.max_speed);

            ball.x += ball.vx;
            ball.y += ball.vy;

            if ball.x < lo_x {
                ball.x = lo_x + (lo_x - ball.x);
                ball.vx = -ball.vx * self.restitution;
            } else if ball.x > hi_x {
                ball.x = hi_x - (ball.x - hi_x);
                ball.vx = -ball.vx * self.restitution;
            }
            if ball.y < lo_y {
                ball.y = lo_y + (lo_y - ball.y);
                ball.vy = -ball.vy * self.restitution;
            } else if ball.y > hi_y {
                ball.y = hi_y - (ball.y - hi_y);
                ball.vy = -ball.vy * self.restitution;
            }

            ball.x = ball.x.clamp(lo_x, hi_x);
            ball.y = ball.y.clamp(lo_y, hi_y);
        }
    }

    /// Open the gate: remove the ball nearest to it (ties go to the lowest index)
    pub fn open_gate(&mut self) -> Option<(usize, BallPosition)> {
        let gate_x = Fixed::from_raw(self.width.raw() / 2);
        let gate_y = self.height;

        let (index, _) = self
            .balls
            .iter()
            .enumerate()
            .filter(|(_, b)| b.inside)
            .map(|(i, b)| (i, Fixed::dist_sq(b.x, b.y, gate_x, gate_y)))
            // min_by_key keeps the first minimum, i.e. the lowest index
            .min_by_key(|&(_, d)| d)?;

        let ball = &mut self.balls[index];
        ball.inside = false;
        self.remaining -= 1;
        Some((index, BallPosition { x: ball.x, y: ball.y }))
    }
}
