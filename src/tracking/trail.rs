use std::collections::VecDeque;

use crate::types::ScreenPoint;

pub const DEFAULT_TRAIL_CAPACITY: usize = 20;

const OLDEST_OPACITY: f32 = 50.0;
const NEWEST_OPACITY: f32 = 255.0;
const OLDEST_WIDTH: f32 = 1.0;
const NEWEST_WIDTH: f32 = 8.0;

/// Recent cursor positions, oldest first.
#[derive(Clone, Debug)]
pub struct Trail {
    points: VecDeque<ScreenPoint>,
    capacity: usize,
}

/// One drawable piece of the trail between two consecutive positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailSegment {
    pub from: ScreenPoint,
    pub to: ScreenPoint,
    /// 0..=255
    pub opacity: f32,
    pub width: f32,
}

impl TrailSegment {
    pub fn alpha(&self) -> u8 {
        self.opacity.round().clamp(0.0, 255.0) as u8
    }
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: ScreenPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &ScreenPoint> {
        self.points.iter()
    }

    pub fn newest(&self) -> Option<ScreenPoint> {
        self.points.back().copied()
    }

    /// Tapered segments from thin and faint (oldest) to thick and opaque (newest).
    pub fn segments(&self) -> impl Iterator<Item = TrailSegment> + '_ {
        let count = self.points.len().saturating_sub(1);
        let last = count.saturating_sub(1);
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .enumerate()
            .map(move |(i, (from, to))| {
                // A lone segment already touches the live cursor, so it gets the newest style.
                let t = if last == 0 {
                    1.0
                } else {
                    i as f32 / last as f32
                };
                TrailSegment {
                    from: *from,
                    to: *to,
                    opacity: lerp(OLDEST_OPACITY, NEWEST_OPACITY, t),
                    width: lerp(OLDEST_WIDTH, NEWEST_WIDTH, t),
                }
            })
    }
}

impl Default for Trail {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
