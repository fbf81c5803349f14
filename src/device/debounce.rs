/// Stable-level change reported by [`Debouncer::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// Accepts a raw input level only after it has held for `delay_ms`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    raw: bool,
    raw_since_ms: u64,
    stable: bool,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            raw: false,
            raw_since_ms: 0,
            stable: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    pub fn update(&mut self, now_ms: u64, raw: bool) -> Option<Edge> {
        if raw != self.raw {
            self.raw = raw;
            self.raw_since_ms = now_ms;
        }

        if self.stable == self.raw || now_ms.saturating_sub(self.raw_since_ms) < self.delay_ms {
            return None;
        }

        self.stable = self.raw;
        Some(if self.stable { Edge::Pressed } else { Edge::Released })
    }
}
