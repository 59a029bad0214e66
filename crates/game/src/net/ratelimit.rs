//! Per-connection rate limiting (§4.2, §4.3 step 3). A fixed-size sliding window of
//! one-second buckets; each kind of traffic (generic messages, attacks, raw input)
//! gets its own counter since the caps differ per kind.

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_messages_per_sec: u32,
    pub max_attacks_per_sec: u32,
    pub max_input_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages_per_sec: 200,
            max_attacks_per_sec: 10,
            max_input_per_sec: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Message,
    Attack,
    Input,
}

#[derive(Debug, Default)]
struct WindowCounter {
    window_start_ms: u64,
    count: u32,
}

impl WindowCounter {
    fn record(&mut self, now_ms: u64, cap: u32) -> bool {
        if now_ms.saturating_sub(self.window_start_ms) >= 1000 {
            self.window_start_ms = now_ms;
            self.count = 0;
        }
        self.count += 1;
        self.count <= cap
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    messages: WindowCounter,
    attacks: WindowCounter,
    input: WindowCounter,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            messages: WindowCounter::default(),
            attacks: WindowCounter::default(),
            input: WindowCounter::default(),
        }
    }

    /// Returns `true` if this event is within its per-second cap; `false` means the
    /// caller should drop the message and count a violation (§4.10).
    pub fn check(&mut self, kind: RateLimitKind, now_ms: u64) -> bool {
        match kind {
            RateLimitKind::Message => self.messages.record(now_ms, self.config.max_messages_per_sec),
            RateLimitKind::Attack => self.attacks.record(now_ms, self.config.max_attacks_per_sec),
            RateLimitKind::Input => self.input.record(now_ms, self.config.max_input_per_sec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excess_input_rejected() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_input_per_sec: 3,
            ..Default::default()
        });

        let mut accepted = 0;
        for _ in 0..5 {
            if limiter.check(RateLimitKind::Input, 0) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
    }

    #[test]
    fn window_resets_after_one_second() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_input_per_sec: 1,
            ..Default::default()
        });

        assert!(limiter.check(RateLimitKind::Input, 0));
        assert!(!limiter.check(RateLimitKind::Input, 10));
        assert!(limiter.check(RateLimitKind::Input, 1001));
    }
}
