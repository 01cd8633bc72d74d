/// Number of dirty passes a digest may run before giving up
pub const DEFAULT_DIGEST_TTL: usize = 10;

/// Settings shared by every scope of one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestConfig {
    pub ttl: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        DigestConfig {
            ttl: DEFAULT_DIGEST_TTL,
        }
    }
}

impl DigestConfig {
    pub fn ttl(mut self, ttl: usize) -> Self {
        self.ttl = ttl;
        self
    }
}
