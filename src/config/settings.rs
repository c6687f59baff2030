#[derive(Debug, Clone)]
pub struct RatingSettings {
    pub start_rating: f64,
    pub k_singles: f64,
    pub k_doubles: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            start_rating: 1500.0,
            k_singles: 32.0,
            k_doubles: 24.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlotSettings {
    /// How long an application-in-progress may hold a slot before the hold
    /// is treated as free again. Expiry is evaluated lazily on the next
    /// access; no background sweep is required.
    pub lock_ttl_minutes: i64,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            lock_ttl_minutes: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rating: RatingSettings,
    pub slots: SlotSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            rating: RatingSettings::default(),
            slots: SlotSettings::default(),
        }
    }
}
