use crate::{engine::CartEngine, flags::FlagHandle, orders::OrderSubmitter};

/// Shared state of the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: CartEngine,
    pub submitter: OrderSubmitter,
    pub flags: FlagHandle,
    pub environment: String,
}

impl AppState {
    pub fn new(
        engine: CartEngine,
        submitter: OrderSubmitter,
        flags: FlagHandle,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            submitter,
            flags,
            environment: environment.into(),
        }
    }

    /// Runtime flag toggles are a development-only facility.
    pub fn allows_flag_toggles(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}
