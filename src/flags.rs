use std::{
    fmt,
    str::FromStr,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_CART_ITEM_LIMIT: i32 = 50;
pub const DEFAULT_ORDER_SERVICE_URL: &str = "http://localhost:8096";
pub const DEFAULT_IMAGE_BASE_URL: &str = "http://localhost:5000";

/// Every toggle and feature control consulted by the cart engine and the order submitter.
///
/// All bug toggles default to off, which is the correct behaviour of the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FlagSet {
    pub break_order_creation: bool,
    pub no_quantity_change_on_add: bool,
    pub no_quantity_change_on_remove: bool,
    pub no_cart_clear_after_order: bool,
    pub enable_calculation_bug: bool,
    pub enable_overflow_bug: bool,
    pub enable_image_url_bug: bool,
    pub enable_response_bug: bool,
    pub enable_info_leak_bug: bool,
    pub enable_validation_bug: bool,

    pub cart_item_limit: i32,
    pub order_service_url: String,
    pub image_base_url: String,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            break_order_creation: false,
            no_quantity_change_on_add: false,
            no_quantity_change_on_remove: false,
            no_cart_clear_after_order: false,
            enable_calculation_bug: false,
            enable_overflow_bug: false,
            enable_image_url_bug: false,
            enable_response_bug: false,
            enable_info_leak_bug: false,
            enable_validation_bug: false,
            cart_item_limit: DEFAULT_CART_ITEM_LIMIT,
            order_service_url: DEFAULT_ORDER_SERVICE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
        }
    }
}

impl FlagSet {
    pub fn is_enabled(&self, bug: BugFlag) -> bool {
        match bug {
            BugFlag::BreakOrderCreation => self.break_order_creation,
            BugFlag::NoQuantityChangeOnAdd => self.no_quantity_change_on_add,
            BugFlag::NoQuantityChangeOnRemove => self.no_quantity_change_on_remove,
            BugFlag::NoCartClearAfterOrder => self.no_cart_clear_after_order,
            BugFlag::Calculation => self.enable_calculation_bug,
            BugFlag::Overflow => self.enable_overflow_bug,
            BugFlag::ImageUrl => self.enable_image_url_bug,
            BugFlag::Response => self.enable_response_bug,
            BugFlag::InfoLeak => self.enable_info_leak_bug,
            BugFlag::Validation => self.enable_validation_bug,
        }
    }

    pub fn set(&mut self, bug: BugFlag, enabled: bool) {
        let slot = match bug {
            BugFlag::BreakOrderCreation => &mut self.break_order_creation,
            BugFlag::NoQuantityChangeOnAdd => &mut self.no_quantity_change_on_add,
            BugFlag::NoQuantityChangeOnRemove => &mut self.no_quantity_change_on_remove,
            BugFlag::NoCartClearAfterOrder => &mut self.no_cart_clear_after_order,
            BugFlag::Calculation => &mut self.enable_calculation_bug,
            BugFlag::Overflow => &mut self.enable_overflow_bug,
            BugFlag::ImageUrl => &mut self.enable_image_url_bug,
            BugFlag::Response => &mut self.enable_response_bug,
            BugFlag::InfoLeak => &mut self.enable_info_leak_bug,
            BugFlag::Validation => &mut self.enable_validation_bug,
        };
        *slot = enabled;
    }

    /// Builder-style variant of [`FlagSet::set`].
    pub fn with(mut self, bug: BugFlag, enabled: bool) -> Self {
        self.set(bug, enabled);
        self
    }
}

/// Named bug toggles, addressable from configuration and the admin endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BugFlag {
    BreakOrderCreation,
    NoQuantityChangeOnAdd,
    NoQuantityChangeOnRemove,
    NoCartClearAfterOrder,
    Calculation,
    Overflow,
    ImageUrl,
    Response,
    InfoLeak,
    Validation,
}

impl BugFlag {
    pub const ALL: [BugFlag; 10] = [
        BugFlag::BreakOrderCreation,
        BugFlag::NoQuantityChangeOnAdd,
        BugFlag::NoQuantityChangeOnRemove,
        BugFlag::NoCartClearAfterOrder,
        BugFlag::Calculation,
        BugFlag::Overflow,
        BugFlag::ImageUrl,
        BugFlag::Response,
        BugFlag::InfoLeak,
        BugFlag::Validation,
    ];

    /// Short name used in URLs, lower-case without separators.
    pub fn name(self) -> &'static str {
        match self {
            BugFlag::BreakOrderCreation => "breakordercreation",
            BugFlag::NoQuantityChangeOnAdd => "noquantitychangeonadd",
            BugFlag::NoQuantityChangeOnRemove => "noquantitychangeonremove",
            BugFlag::NoCartClearAfterOrder => "nocartclearafterorder",
            BugFlag::Calculation => "calculation",
            BugFlag::Overflow => "overflow",
            BugFlag::ImageUrl => "imageurl",
            BugFlag::Response => "response",
            BugFlag::InfoLeak => "infoleak",
            BugFlag::Validation => "validation",
        }
    }

    /// Environment variable that seeds the toggle at startup.
    pub fn env_var(self) -> &'static str {
        match self {
            BugFlag::BreakOrderCreation => "FLAG_BREAK_ORDER_CREATION",
            BugFlag::NoQuantityChangeOnAdd => "FLAG_NO_QUANTITY_CHANGE_ON_ADD",
            BugFlag::NoQuantityChangeOnRemove => "FLAG_NO_QUANTITY_CHANGE_ON_REMOVE",
            BugFlag::NoCartClearAfterOrder => "FLAG_NO_CART_CLEAR_AFTER_ORDER",
            BugFlag::Calculation => "FLAG_CALCULATION_BUG",
            BugFlag::Overflow => "FLAG_OVERFLOW_BUG",
            BugFlag::ImageUrl => "FLAG_IMAGE_URL_BUG",
            BugFlag::Response => "FLAG_RESPONSE_BUG",
            BugFlag::InfoLeak => "FLAG_INFO_LEAK_BUG",
            BugFlag::Validation => "FLAG_VALIDATION_BUG",
        }
    }
}

impl fmt::Display for BugFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown bug: {0}")]
pub struct UnknownBugFlag(pub String);

impl FromStr for BugFlag {
    type Err = UnknownBugFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        BugFlag::ALL
            .into_iter()
            .find(|flag| flag.name() == normalized)
            .ok_or_else(|| UnknownBugFlag(s.to_string()))
    }
}

/// Process-wide holder of the current [`FlagSet`].
///
/// Operations take a snapshot at their start, so a toggle flipped mid-request
/// only affects the operations that begin afterwards.
#[derive(Clone, Debug, Default)]
pub struct FlagHandle {
    inner: Arc<RwLock<FlagSet>>,
}

impl FlagHandle {
    pub fn new(flags: FlagSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(flags)),
        }
    }

    pub fn snapshot(&self) -> FlagSet {
        match self.inner.read() {
            Ok(flags) => flags.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn toggle(&self, bug: BugFlag, enabled: bool) -> FlagSet {
        let mut flags = match self.inner.write() {
            Ok(flags) => flags,
            Err(poisoned) => poisoned.into_inner(),
        };
        flags.set(bug, enabled);
        flags.clone()
    }
}
