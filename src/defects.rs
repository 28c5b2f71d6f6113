//! Deliberate defect injection.
//!
//! Every injection point takes the value the engine is about to use and returns
//! either that value or a deterministically broken one, depending on the
//! [`FlagSet`] snapshot of the current operation. Nothing here touches storage.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use rand::Rng;
use reqwest::Url;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    flags::FlagSet,
    models::{AddToCartRequest, CartSummaryResponse},
};

/// Ways a broken order submission can misbehave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderFailureMode {
    ReturnFalseImmediately,
    ThrowException,
    InfiniteTimeout,
    WrongUrl,
    InvalidData,
    FakeSuccess,
    WrongHttpMethod,
    WrongHeaders,
    HideErrors,
}

impl OrderFailureMode {
    pub const ALL: [OrderFailureMode; 9] = [
        OrderFailureMode::ReturnFalseImmediately,
        OrderFailureMode::ThrowException,
        OrderFailureMode::InfiniteTimeout,
        OrderFailureMode::WrongUrl,
        OrderFailureMode::InvalidData,
        OrderFailureMode::FakeSuccess,
        OrderFailureMode::WrongHttpMethod,
        OrderFailureMode::WrongHeaders,
        OrderFailureMode::HideErrors,
    ];
}

impl fmt::Display for OrderFailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Source of the pseudo-random choices made by broken order submissions.
pub trait ModePicker: Send + Sync {
    /// Returns an index in `0..upper`. `upper` is never zero.
    fn pick(&self, upper: usize) -> usize;
}

/// Thread-local RNG backed picker used by the running service.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPicker;

impl ModePicker for RandomPicker {
    fn pick(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper.max(1))
    }
}

/// Replays a fixed sequence of picks, then keeps answering `0`.
#[derive(Debug, Default)]
pub struct ScriptedPicker {
    picks: Mutex<VecDeque<usize>>,
}

impl ScriptedPicker {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: Mutex::new(picks.into_iter().collect()),
        }
    }

    /// Picker whose first choice selects `mode`.
    pub fn mode(mode: OrderFailureMode) -> Self {
        Self::new([Self::index_of(mode)])
    }

    /// Picker selecting `mode` first and then `variant` for any follow-up choice.
    pub fn mode_then(mode: OrderFailureMode, variant: usize) -> Self {
        Self::new([Self::index_of(mode), variant])
    }

    fn index_of(mode: OrderFailureMode) -> usize {
        OrderFailureMode::ALL
            .iter()
            .position(|candidate| *candidate == mode)
            .unwrap_or_default()
    }
}

impl ModePicker for ScriptedPicker {
    fn pick(&self, upper: usize) -> usize {
        let next = match self.picks.lock() {
            Ok(mut picks) => picks.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or(0) % upper.max(1)
    }
}

/// Applies the defects enabled in one flag snapshot.
#[derive(Clone, Copy, Debug)]
pub struct DefectInjector<'a> {
    flags: &'a FlagSet,
}

impl<'a> DefectInjector<'a> {
    pub fn new(flags: &'a FlagSet) -> Self {
        Self { flags }
    }

    /// Calculation bug: the unit price grows by the requested quantity.
    pub fn adjust_incoming_add(&self, request: AddToCartRequest) -> AddToCartRequest {
        if !self.flags.enable_calculation_bug {
            return request;
        }

        AddToCartRequest {
            price: request.price + Decimal::from(request.quantity),
            ..request
        }
    }

    /// Overflow bug: a quantity increment is multiplied by 100.
    pub fn adjust_quantity_delta(&self, delta: i32) -> i32 {
        if !self.flags.enable_overflow_bug {
            return delta;
        }

        delta.saturating_mul(100)
    }

    /// Relative image paths are rooted at the public base URL, absolute ones kept.
    /// The image URL bug swaps the two cases.
    pub fn adjust_image_url(&self, url: &str) -> String {
        if url.is_empty() {
            return String::new();
        }

        let absolute = Url::parse(url).is_ok();
        let should_prefix = absolute == self.flags.enable_image_url_bug;
        if should_prefix {
            format!(
                "{}/{}",
                self.flags.image_base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        } else {
            url.to_string()
        }
    }

    /// Response bug: reported total inflated by 10%, stored data untouched.
    pub fn adjust_summary_response(&self, response: CartSummaryResponse) -> CartSummaryResponse {
        if !self.flags.enable_response_bug {
            return response;
        }

        CartSummaryResponse {
            total: response.total * Decimal::new(11, 1),
            ..response
        }
    }

    pub fn should_skip_validation(&self, dish_id: &Uuid) -> bool {
        self.flags.enable_validation_bug && dish_id.to_string().ends_with('9')
    }

    pub fn should_suppress_quantity_change_on_add(&self) -> bool {
        self.flags.no_quantity_change_on_add
    }

    pub fn should_suppress_removal(&self) -> bool {
        self.flags.no_quantity_change_on_remove
    }

    pub fn should_suppress_cart_clear_after_order(&self) -> bool {
        self.flags.no_cart_clear_after_order
    }

    pub fn should_log_sensitive_info(&self) -> bool {
        self.flags.enable_info_leak_bug
    }

    /// `None` unless order creation is set to break.
    pub fn choose_order_submission_failure_mode(
        &self,
        picker: &dyn ModePicker,
    ) -> Option<OrderFailureMode> {
        if !self.flags.break_order_creation {
            return None;
        }

        let index = picker.pick(OrderFailureMode::ALL.len());
        OrderFailureMode::ALL.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BugFlag;

    fn request(price: i64, quantity: i32) -> AddToCartRequest {
        AddToCartRequest {
            dish_id: Uuid::new_v4(),
            name: "Pelmeni".into(),
            price: Decimal::from(price),
            image_url: "/img/pelmeni.png".into(),
            quantity,
        }
    }

    #[test]
    fn calculation_bug_adds_quantity_to_price() {
        let flags = FlagSet::default().with(BugFlag::Calculation, true);
        let adjusted = DefectInjector::new(&flags).adjust_incoming_add(request(100, 2));
        assert_eq!(adjusted.price, Decimal::from(102));
        assert_eq!(adjusted.quantity, 2);

        let clean = FlagSet::default();
        let untouched = DefectInjector::new(&clean).adjust_incoming_add(request(100, 2));
        assert_eq!(untouched.price, Decimal::from(100));
    }

    #[test]
    fn overflow_bug_multiplies_delta_without_panicking() {
        let flags = FlagSet::default().with(BugFlag::Overflow, true);
        let defects = DefectInjector::new(&flags);
        assert_eq!(defects.adjust_quantity_delta(3), 300);
        assert_eq!(defects.adjust_quantity_delta(i32::MAX), i32::MAX);
    }

    #[test]
    fn image_urls_are_rooted_only_when_relative() {
        let flags = FlagSet::default();
        let defects = DefectInjector::new(&flags);
        assert_eq!(
            defects.adjust_image_url("/img/a.png"),
            "http://localhost:5000/img/a.png"
        );
        assert_eq!(
            defects.adjust_image_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(defects.adjust_image_url(""), "");
    }

    #[test]
    fn image_url_bug_inverts_the_rule() {
        let flags = FlagSet::default().with(BugFlag::ImageUrl, true);
        let defects = DefectInjector::new(&flags);
        assert_eq!(defects.adjust_image_url("/img/a.png"), "/img/a.png");
        assert_eq!(
            defects.adjust_image_url("https://cdn.example.com/a.png"),
            "http://localhost:5000/https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn response_bug_inflates_total_by_ten_percent() {
        let flags = FlagSet::default().with(BugFlag::Response, true);
        let mut response = CartSummaryResponse::empty("b");
        response.total = Decimal::from(300);

        let adjusted = DefectInjector::new(&flags).adjust_summary_response(response);
        assert_eq!(adjusted.total, Decimal::from(330));
    }

    #[test]
    fn validation_skip_only_for_ids_ending_in_nine() {
        let flags = FlagSet::default().with(BugFlag::Validation, true);
        let defects = DefectInjector::new(&flags);
        let nine = Uuid::parse_str("6f1c2a4e-8d3b-4c7a-9e15-0a2b3c4d5e69").unwrap();
        let other = Uuid::parse_str("6f1c2a4e-8d3b-4c7a-9e15-0a2b3c4d5e60").unwrap();
        assert!(defects.should_skip_validation(&nine));
        assert!(!defects.should_skip_validation(&other));

        let clean = FlagSet::default();
        assert!(!DefectInjector::new(&clean).should_skip_validation(&nine));
    }

    #[test]
    fn failure_mode_only_chosen_when_order_creation_breaks() {
        let picker = ScriptedPicker::mode(OrderFailureMode::FakeSuccess);
        let clean = FlagSet::default();
        assert_eq!(
            DefectInjector::new(&clean).choose_order_submission_failure_mode(&picker),
            None
        );

        let broken = FlagSet::default().with(BugFlag::BreakOrderCreation, true);
        let picker = ScriptedPicker::mode(OrderFailureMode::FakeSuccess);
        assert_eq!(
            DefectInjector::new(&broken).choose_order_submission_failure_mode(&picker),
            Some(OrderFailureMode::FakeSuccess)
        );
    }

    #[test]
    fn random_picker_stays_in_range() {
        let picker = RandomPicker;
        for _ in 0..200 {
            assert!(picker.pick(9) < 9);
        }
    }
}
