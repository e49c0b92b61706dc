//! Closed domain enums, parsed once at the system boundary.
//!
//! Entity columns store the string form of these enums; everything past the
//! entity layer works with the typed variants.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Per-customer conversation state, one of five phases of the order flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Idle,
    AwaitingFile,
    AwaitingPrintType,
    AwaitingCopies,
    AwaitingPayment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintType {
    Color,
    Bw,
    Both,
}

/// Order status, forward-only: DRAFT -> PAYMENT_PENDING -> PAID, or
/// DRAFT -> CANCELLED.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    PaymentPending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Whether moving to `next` respects the monotonic lifecycle.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Draft, PaymentPending) | (Draft, Cancelled) | (PaymentPending, Paid)
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Initiated,
    Success,
    Failed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintJobStatus {
    Queued,
    Printing,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn enum_strings_round_trip() {
        for state in ConversationState::iter() {
            assert_eq!(ConversationState::from_str(&state.to_string()).unwrap(), state);
        }
        for status in OrderStatus::iter() {
            assert_eq!(OrderStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert_eq!(PrintType::Bw.to_string(), "BW");
        assert_eq!(ConversationState::AwaitingPrintType.to_string(), "AWAITING_PRINT_TYPE");
    }

    #[test]
    fn order_status_never_regresses() {
        use OrderStatus::*;
        assert!(Draft.can_transition_to(PaymentPending));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(PaymentPending.can_transition_to(Paid));

        assert!(!Paid.can_transition_to(Draft));
        assert!(!Paid.can_transition_to(PaymentPending));
        assert!(!PaymentPending.can_transition_to(Draft));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(!PaymentPending.can_transition_to(Cancelled));
    }
}
