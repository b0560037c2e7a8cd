use serde::{Deserialize, Serialize};
use wayfarer_catalog::Destination;

use crate::booking::BookingType;

/// Tag an editor can put on a destination to force agent handling.
pub const AGENT_ASSISTED_TAG: &str = "agent-assisted";

/// Thresholds that push a booking to a human agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRules {
    #[serde(default = "default_guest_threshold")]
    pub agent_guest_threshold: u32,
    /// Minor currency units.
    #[serde(default = "default_price_threshold")]
    pub agent_price_threshold: i64,
    #[serde(default)]
    pub agent_categories: Vec<String>,
    #[serde(default = "default_commission_percentage")]
    pub commission_percentage: f64,
}

fn default_guest_threshold() -> u32 { 8 }
fn default_price_threshold() -> i64 { 1_000_000 }
fn default_commission_percentage() -> f64 { 10.0 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            agent_guest_threshold: default_guest_threshold(),
            agent_price_threshold: default_price_threshold(),
            agent_categories: vec!["EXPEDITION".to_string()],
            commission_percentage: default_commission_percentage(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    Requested,
    GroupSize,
    HighValue,
    Category,
    DestinationTag,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub booking_type: BookingType,
    pub reason: RoutingReason,
}

impl RoutingDecision {
    fn agent(reason: RoutingReason) -> Self {
        Self { booking_type: BookingType::Agent, reason }
    }
}

/// Decide whether a booking is paid directly or handed to an agent.
pub fn route(
    rules: &BookingRules,
    destination: &Destination,
    guests: u32,
    total_price: i64,
    agent_requested: bool,
) -> RoutingDecision {
    if agent_requested {
        return RoutingDecision::agent(RoutingReason::Requested);
    }
    if destination.has_tag(AGENT_ASSISTED_TAG) {
        return RoutingDecision::agent(RoutingReason::DestinationTag);
    }
    if rules
        .agent_categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&destination.category))
    {
        return RoutingDecision::agent(RoutingReason::Category);
    }
    if guests >= rules.agent_guest_threshold {
        return RoutingDecision::agent(RoutingReason::GroupSize);
    }
    if total_price >= rules.agent_price_threshold {
        return RoutingDecision::agent(RoutingReason::HighValue);
    }
    RoutingDecision { booking_type: BookingType::Direct, reason: RoutingReason::Default }
}
