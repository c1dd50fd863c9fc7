use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// Tunable thresholds for the demand multiplier; frozen constants elsewhere
/// in this module are not exposed as configuration (§9: treated as frozen
/// heuristic constants, not product-tunable parameters).
#[derive(Debug, Clone, Copy)]
pub struct PricingRule {
    pub capacity_threshold_high: f64,
    pub capacity_threshold_low: f64,
    pub max_price_increase: f64,
    pub max_price_decrease: f64,
}

impl Default for PricingRule {
    fn default() -> Self {
        PricingRule {
            capacity_threshold_high: 0.8,
            capacity_threshold_low: 0.3,
            max_price_increase: 0.5,
            max_price_decrease: 0.2,
        }
    }
}

/// Observable state the evaluator needs; deliberately decoupled from the
/// `Event`/`Booking` entity types so this function stays pure and testable
/// without a database.
#[derive(Debug, Clone, Copy)]
pub struct PricingInputs {
    pub total_capacity: i64,
    pub available_capacity: i64,
    pub event_date: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub bookings_last_7_days: i64,
    pub bookings_previous_7_days: i64,
    pub waitlist_size: i64,
}

fn demand_multiplier(inputs: &PricingInputs, rule: &PricingRule) -> f64 {
    if inputs.total_capacity == 0 {
        return 1.0;
    }
    let utilisation = (inputs.total_capacity - inputs.available_capacity) as f64
        / inputs.total_capacity as f64;

    if utilisation >= rule.capacity_threshold_high {
        let excess = utilisation - rule.capacity_threshold_high;
        let max_excess = 1.0 - rule.capacity_threshold_high;
        1.0 + (excess / max_excess) * 0.3
    } else if utilisation <= rule.capacity_threshold_low {
        let deficit = rule.capacity_threshold_low - utilisation;
        1.0 - (deficit / rule.capacity_threshold_low) * 0.2
    } else {
        1.0
    }
}

fn time_multiplier(inputs: &PricingInputs) -> f64 {
    let days_until_event = (inputs.event_date - inputs.now).num_days();
    if days_until_event <= 1 {
        1.2
    } else if days_until_event <= 7 {
        1.1
    } else if days_until_event <= 30 {
        1.0
    } else if days_until_event <= 90 {
        0.95
    } else {
        0.9
    }
}

fn velocity_multiplier(inputs: &PricingInputs) -> f64 {
    if inputs.bookings_previous_7_days == 0 {
        return if inputs.bookings_last_7_days > 5 { 1.15 } else { 1.0 };
    }
    let ratio = inputs.bookings_last_7_days as f64 / inputs.bookings_previous_7_days as f64;
    if ratio >= 2.0 {
        1.2
    } else if ratio >= 1.5 {
        1.1
    } else if ratio <= 0.5 {
        0.9
    } else {
        1.0
    }
}

fn waitlist_multiplier(inputs: &PricingInputs) -> f64 {
    if inputs.waitlist_size == 0 {
        return 1.0;
    }
    let denominator = inputs.available_capacity.max(10) as f64;
    let pressure = inputs.waitlist_size as f64 / denominator;
    if pressure >= 2.0 {
        1.3
    } else if pressure >= 1.0 {
        1.15
    } else if pressure >= 0.5 {
        1.05
    } else {
        1.0
    }
}

/// Recomputes an event's price from its current observable state. Pure and
/// idempotent in its inputs (§4.8); the Scheduler is responsible for gating
/// persistence on the 1% delta threshold.
///
/// The four multipliers above are an inherently floating-point heuristic
/// (§4.8 exempts their intermediate arithmetic), but the money multiply
/// itself must not use binary floating-point (§6.2): `combined` and the
/// clamp bounds are round-tripped through `BigDecimal` before ever touching
/// `base_price`, matching the original's `base_price * Decimal(str(...))`.
pub fn evaluate_price(base_price: &BigDecimal, inputs: &PricingInputs, rule: &PricingRule) -> BigDecimal {
    let demand = demand_multiplier(inputs, rule);
    let time = time_multiplier(inputs);
    let velocity = velocity_multiplier(inputs);
    let waitlist = waitlist_multiplier(inputs);

    let combined = 0.4 * demand + 0.25 * time + 0.25 * velocity + 0.1 * waitlist;
    let combined = f64_to_bigdecimal(combined);

    let mut new_price = base_price * &combined;

    let max_increase = base_price * f64_to_bigdecimal(1.0 + rule.max_price_increase);
    let max_decrease = base_price * f64_to_bigdecimal(1.0 - rule.max_price_decrease);
    if new_price > max_increase {
        new_price = max_increase;
    }
    if new_price < max_decrease {
        new_price = max_decrease;
    }

    new_price.round(2)
}

/// Whether the proposed price differs from the current price by at least the
/// Scheduler's persistence gate (§4.7: "persist only if |Δ| ≥ 1%").
pub fn exceeds_persist_threshold(old_price: &BigDecimal, new_price: &BigDecimal) -> bool {
    let old_f64 = bigdecimal_to_f64(old_price);
    if old_f64 == 0.0 {
        return new_price != old_price;
    }
    let new_f64 = bigdecimal_to_f64(new_price);
    ((new_f64 - old_f64) / old_f64).abs() >= 0.01
}

fn bigdecimal_to_f64(d: &BigDecimal) -> f64 {
    d.to_string().parse().unwrap_or(0.0)
}

/// Round-trips a multiplier through its decimal string representation so it
/// can be multiplied against `base_price` without `base_price` itself ever
/// becoming an `f64`.
fn f64_to_bigdecimal(f: f64) -> BigDecimal {
    BigDecimal::from_str(&format!("{f:.10}")).unwrap_or_else(|_| BigDecimal::from(1))
}
