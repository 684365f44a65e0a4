//! Ticket priority scoring
//!
//! `score = α·S_norm + β·A_norm` where `S_norm` saturates at the severity
//! cap and `A_norm` saturates at `age_max_secs`. The weights must satisfy
//! `β > α·(MAX−1)/MAX` so an arbitrarily low-severity ticket eventually
//! outranks any fresh high-severity ticket purely by waiting; the
//! constructor refuses weights that violate this.
//!
//! Ordering is total: score descending, then arrival ascending (earlier
//! wins), then id.

use crate::error::ConfigError;
use crate::types::{BugTicket, RepairConfig};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Pure scoring function over tickets
#[derive(Debug, Clone)]
pub struct Prioritiser {
    severity_weight: f64,
    age_weight: f64,
    max_severity: u8,
    age_max_secs: f64,
}

impl Prioritiser {
    /// Build a prioritiser from validated configuration
    ///
    /// # Errors
    /// Propagates `RepairConfig::validate` failures; a starvation-prone
    /// weight pair never yields a working prioritiser.
    pub fn new(config: &RepairConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            severity_weight: config.severity_weight,
            age_weight: config.age_weight,
            max_severity: config.max_severity,
            age_max_secs: config.age_max_secs,
        })
    }

    /// Priority score of `ticket` at `now`, in `[0, α+β]`
    ///
    /// Monotone non-decreasing in both severity and age until saturation.
    #[must_use]
    pub fn score(&self, ticket: &BugTicket, now: DateTime<Utc>) -> f64 {
        let s_norm =
            f64::from(ticket.severity.min(self.max_severity)) / f64::from(self.max_severity);
        let a_norm = (ticket.age_seconds(now) / self.age_max_secs).min(1.0);
        self.severity_weight * s_norm + self.age_weight * a_norm
    }

    /// Compare two tickets; `Ordering::Greater` means `a` runs first
    #[must_use]
    pub fn compare(&self, a: &BugTicket, b: &BugTicket, now: DateTime<Utc>) -> Ordering {
        self.score(a, now)
            .total_cmp(&self.score(b, now))
            .then_with(|| b.arrived_at.cmp(&a.arrived_at))
            .then_with(|| b.id.cmp(&a.id))
    }

    /// The globally best ticket among `tickets`, or `None` if empty
    #[must_use]
    pub fn best<'a, I>(&self, tickets: I, now: DateTime<Utc>) -> Option<&'a BugTicket>
    where
        I: IntoIterator<Item = &'a BugTicket>,
    {
        tickets
            .into_iter()
            .max_by(|a, b| self.compare(a, b, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn prioritiser(alpha: f64, beta: f64, age_max: f64) -> Prioritiser {
        let config = RepairConfig::new()
            .with_weights(alpha, beta)
            .with_age_max_secs(age_max);
        Prioritiser::new(&config).unwrap()
    }

    #[test]
    fn worked_example_from_the_scoring_formula() {
        // α=0.40, β=0.60, AGE_MAX=45: a severity-1 ticket aged 45s scores
        // 0.40·0.2 + 0.60·1.0 = 0.68, beating a fresh severity-5 at 0.40
        let p = prioritiser(0.40, 0.60, 45.0);
        let now = Utc::now();

        let old_low = BugTicket::new("low", 1).with_arrival(now - Duration::seconds(45));
        let fresh_high = BugTicket::new("high", 5).with_arrival(now);

        assert!((p.score(&old_low, now) - 0.68).abs() < 1e-9);
        assert!((p.score(&fresh_high, now) - 0.40).abs() < 1e-9);
        assert_eq!(p.best([&old_low, &fresh_high], now).unwrap().id, old_low.id);
    }

    #[test]
    fn severity_saturates_at_the_cap() {
        let p = prioritiser(0.40, 0.60, 45.0);
        let now = Utc::now();

        let capped = BugTicket::new("a", 5).with_arrival(now);
        let over = BugTicket::new("b", 200).with_arrival(now);
        assert_eq!(p.score(&capped, now), p.score(&over, now));
    }

    #[test]
    fn age_saturates_at_age_max() {
        let p = prioritiser(0.40, 0.60, 45.0);
        let now = Utc::now();

        let at_max = BugTicket::new("a", 3).with_arrival(now - Duration::seconds(45));
        let far_past = BugTicket::new("b", 3).with_arrival(now - Duration::seconds(4500));
        assert_eq!(p.score(&at_max, now), p.score(&far_past, now));
    }

    #[test]
    fn ties_break_by_arrival_order() {
        let p = prioritiser(0.40, 0.60, 45.0);
        let now = Utc::now();

        let earlier = BugTicket::new("earlier", 3).with_arrival(now - Duration::seconds(10));
        let later = BugTicket::new("later", 3).with_arrival(now - Duration::seconds(10));
        // Identical score and arrival: id decides, deterministically
        assert_eq!(p.best([&later, &earlier], now).unwrap().id, earlier.id);

        let young = BugTicket::new("young", 3).with_arrival(now);
        let old = BugTicket::new("old", 3).with_arrival(now - Duration::seconds(1));
        assert_eq!(p.best([&young, &old], now).unwrap().id, old.id);
    }

    proptest! {
        /// For any valid (α, β) and any severity pair, a low-severity ticket
        /// aged to saturation outranks a fresh high-severity ticket
        #[test]
        fn starvation_freedom_for_valid_weights(
            alpha in 0.05f64..1.0,
            margin in 0.01f64..0.5,
            low_sev in 1u8..=5,
            high_sev in 1u8..=5,
        ) {
            let beta = alpha * 4.0 / 5.0 + margin;
            let p = prioritiser(alpha, beta, 45.0);
            let now = Utc::now();

            let aged = BugTicket::new("aged", low_sev)
                .with_arrival(now - Duration::seconds(45));
            let fresh = BugTicket::new("fresh", high_sev).with_arrival(now);

            prop_assert!(p.score(&aged, now) > p.score(&fresh, now));
        }

        /// Score is monotone non-decreasing in severity
        #[test]
        fn monotone_in_severity(sev in 1u8..5) {
            let p = prioritiser(0.40, 0.60, 45.0);
            let now = Utc::now();
            let lower = BugTicket::new("a", sev).with_arrival(now);
            let higher = BugTicket::new("b", sev + 1).with_arrival(now);
            prop_assert!(p.score(&lower, now) <= p.score(&higher, now));
        }
    }
}
