//! Order lifecycle rules.
//!
//! The status log is append-only. Everything here is pure: given the latest
//! entry (or the whole history) and a clock reading, these functions decide
//! which entries to append. The services apply the plans inside transactions.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimers {
    /// How long a `new` order may stay unpaid before it dies.
    pub payment_timeout: TimeDelta,
    /// How long a dead order stays visible.
    pub dead_order_retention: TimeDelta,
    /// How long a delivered order stays visible.
    pub completed_order_retention: TimeDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineKind {
    Stale,
    Expiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Deadline {
    pub kind: DeadlineKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPoint {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStep {
    MarkDead { at: DateTime<Utc> },
    Expire,
}

/// Current time at the precision the database stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Earliest usable timestamp for an entry that must follow `floor`.
pub fn next_instant(floor: DateTime<Utc>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    candidate.max(floor + TimeDelta::microseconds(1))
}

pub fn deadline(latest: StatusPoint, timers: &LifecycleTimers) -> Option<Deadline> {
    let (kind, window) = match latest.status {
        OrderStatus::New => (DeadlineKind::Stale, timers.payment_timeout),
        OrderStatus::Dead => (DeadlineKind::Expiry, timers.dead_order_retention),
        OrderStatus::Delivered => (DeadlineKind::Expiry, timers.completed_order_retention),
        _ => return None,
    };
    Some(Deadline {
        kind,
        at: latest.at + window,
    })
}

/// Steps due for an order whose latest entry is `latest`.
///
/// A stale order is marked dead at its deadline and re-evaluated, so a
/// sweep that runs late enough also expires it in the same pass.
pub fn plan_sweep(
    latest: StatusPoint,
    timers: &LifecycleTimers,
    now: DateTime<Utc>,
) -> Vec<SweepStep> {
    let mut steps = Vec::new();
    let mut current = latest;
    while let Some(due) = deadline(current, timers) {
        if now < due.at {
            break;
        }
        match due.kind {
            DeadlineKind::Stale => {
                let at = next_instant(current.at, due.at);
                steps.push(SweepStep::MarkDead { at });
                current = StatusPoint {
                    status: OrderStatus::Dead,
                    at,
                };
            }
            DeadlineKind::Expiry => {
                steps.push(SweepStep::Expire);
                break;
            }
        }
    }
    steps
}

/// Customers may only cancel or report payment on a fresh order.
pub fn customer_may_transition(current: OrderStatus, target: OrderStatus) -> bool {
    current == OrderStatus::New && matches!(target, OrderStatus::Dead | OrderStatus::Paid)
}

/// Entries to append when an operator moves an order to `target`.
///
/// Skipping past `payment-confirmed` backfills it one second before the
/// target entry. Returns nothing when the order already has `target`.
pub fn plan_admin_transition(
    history: &[StatusPoint],
    target: OrderStatus,
    now: DateTime<Utc>,
) -> Vec<StatusPoint> {
    let Some(latest) = history.last() else {
        return Vec::new();
    };
    if latest.status == target {
        return Vec::new();
    }

    let mut plan = Vec::with_capacity(2);
    let mut floor = latest.at;
    let confirmed_before = history
        .iter()
        .any(|p| p.status == OrderStatus::PaymentConfirmed);
    if target > OrderStatus::PaymentConfirmed && !confirmed_before {
        let at = next_instant(floor, now - TimeDelta::seconds(1));
        plan.push(StatusPoint {
            status: OrderStatus::PaymentConfirmed,
            at,
        });
        floor = at;
    }
    plan.push(StatusPoint {
        status: target,
        at: next_instant(floor, now),
    });
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timers() -> LifecycleTimers {
        LifecycleTimers {
            payment_timeout: TimeDelta::hours(24),
            dead_order_retention: TimeDelta::days(7),
            completed_order_retention: TimeDelta::days(30),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn point(status: OrderStatus, at: DateTime<Utc>) -> StatusPoint {
        StatusPoint { status, at }
    }

    #[test]
    fn deadlines_follow_latest_status() {
        let t = timers();
        let stale = deadline(point(OrderStatus::New, t0()), &t).unwrap();
        assert_eq!(stale.kind, DeadlineKind::Stale);
        assert_eq!(stale.at, t0() + TimeDelta::hours(24));

        let dead = deadline(point(OrderStatus::Dead, t0()), &t).unwrap();
        assert_eq!(dead.kind, DeadlineKind::Expiry);
        assert_eq!(dead.at, t0() + TimeDelta::days(7));

        let done = deadline(point(OrderStatus::Delivered, t0()), &t).unwrap();
        assert_eq!(done.at, t0() + TimeDelta::days(30));

        assert_eq!(deadline(point(OrderStatus::Paid, t0()), &t), None);
        assert_eq!(deadline(point(OrderStatus::ShippedToHub, t0()), &t), None);
    }

    #[test]
    fn unpaid_order_goes_stale_after_timeout() {
        let t = timers();
        let latest = point(OrderStatus::New, t0());
        assert!(plan_sweep(latest, &t, t0() + TimeDelta::hours(23)).is_empty());

        let steps = plan_sweep(latest, &t, t0() + TimeDelta::hours(25));
        assert_eq!(
            steps,
            vec![SweepStep::MarkDead {
                at: t0() + TimeDelta::hours(24)
            }]
        );
    }

    #[test]
    fn stale_and_expiry_chain_in_one_sweep() {
        let t = timers();
        let latest = point(OrderStatus::New, t0());
        let late = t0() + TimeDelta::hours(24) + TimeDelta::days(8);
        let steps = plan_sweep(latest, &t, late);
        assert_eq!(
            steps,
            vec![
                SweepStep::MarkDead {
                    at: t0() + TimeDelta::hours(24)
                },
                SweepStep::Expire,
            ]
        );
    }

    #[test]
    fn sweep_is_exact_at_deadline() {
        let t = timers();
        let latest = point(OrderStatus::Delivered, t0());
        let steps = plan_sweep(latest, &t, t0() + TimeDelta::days(30));
        assert_eq!(steps, vec![SweepStep::Expire]);
    }

    #[test]
    fn in_progress_orders_never_sweep() {
        let t = timers();
        let latest = point(OrderStatus::OutForDelivery, t0());
        assert!(plan_sweep(latest, &t, t0() + TimeDelta::days(365)).is_empty());
    }

    #[test]
    fn customer_transitions_are_restricted() {
        for target in OrderStatus::ALL {
            let allowed = customer_may_transition(OrderStatus::New, target);
            assert_eq!(
                allowed,
                matches!(target, OrderStatus::Dead | OrderStatus::Paid),
                "new -> {target:?}"
            );
        }
        assert!(!customer_may_transition(OrderStatus::Paid, OrderStatus::Dead));
        assert!(!customer_may_transition(OrderStatus::Dead, OrderStatus::Paid));
    }

    #[test]
    fn admin_skip_backfills_payment_confirmation() {
        let history = vec![
            point(OrderStatus::New, t0()),
            point(OrderStatus::Paid, t0() + TimeDelta::minutes(5)),
        ];
        let now = t0() + TimeDelta::hours(2);
        let plan = plan_admin_transition(&history, OrderStatus::ShippedToHub, now);
        assert_eq!(
            plan,
            vec![
                point(OrderStatus::PaymentConfirmed, now - TimeDelta::seconds(1)),
                point(OrderStatus::ShippedToHub, now),
            ]
        );
    }

    #[test]
    fn admin_no_backfill_when_confirmed_or_not_skipping() {
        let now = t0() + TimeDelta::hours(2);
        let history = vec![
            point(OrderStatus::New, t0()),
            point(OrderStatus::PaymentConfirmed, t0() + TimeDelta::minutes(1)),
        ];
        let plan = plan_admin_transition(&history, OrderStatus::Delivered, now);
        assert_eq!(plan, vec![point(OrderStatus::Delivered, now)]);

        let fresh = vec![point(OrderStatus::New, t0())];
        let plan = plan_admin_transition(&fresh, OrderStatus::Dead, now);
        assert_eq!(plan, vec![point(OrderStatus::Dead, now)]);
    }

    #[test]
    fn admin_same_status_is_noop() {
        let history = vec![point(OrderStatus::New, t0())];
        assert!(plan_admin_transition(&history, OrderStatus::New, t0()).is_empty());
        assert!(plan_admin_transition(&[], OrderStatus::Paid, t0()).is_empty());
    }

    #[test]
    fn admin_plan_stays_strictly_increasing() {
        // The previous entry is less than a second old, so the backfill
        // cannot sit a full second before now.
        let latest_at = t0();
        let now = t0() + TimeDelta::milliseconds(200);
        let history = vec![point(OrderStatus::New, latest_at)];
        let plan = plan_admin_transition(&history, OrderStatus::ShippedToHub, now);
        assert_eq!(plan.len(), 2);
        assert!(plan[0].at > latest_at);
        assert!(plan[1].at > plan[0].at);
        assert_eq!(plan[1].at, now);
    }
}
