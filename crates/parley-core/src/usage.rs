//! Usage meter and the gating view model derived from it.
//!
//! The count always comes from the backend. The client never resets a window
//! itself; a rollover shows up as a smaller count on the next refresh.

use crate::types::UsageSnapshot;

/// Gating stage for the current count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unrestricted,
    Notice { remaining: u32 },
    SevereNotice { remaining: u32 },
    Blocked,
}

/// Remaining-messages banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageNotice {
    pub text: String,
    pub severe: bool,
}

/// One plan card on the upgrade panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub name: &'static str,
    pub price: &'static str,
    pub features: Vec<String>,
    pub action: PlanAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Acknowledge and reload the main view
    ContinueFree,
    /// Start hosted checkout
    Upgrade,
}

impl PlanAction {
    pub fn label(&self) -> &'static str {
        match self {
            PlanAction::ContinueFree => "Continue Free",
            PlanAction::Upgrade => "Upgrade Now",
        }
    }
}

/// Shown instead of the notice once the free quota is used up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePanel {
    pub headline: String,
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageMeter {
    current_count: u32,
    limit: u32,
    time_frame: String,
    is_premium: bool,
}

impl UsageMeter {
    pub fn new(limit: u32, time_frame: impl Into<String>) -> Self {
        Self {
            current_count: 0,
            limit,
            time_frame: time_frame.into(),
            is_premium: false,
        }
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn time_frame(&self) -> &str {
        &self.time_frame
    }

    pub fn is_premium(&self) -> bool {
        self.is_premium
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current_count)
    }

    /// Take the backend's count and window label as-is
    pub fn apply_snapshot(&mut self, snapshot: UsageSnapshot) {
        if snapshot.time_frame != self.time_frame {
            tracing::warn!(
                "Backend reports time frame '{}' but client is configured for '{}'",
                snapshot.time_frame,
                self.time_frame
            );
        }
        self.current_count = snapshot.current_count;
        self.time_frame = snapshot.time_frame;
    }

    pub fn set_premium(&mut self, is_premium: bool) {
        self.is_premium = is_premium;
    }

    pub fn gate(&self) -> GateState {
        if self.is_premium {
            return GateState::Unrestricted;
        }

        // Compare by adding to the count so small limits cannot underflow.
        let count = self.current_count;
        if count >= self.limit {
            GateState::Blocked
        } else if count.saturating_add(1) == self.limit {
            GateState::SevereNotice {
                remaining: self.remaining(),
            }
        } else if count.saturating_add(2) == self.limit {
            GateState::Notice {
                remaining: self.remaining(),
            }
        } else {
            GateState::Unrestricted
        }
    }

    /// False only for a non-premium account at or over the limit
    pub fn can_send(&self) -> bool {
        self.gate() != GateState::Blocked
    }

    pub fn notice(&self) -> Option<UsageNotice> {
        match self.gate() {
            GateState::Notice { remaining } => Some(UsageNotice {
                text: format!("Note: You have {} messages remaining.", remaining),
                severe: false,
            }),
            GateState::SevereNotice { remaining } => Some(UsageNotice {
                text: format!(
                    "Warning: You have {} message{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                ),
                severe: true,
            }),
            GateState::Unrestricted | GateState::Blocked => None,
        }
    }

    pub fn upgrade_panel(&self) -> Option<UpgradePanel> {
        if self.gate() != GateState::Blocked {
            return None;
        }

        Some(UpgradePanel {
            headline: format!(
                "You've reached your {} message limit this {}.",
                self.limit, self.time_frame
            ),
            plans: vec![
                Plan {
                    name: "Free Plan",
                    price: "$0",
                    features: vec![
                        format!("{} messages per {}", self.limit, self.time_frame),
                        "Basic chat features".to_string(),
                        "Multiple chat sessions".to_string(),
                    ],
                    action: PlanAction::ContinueFree,
                },
                Plan {
                    name: "Premium",
                    price: "$9.99/month",
                    features: vec![
                        "Unlimited messages".to_string(),
                        "Priority support".to_string(),
                        "Advanced features".to_string(),
                    ],
                    action: PlanAction::Upgrade,
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter_at(count: u32) -> UsageMeter {
        let mut meter = UsageMeter::new(10, "minute");
        meter.apply_snapshot(UsageSnapshot {
            current_count: count,
            time_frame: "minute".to_string(),
        });
        meter
    }

    #[test]
    fn test_no_notice_well_below_limit() {
        for count in 0..8 {
            let meter = meter_at(count);
            assert_eq!(meter.gate(), GateState::Unrestricted, "count {}", count);
            assert!(meter.notice().is_none());
            assert!(meter.upgrade_panel().is_none());
            assert!(meter.can_send());
        }
    }

    #[test]
    fn test_notice_two_remaining() {
        let meter = meter_at(8);
        assert_eq!(meter.gate(), GateState::Notice { remaining: 2 });
        let notice = meter.notice().unwrap();
        assert_eq!(notice.text, "Note: You have 2 messages remaining.");
        assert!(!notice.severe);
    }

    #[test]
    fn test_severe_notice_one_remaining() {
        let meter = meter_at(9);
        assert_eq!(meter.gate(), GateState::SevereNotice { remaining: 1 });
        let notice = meter.notice().unwrap();
        assert_eq!(notice.text, "Warning: You have 1 message remaining.");
        assert!(notice.severe);
        assert!(meter.can_send());
    }

    #[test]
    fn test_blocked_at_and_over_limit() {
        for count in [10, 11, 50] {
            let meter = meter_at(count);
            assert_eq!(meter.gate(), GateState::Blocked);
            assert!(!meter.can_send());
            assert!(meter.notice().is_none());
            assert_eq!(meter.remaining(), 0);

            let panel = meter.upgrade_panel().unwrap();
            assert_eq!(panel.headline, "You've reached your 10 message limit this minute.");
            let prices: Vec<_> = panel.plans.iter().map(|p| p.price).collect();
            assert_eq!(prices, vec!["$0", "$9.99/month"]);
            assert_eq!(panel.plans[0].features[0], "10 messages per minute");
            assert_eq!(panel.plans[1].action, PlanAction::Upgrade);
        }
    }

    #[test]
    fn test_premium_bypasses_gating() {
        for count in [0, 8, 9, 10, 100] {
            let mut meter = meter_at(count);
            meter.set_premium(true);
            assert_eq!(meter.gate(), GateState::Unrestricted);
            assert!(meter.can_send());
            assert!(meter.notice().is_none());
            assert!(meter.upgrade_panel().is_none());
        }
    }

    #[test]
    fn test_small_limits_do_not_underflow() {
        let mut meter = UsageMeter::new(1, "day");
        assert_eq!(meter.gate(), GateState::SevereNotice { remaining: 1 });

        meter.apply_snapshot(UsageSnapshot {
            current_count: 1,
            time_frame: "day".to_string(),
        });
        assert_eq!(meter.gate(), GateState::Blocked);
    }

    #[test]
    fn test_window_rollover_comes_from_backend() {
        let mut meter = meter_at(10);
        assert_eq!(meter.gate(), GateState::Blocked);

        meter.apply_snapshot(UsageSnapshot {
            current_count: 0,
            time_frame: "minute".to_string(),
        });
        assert_eq!(meter.gate(), GateState::Unrestricted);
    }

    #[test]
    fn test_backend_time_frame_label_wins() {
        let mut meter = UsageMeter::new(10, "minute");
        meter.apply_snapshot(UsageSnapshot {
            current_count: 10,
            time_frame: "hour".to_string(),
        });
        assert_eq!(meter.time_frame(), "hour");
        assert!(meter
            .upgrade_panel()
            .unwrap()
            .headline
            .ends_with("this hour."));
    }
}
