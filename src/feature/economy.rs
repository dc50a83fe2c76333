//! Reclaim / repair / resurrect accounting
//!
//! The canonical quantity is `reclaim_left` in [0, 1]: stored metal and
//! energy are always `def_max * reclaim_left`, so the two resources drain in
//! the definition's ratio and the end state depends only on the cumulative
//! build power applied, never on call granularity.
//!
//! Anti-exploit latch: the first time reclaim pulls resource below maximum,
//! `repairing_before_resurrect` engages. While it is engaged, positive build
//! power repairs the resource and resurrect progress cannot advance; the
//! latch clears only when resource is back at exactly maximum. This stops
//! the reclaim-a-little / resurrect-a-little loop from minting resources.

use crate::core::types::{ResourceKind, TeamId, Tick};
use crate::core::SimRules;
use crate::defs::FeatureDef;

use super::{Feature, FeatureState};

/// Team economy ledger, owned by the surrounding session
pub trait TeamLedger {
    fn credit(&mut self, team: TeamId, kind: ResourceKind, amount: f32);
    /// Withdraw if the balance allows it; returns whether it did
    fn try_debit(&mut self, team: TeamId, kind: ResourceKind, amount: f32) -> bool;
}

/// What one build-power application did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPowerOutcome {
    /// Guarded out: wrong state, wrong def, per-tick limit, or no funds
    Unchanged,
    /// Resource drained; the feature persists
    Reclaiming,
    /// Fully reclaimed; the caller removes the feature this call
    Reclaimed,
    /// Resource restored toward maximum (latch engaged)
    Repairing,
    /// Resurrect progress advanced
    Resurrecting,
    /// Progress reached 1: spawn the stored unit type, then remove
    Resurrected,
}

impl BuildPowerOutcome {
    /// Whether the feature leaves the world as a result of this call
    pub fn removes_feature(&self) -> bool {
        matches!(self, Self::Reclaimed | Self::Resurrected)
    }
}

/// Build power needed to fully reclaim (or re-repair) one unit of this def
pub(crate) fn def_cost(def: &FeatureDef, rules: &SimRules) -> f32 {
    (def.metal + def.energy * rules.reclaim_feature_energy_cost_factor).max(1.0)
}

/// Chunk index of a reclaim fraction: payouts happen on boundary crossings
fn chunk_index(fraction: f32, chunks: u32) -> u32 {
    (fraction * chunks as f32).ceil() as u32
}

impl Feature {
    /// Fraction of the given resource still stored, in [0, 1]
    ///
    /// Monotonic in cumulative reclaim and independent of call granularity.
    pub fn remaining_resource(&self, kind: ResourceKind) -> f32 {
        let (left, max) = match kind {
            ResourceKind::Metal => (self.metal, self.def.metal),
            ResourceKind::Energy => (self.energy, self.def.energy),
        };
        if max <= 0.0 {
            return 0.0;
        }
        (left / max).clamp(0.0, 1.0)
    }

    pub fn metal(&self) -> f32 {
        self.metal
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn reclaim_left(&self) -> f32 {
        self.reclaim_left
    }

    pub fn resurrect_progress(&self) -> f32 {
        self.resurrect_progress
    }

    pub fn is_repairing_before_resurrect(&self) -> bool {
        self.repairing_before_resurrect
    }

    /// Clamp and apply a new reclaim fraction, keeping resources and the
    /// anti-exploit latch in sync
    pub(crate) fn set_reclaim_left(&mut self, value: f32) {
        self.reclaim_left = value.clamp(0.0, 1.0);
        if self.reclaim_left < 1.0 {
            self.metal = self.def.metal * self.reclaim_left;
            self.energy = self.def.energy * self.reclaim_left;
            self.repairing_before_resurrect = true;
        } else {
            // Restore to exactly maximum so the latch comparison is bit-exact.
            self.metal = self.def.metal;
            self.energy = self.def.energy;
            self.repairing_before_resurrect = false;
        }
    }

    /// Apply build power from one actor: negative reclaims, positive repairs
    /// and then resurrects
    ///
    /// The caller guarantees exclusive access per feature per tick (single
    /// logical writer); with `multi_reclaim == 0` a second reclaim in the
    /// same tick is additionally guarded out here.
    pub fn apply_build_power(
        &mut self,
        amount: f32,
        actor: TeamId,
        tick: Tick,
        rules: &SimRules,
        ledger: &mut dyn TeamLedger,
    ) -> BuildPowerOutcome {
        if amount == 0.0 {
            return BuildPowerOutcome::Unchanged;
        }
        // Any economic interaction restarts the decay grace period.
        self.decay_ticks = 0;

        if amount < 0.0 {
            self.reclaim(-amount, actor, tick, rules, ledger)
        } else {
            self.repair_or_resurrect(amount, actor, rules, ledger)
        }
    }

    fn reclaim(
        &mut self,
        amount: f32,
        actor: TeamId,
        tick: Tick,
        rules: &SimRules,
        ledger: &mut dyn TeamLedger,
    ) -> BuildPowerOutcome {
        if !self.def.reclaimable || self.reclaim_left <= 0.0 {
            return BuildPowerOutcome::Unchanged;
        }
        if rules.multi_reclaim == 0 && self.last_reclaim == Some(tick) {
            return BuildPowerOutcome::Unchanged;
        }

        let old = self.reclaim_left;
        let new = (old - amount / def_cost(&self.def, rules)).max(0.0);

        // Payouts are positional in reclaim_left, so N small drains credit
        // exactly what one large drain of the same total would.
        let payout = match rules.reclaim_method {
            0 => {
                if new <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            chunks => {
                let crossed = chunk_index(old, chunks) - chunk_index(new, chunks);
                crossed as f32 / chunks as f32
            }
        };
        if payout > 0.0 {
            let scale = payout * rules.reclaim_efficiency;
            ledger.credit(actor, ResourceKind::Metal, self.def.metal * scale);
            ledger.credit(actor, ResourceKind::Energy, self.def.energy * scale);
        }

        self.set_reclaim_left(new);
        self.last_reclaim = Some(tick);

        if self.reclaim_left <= 0.0 {
            BuildPowerOutcome::Reclaimed
        } else {
            BuildPowerOutcome::Reclaiming
        }
    }

    fn repair_or_resurrect(
        &mut self,
        amount: f32,
        actor: TeamId,
        rules: &SimRules,
        ledger: &mut dyn TeamLedger,
    ) -> BuildPowerOutcome {
        // Positive build power only means something for features that can
        // come back as a unit.
        let Some(udef) = self.resurrect_to.clone() else {
            return BuildPowerOutcome::Unchanged;
        };

        if self.repairing_before_resurrect {
            let energy_cost = amount * rules.repair_energy_cost_factor;
            if energy_cost > 0.0 && !ledger.try_debit(actor, ResourceKind::Energy, energy_cost) {
                return BuildPowerOutcome::Unchanged;
            }
            self.set_reclaim_left(self.reclaim_left + amount / def_cost(&self.def, rules));
            return BuildPowerOutcome::Repairing;
        }

        let energy_cost = amount * rules.resurrect_energy_cost_factor;
        if energy_cost > 0.0 && !ledger.try_debit(actor, ResourceKind::Energy, energy_cost) {
            return BuildPowerOutcome::Unchanged;
        }

        self.resurrect_progress = (self.resurrect_progress + amount / udef.build_time.max(1.0)).min(1.0);
        if self.state == FeatureState::Wreck {
            self.state = FeatureState::Resurrecting;
        }

        if self.resurrect_progress >= 1.0 {
            BuildPowerOutcome::Resurrected
        } else {
            BuildPowerOutcome::Resurrecting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_def, test_feature};
    use super::*;
    use ahash::AHashMap;

    /// Minimal ledger for unit tests; the full one lives in `simulation`
    #[derive(Default)]
    struct TestLedger {
        balances: AHashMap<(TeamId, ResourceKind), f32>,
    }

    impl TestLedger {
        fn balance(&self, team: TeamId, kind: ResourceKind) -> f32 {
            self.balances.get(&(team, kind)).copied().unwrap_or(0.0)
        }

        fn fund(&mut self, team: TeamId, kind: ResourceKind, amount: f32) {
            *self.balances.entry((team, kind)).or_insert(0.0) += amount;
        }
    }

    impl TeamLedger for TestLedger {
        fn credit(&mut self, team: TeamId, kind: ResourceKind, amount: f32) {
            *self.balances.entry((team, kind)).or_insert(0.0) += amount;
        }

        fn try_debit(&mut self, team: TeamId, kind: ResourceKind, amount: f32) -> bool {
            let balance = self.balances.entry((team, kind)).or_insert(0.0);
            if *balance < amount {
                return false;
            }
            *balance -= amount;
            true
        }
    }

    fn rez_feature() -> Feature {
        let mut def = test_def("tank_wreck");
        def.max_health = 0.0;
        def.metal = 20.0;
        def.energy = 4.0;
        def.resurrect_to = Some("tank".to_string());
        let mut f = test_feature(def);
        f.resurrect_to = Some(std::sync::Arc::new(crate::defs::UnitDef {
            name: "tank".to_string(),
            build_time: 100.0,
            metal_cost: 20.0,
            energy_cost: 50.0,
        }));
        f
    }

    const TEAM: TeamId = TeamId(1);

    #[test]
    fn test_reclaim_respects_bounds() {
        let rules = SimRules::default();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        for tick in 0..1000 {
            f.apply_build_power(-3.0, TEAM, tick, &rules, &mut ledger);
            let m = f.remaining_resource(ResourceKind::Metal);
            assert!((0.0..=1.0).contains(&m));
        }
        assert_eq!(f.remaining_resource(ResourceKind::Metal), 0.0);
    }

    #[test]
    fn test_reclaim_granularity_equivalence() {
        let rules = SimRules::default();

        // One big reclaim call.
        let mut coarse_ledger = TestLedger::default();
        let mut coarse = rez_feature();
        coarse.apply_build_power(-10.0, TEAM, 1, &rules, &mut coarse_ledger);

        // The same total over many ticks.
        let mut fine_ledger = TestLedger::default();
        let mut fine = rez_feature();
        for tick in 0..20 {
            fine.apply_build_power(-0.5, TEAM, tick, &rules, &mut fine_ledger);
        }

        let dm = coarse.remaining_resource(ResourceKind::Metal)
            - fine.remaining_resource(ResourceKind::Metal);
        assert!(dm.abs() < 1e-4);
        assert!((coarse.reclaim_left() - fine.reclaim_left()).abs() < 1e-4);
    }

    #[test]
    fn test_full_reclaim_credits_full_value() {
        let rules = SimRules::load_json(r#"{ "reclaimMethod": 4 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        let mut tick = 0;
        loop {
            tick += 1;
            let outcome = f.apply_build_power(-3.0, TEAM, tick, &rules, &mut ledger);
            if outcome == BuildPowerOutcome::Reclaimed {
                break;
            }
            assert_eq!(outcome, BuildPowerOutcome::Reclaiming);
        }

        // def metal 20, energy 4, efficiency 1.0: all four chunks paid out.
        assert!((ledger.balance(TEAM, ResourceKind::Metal) - 20.0).abs() < 1e-3);
        assert!((ledger.balance(TEAM, ResourceKind::Energy) - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_or_nothing_method_pays_only_on_completion() {
        let rules = SimRules::load_json(r#"{ "reclaimMethod": 0 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        f.apply_build_power(-10.0, TEAM, 1, &rules, &mut ledger);
        assert_eq!(ledger.balance(TEAM, ResourceKind::Metal), 0.0);

        let outcome = f.apply_build_power(-50.0, TEAM, 2, &rules, &mut ledger);
        assert_eq!(outcome, BuildPowerOutcome::Reclaimed);
        assert!((ledger.balance(TEAM, ResourceKind::Metal) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_reclaim_efficiency_scales_payout() {
        let rules =
            SimRules::load_json(r#"{ "reclaimMethod": 1, "reclaimEfficiency": 0.5 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        let outcome = f.apply_build_power(-100.0, TEAM, 1, &rules, &mut ledger);
        assert_eq!(outcome, BuildPowerOutcome::Reclaimed);
        assert!((ledger.balance(TEAM, ResourceKind::Metal) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_multi_reclaim_guard_serializes_per_tick() {
        let rules = SimRules::default(); // multi_reclaim = 0
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        assert_eq!(
            f.apply_build_power(-3.0, TEAM, 5, &rules, &mut ledger),
            BuildPowerOutcome::Reclaiming
        );
        // Second reclaimer in the same tick is a no-op.
        assert_eq!(
            f.apply_build_power(-3.0, TeamId(2), 5, &rules, &mut ledger),
            BuildPowerOutcome::Unchanged
        );
        let after_guard = f.reclaim_left();

        // Next tick reclaims again.
        assert_eq!(
            f.apply_build_power(-3.0, TeamId(2), 6, &rules, &mut ledger),
            BuildPowerOutcome::Reclaiming
        );
        assert!(f.reclaim_left() < after_guard);
    }

    #[test]
    fn test_multi_reclaim_nonzero_allows_stacking() {
        let rules = SimRules::load_json(r#"{ "multiReclaim": 1 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        f.apply_build_power(-3.0, TEAM, 5, &rules, &mut ledger);
        let first = f.reclaim_left();
        f.apply_build_power(-3.0, TeamId(2), 5, &rules, &mut ledger);
        assert!(f.reclaim_left() < first);
    }

    #[test]
    fn test_latch_engages_on_first_drain() {
        let rules = SimRules::default();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        assert!(!f.is_repairing_before_resurrect());
        f.apply_build_power(-1.0, TEAM, 1, &rules, &mut ledger);
        assert!(f.is_repairing_before_resurrect());
        assert!(f.remaining_resource(ResourceKind::Metal) < 1.0);
    }

    #[test]
    fn test_progress_pinned_until_fully_repaired() {
        let rules = SimRules::load_json(r#"{ "resurrectEnergyCostFactor": 0.0 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        // Partially reclaim, then oscillate repair/reclaim.
        f.apply_build_power(-6.0, TEAM, 1, &rules, &mut ledger);
        for tick in 2..20 {
            let amount = if tick % 2 == 0 { 2.0 } else { -2.0 };
            f.apply_build_power(amount, TEAM, tick, &rules, &mut ledger);
            assert_eq!(
                f.resurrect_progress(),
                0.0,
                "progress advanced mid-oscillation at tick {tick}"
            );
        }

        // Repair all the way back to maximum...
        let mut tick = 100;
        while f.is_repairing_before_resurrect() {
            f.apply_build_power(5.0, TEAM, tick, &rules, &mut ledger);
            tick += 1;
        }
        assert_eq!(f.remaining_resource(ResourceKind::Metal), 1.0);
        assert_eq!(f.resurrect_progress(), 0.0);

        // ...and only now does positive power move progress.
        f.apply_build_power(5.0, TEAM, tick, &rules, &mut ledger);
        assert!(f.resurrect_progress() > 0.0);
    }

    #[test]
    fn test_resurrect_completion() {
        let rules = SimRules::load_json(r#"{ "resurrectEnergyCostFactor": 0.0 }"#).unwrap();
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        // build_time 100 at 50 power per call.
        assert_eq!(
            f.apply_build_power(50.0, TEAM, 1, &rules, &mut ledger),
            BuildPowerOutcome::Resurrecting
        );
        assert_eq!(f.state(), FeatureState::Resurrecting);

        let outcome = f.apply_build_power(50.0, TEAM, 2, &rules, &mut ledger);
        assert_eq!(outcome, BuildPowerOutcome::Resurrected);
        assert!(outcome.removes_feature());
        assert_eq!(f.resurrect_progress(), 1.0);
    }

    #[test]
    fn test_resurrect_charges_energy() {
        let rules = SimRules::default(); // resurrect factor 0.5
        let mut ledger = TestLedger::default();
        let mut f = rez_feature();

        // Broke team: no progress.
        assert_eq!(
            f.apply_build_power(10.0, TEAM, 1, &rules, &mut ledger),
            BuildPowerOutcome::Unchanged
        );
        assert_eq!(f.resurrect_progress(), 0.0);

        ledger.fund(TEAM, ResourceKind::Energy, 100.0);
        assert_eq!(
            f.apply_build_power(10.0, TEAM, 2, &rules, &mut ledger),
            BuildPowerOutcome::Resurrecting
        );
        assert!((ledger.balance(TEAM, ResourceKind::Energy) - 95.0).abs() < 1e-4);
    }

    #[test]
    fn test_positive_power_needs_resurrect_target() {
        let rules = SimRules::default();
        let mut ledger = TestLedger::default();
        let mut f = test_feature(test_def("boulder"));

        assert_eq!(
            f.apply_build_power(10.0, TEAM, 1, &rules, &mut ledger),
            BuildPowerOutcome::Unchanged
        );
    }

    #[test]
    fn test_non_reclaimable_def_is_guarded() {
        let rules = SimRules::default();
        let mut ledger = TestLedger::default();
        let mut def = test_def("monument");
        def.reclaimable = false;
        let mut f = test_feature(def);

        assert_eq!(
            f.apply_build_power(-10.0, TEAM, 1, &rules, &mut ledger),
            BuildPowerOutcome::Unchanged
        );
        assert_eq!(f.remaining_resource(ResourceKind::Metal), 1.0);
    }
}
