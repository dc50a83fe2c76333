//! Headless feature simulation demo
//!
//! Places a small field of features, wrecks a few of them, sets one on fire
//! and has two teams reclaim and resurrect while the world steps. Run with
//! RUST_LOG=debug for per-feature tracing.

use std::sync::Arc;

use glam::Vec3;

use wreckfield::core::types::{AllyTeamId, ResourceKind, TeamId};
use wreckfield::core::SimRules;
use wreckfield::defs::DefRegistry;
use wreckfield::feature::FeaturePlacement;
use wreckfield::simulation::{
    FeatureWorld, FlatGround, RecordedEffects, RecordedSpawner, SharedLedger,
};

const TICKS: u64 = 600;

fn demo_defs() -> DefRegistry {
    DefRegistry::load_json(
        r#"{
            "features": [
                { "name": "boulder", "max_health": 200.0, "metal": 40.0,
                  "footprint_x": 2, "footprint_z": 2 },
                { "name": "pine", "max_health": 30.0, "metal": 2.0, "energy": 25.0,
                  "burnable": true, "burn_time": 120, "smoke_interval": 10 },
                { "name": "tank_wreck", "metal": 120.0, "energy": 10.0,
                  "resurrect_to": "tank", "footprint_x": 3, "footprint_z": 3 }
            ],
            "units": [
                { "name": "tank", "build_time": 300.0,
                  "metal_cost": 120.0, "energy_cost": 900.0 }
            ]
        }"#,
    )
    .expect("demo defs are well-formed")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("starting headless feature simulation");

    let rules = SimRules::default();
    let mut world = FeatureWorld::new(rules, Arc::new(demo_defs()));
    let ground = FlatGround(0.0);
    let mut effects = RecordedEffects::new();
    let mut spawner = RecordedSpawner::new();
    let mut ledger = SharedLedger::new();

    let reclaimers = TeamId(0);
    let rescuers = TeamId(1);
    ledger.fund(rescuers, ResourceKind::Energy, 2000.0);

    // Scatter terrain features owned by gaia.
    let mut boulders = Vec::new();
    for i in 0..6 {
        let pos = Vec3::new(10.0 * i as f32, 0.0, 5.0);
        let id = world
            .place(&FeaturePlacement::new("boulder", pos), &ground)
            .expect("boulder def exists");
        boulders.push(id);
    }
    let pine = world
        .place(&FeaturePlacement::new("pine", Vec3::new(30.0, 0.0, 30.0)), &ground)
        .expect("pine def exists");

    // A wreck left over from an earlier battle, owned by team 1.
    let mut placement = FeaturePlacement::new("tank_wreck", Vec3::new(50.0, 0.0, 50.0));
    placement.team = rescuers;
    placement.allyteam = AllyTeamId(1);
    let wreck = world.place(&placement, &ground).expect("wreck def exists");

    world.start_fire(pine, &mut effects);

    for tick in 0..TICKS {
        // Team 0 works through the boulder field, one at a time.
        if let Some(&target) = boulders.iter().find(|id| world.feature(**id).is_some()) {
            if tick % 3 == 0 {
                world.apply_damage(target, 15.0, Vec3::ZERO, None, None, &mut effects);
            }
            world.apply_build_power(
                target, -4.0, reclaimers, &mut ledger, &mut spawner, &mut effects,
            );
        }

        // Team 1 resurrects its tank.
        world.apply_build_power(wreck, 3.0, rescuers, &mut ledger, &mut spawner, &mut effects);

        for event in world.step(&mut effects) {
            tracing::info!(tick, ?event, "sim event");
        }
    }

    tracing::info!(
        ticks = TICKS,
        features_left = world.len(),
        metal_reclaimed = ledger.balance(reclaimers, ResourceKind::Metal),
        energy_left = ledger.balance(rescuers, ResourceKind::Energy),
        units_spawned = spawner.spawned.len(),
        effect_events = effects.events.len(),
        "simulation finished"
    );
}
