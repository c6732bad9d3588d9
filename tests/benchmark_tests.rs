//! Performance benchmarks for critical arena systems

use bincode::{deserialize, serialize};
use client::mirror::Mirror;
use glam::Vec3;
use server::config::{ArenaConfig, KartTuning, ServerConfig};
use server::game::GameState;
use server::physics::{KartBody, PhysicsWorld, QueryFilter};
use server::scheduler::{Scheduler, Task};
use shared::{KartField, MatchPhase, Packet, ServerEvent, WeaponType};
use std::time::Instant;

const DT: f32 = 1.0 / 30.0;

/// Benchmarks a full tick with a busy arena
#[test]
fn benchmark_world_tick() {
    let mut world = GameState::new(ServerConfig::default(), 42);
    for client_id in 1..=8 {
        world.add_player(client_id, &format!("player-{}", client_id));
    }
    for i in 0..16 {
        world.add_ai_kart(&format!("bot-{}", i));
    }

    // Reach Playing so weapons and AI driving are live
    while world.phase() != MatchPhase::Playing {
        world.update(DT);
        world.drain_events();
    }
    for kart in world.karts.keys().copied().collect::<Vec<_>>() {
        world.give_pickup_to(kart, WeaponType::Blade, 5);
    }

    let iterations = 600;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 15 == 0 {
            for client_id in 1..=8 {
                world.apply_command(client_id, shared::ClientCommand::FireWeapon { aim: Vec3::Z });
            }
        }
        world.update(DT);
        let _ = world.drain_events();
        let _ = world.snapshot(0);
    }

    let duration = start.elapsed();
    println!(
        "World tick: {} ticks with {} karts in {:?} ({:.2} μs/tick)",
        iterations,
        world.karts.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 20 simulated seconds should take well under 2 real seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks overlap queries against a crowded collider set
#[test]
fn benchmark_overlap_queries() {
    let arena = ArenaConfig::default();
    let tuning = KartTuning::default();
    let mut physics = PhysicsWorld::new(&arena);

    for i in 0..64u32 {
        let x = (i % 8) as f32 * 5.0 - 20.0;
        let z = (i / 8) as f32 * 5.0 - 20.0;
        physics.add_kart_colliders(i, &KartBody::at(Vec3::new(x, 0.0, z), 0.0), &tuning);
    }

    let iterations = 10_000;
    let start = Instant::now();
    let mut found = 0;

    for i in 0..iterations {
        let center = Vec3::new((i % 40) as f32 - 20.0, 0.5, ((i / 40) % 40) as f32 - 20.0);
        found += physics.overlap_sphere(center, 5.0, QueryFilter::ENTITIES).len();
    }

    let duration = start.elapsed();
    println!(
        "Overlap queries: {} queries ({} hits) in {:?} ({:.2} μs/query)",
        iterations,
        found,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(found > 0);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks scheduling and draining deferred tasks
#[test]
fn benchmark_scheduler() {
    let mut scheduler = Scheduler::new();
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        scheduler.schedule(
            (i % 1000) as f64 * 0.01,
            Task::RespawnPickup { pad: i as u32 },
        );
    }

    let mut drained = 0;
    let mut now = 0.0;
    while !scheduler.is_empty() {
        now += DT as f64;
        drained += scheduler.take_due(now).len();
    }

    let duration = start.elapsed();
    println!(
        "Scheduler: {} tasks in {:?} ({:.2} ns/task)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(drained, iterations);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks applying replicated events on a mirror
#[test]
fn benchmark_mirror_apply() {
    let mut mirror = Mirror::new();
    mirror.set_local_entity(1);

    let events: Vec<ServerEvent> = (0..1000u32)
        .map(|i| ServerEvent::KartChanged {
            entity: i % 32,
            field: KartField::Health((i % 100) as f32),
        })
        .collect();

    let iterations = 100u32;
    let start = Instant::now();

    for tick in 0..iterations {
        mirror.apply_events(tick, &events);
        mirror.take_signals();
    }

    let duration = start.elapsed();
    println!(
        "Mirror apply: {} events in {:?}",
        iterations as usize * events.len(),
        duration
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot serialization for a full arena
#[test]
fn benchmark_snapshot_serialization() {
    let mut world = GameState::new(ServerConfig::default(), 5);
    for client_id in 1..=32 {
        world.add_player(client_id, &format!("p{}", client_id));
    }
    let snapshot = world.snapshot(0);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = serialize(&snapshot).unwrap();
        let _: Packet = deserialize(&bytes).unwrap();
    }

    let duration = start.elapsed();
    let size = serialize(&snapshot).unwrap().len();
    println!(
        "Snapshot serialization: {} bytes, {} round trips in {:?}",
        size, iterations, duration
    );

    // Must fit a single UDP datagram
    assert!(size < 4096);
    assert!(duration.as_millis() < 2000);
}
