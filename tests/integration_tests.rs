//! Integration tests for the arena authority, its mirrors and the transport
//!
//! These tests validate cross-crate interactions and real network behavior.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use client::controller::Controller;
use client::mirror::{Mirror, PresentationSignal};
use glam::Vec3;
use server::config::ServerConfig;
use server::game::GameState;
use server::physics::KartBody;
use shared::{
    ClientCommand, EntityId, KartField, MatchPhase, Packet, ServerEvent, WeaponType,
    PROTOCOL_VERSION,
};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const DT: f32 = 1.0 / 30.0;

fn quiet_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.arena.pickups.clear();
    config.arena.obstacles.clear();
    config
}

/// Steps the world and feeds everything it publishes into the mirror.
fn run_mirrored(world: &mut GameState, mirror: &mut Mirror, seconds: f32) -> Vec<ServerEvent> {
    let mut all = Vec::new();
    let ticks = (seconds / DT).round() as u32;
    for _ in 0..ticks {
        world.update(DT);
        let events = world.drain_events();
        mirror.apply_events(world.tick, &events);
        all.extend(events);
    }
    all
}

fn sync(world: &mut GameState, mirror: &mut Mirror) {
    let events = world.drain_events();
    mirror.apply_events(world.tick, &events);
}

/// Two participants in a running match, with a mirror for client 1 that has
/// seen every event since the world was created.
fn mirrored_match(config: ServerConfig) -> (GameState, Mirror, EntityId, EntityId) {
    let mut world = GameState::new(config, 11);
    let mut mirror = Mirror::new();

    let a = world.add_player(1, "ana");
    let b = world.add_player(2, "bo");
    mirror.set_local_entity(a);
    sync(&mut world, &mut mirror);

    for _ in 0..200 {
        run_mirrored(&mut world, &mut mirror, DT);
        if world.phase() == MatchPhase::Playing {
            break;
        }
    }
    assert_eq!(world.phase(), MatchPhase::Playing);
    (world, mirror, a, b)
}

fn place(world: &mut GameState, id: EntityId, position: Vec3, yaw: f32) {
    let kart = world.karts.get_mut(&id).unwrap();
    kart.body = KartBody::at(position, yaw);
    kart.grounded = true;
}

/// MIRROR CONSISTENCY TESTS
mod mirror_tests {
    use super::*;

    /// Every replicated field a mirror holds equals the authority's value
    #[test]
    fn mirror_matches_authority_after_blade_hit() {
        let (mut world, mut mirror, a, b) = mirrored_match(quiet_config());
        place(&mut world, a, Vec3::ZERO, 0.0);
        place(&mut world, b, Vec3::new(0.0, 0.0, 10.0), std::f32::consts::PI);

        world.give_pickup_to(a, WeaponType::Blade, 2);
        sync(&mut world, &mut mirror);
        assert_eq!(*mirror.local_kart().unwrap().weapon.get(), WeaponType::Blade);

        world.apply_command(1, ClientCommand::FireWeapon { aim: Vec3::Z });
        run_mirrored(&mut world, &mut mirror, 3.0);

        let authority_b = world.kart(b).unwrap();
        let mirror_b = mirror.kart(b).unwrap();
        assert_approx_eq!(*mirror_b.health.get(), authority_b.health.value());
        assert_approx_eq!(*mirror_b.health.get(), 75.0);

        let local = mirror.local_kart().unwrap();
        assert_eq!(*local.blade_ammo.get(), 1);
        assert_eq!(*local.weapon.get(), world.kart(a).unwrap().inventory.equipped());
    }

    /// Death and respawn of the local kart drive spectator mode
    #[test]
    fn local_death_enters_and_leaves_spectator() {
        let (mut world, mut mirror, a, b) = mirrored_match(quiet_config());
        mirror.take_signals();

        world.damage_kart(a, 100.0, Some(b));
        sync(&mut world, &mut mirror);

        let signals = mirror.take_signals();
        assert!(signals.contains(&PresentationSignal::EnterSpectator));
        assert!(!mirror.controls_enabled());
        assert_eq!(mirror.score(b).unwrap().kills, 1);
        assert_eq!(mirror.score(a).unwrap().deaths, 1);

        run_mirrored(&mut world, &mut mirror, 3.5);
        let signals = mirror.take_signals();
        assert!(signals.contains(&PresentationSignal::LeaveSpectator));
        assert_approx_eq!(*mirror.local_kart().unwrap().health.get(), 100.0);
        assert!(mirror.controls_enabled());
    }

    /// A dropped event packet is repaired by the next snapshot, and arriving
    /// late afterwards changes nothing
    #[test]
    fn lost_event_packet_repaired_by_snapshot() {
        let (mut world, mut mirror, a, b) = mirrored_match(quiet_config());
        mirror.take_signals();

        world.damage_kart(a, 100.0, Some(b));
        let lost_tick = world.tick;
        let lost = world.drain_events();

        world.update(DT);
        let events = world.drain_events();
        mirror.apply_events(world.tick, &events);
        if let Packet::Snapshot {
            tick,
            state,
            karts,
            blades,
            mines,
            ..
        } = world.snapshot(0)
        {
            assert!(mirror.apply_snapshot(tick, &state, &karts, &blades, &mines));
        }

        assert!(!mirror.local_kart().unwrap().is_alive());
        assert_approx_eq!(*mirror.local_kart().unwrap().health.get(), 0.0);
        assert_eq!(mirror.score(b).unwrap().kills, 1);
        assert_eq!(mirror.score(a).unwrap().deaths, 1);
        assert!(mirror.take_signals().contains(&PresentationSignal::EnterSpectator));

        // Respawn, then the stale packet finally shows up
        run_mirrored(&mut world, &mut mirror, 3.5);
        assert!(mirror.local_kart().unwrap().is_alive());
        mirror.apply_events(lost_tick, &lost);
        assert!(mirror.local_kart().unwrap().is_alive());
        assert_approx_eq!(*mirror.local_kart().unwrap().health.get(), 100.0);
    }

    /// Score limit ends the match, results are shown, then the arena restarts
    #[test]
    fn game_over_results_then_restart_countdown() {
        let mut config = quiet_config();
        config.match_rules.score_to_win = 1;
        config.match_rules.restart_delay = 1.0;
        let (mut world, mut mirror, a, b) = mirrored_match(config);
        mirror.take_signals();

        world.damage_kart(b, 100.0, Some(a));
        run_mirrored(&mut world, &mut mirror, DT);

        assert_eq!(mirror.phase(), MatchPhase::GameOver);
        assert_eq!(mirror.winner_name(), Some("ana"));
        assert!(mirror.take_signals().contains(&PresentationSignal::ShowResults {
            winner_name: Some("ana".to_string())
        }));

        let events = run_mirrored(&mut world, &mut mirror, 1.5);
        assert!(events.contains(&ServerEvent::MatchPhaseChanged {
            phase: MatchPhase::WaitingForPlayers
        }));
        assert_eq!(mirror.phase(), MatchPhase::Countdown);
        assert!(mirror
            .take_signals()
            .contains(&PresentationSignal::CountdownStep(3)));
        assert_eq!(mirror.score(a).unwrap().kills, 0);
        assert!(mirror.kart(b).unwrap().is_alive());
    }

    /// A disconnected participant keeps a scoreboard row but loses its kart
    #[test]
    fn disconnect_removes_kart_but_keeps_score_row() {
        let (mut world, mut mirror, a, b) = mirrored_match(quiet_config());
        world.damage_kart(a, 100.0, Some(b));
        world.remove_player(2);
        sync(&mut world, &mut mirror);

        assert!(mirror.kart(b).is_none());
        let row = mirror.score(b).unwrap();
        assert!(!row.connected);
        assert_eq!(row.kills, 1);
    }
}

/// REQUEST PATH TESTS
mod request_tests {
    use super::*;

    /// The controller only sends what the mirror says is allowed, and the
    /// authority accepts exactly those requests
    #[test]
    fn controller_requests_accepted_by_authority() {
        let (mut world, mut mirror, a, _) = mirrored_match(quiet_config());
        let mut controller = Controller::new();

        world.give_pickup_to(a, WeaponType::Mine, 2);
        sync(&mut world, &mut mirror);

        let first = controller.drop_mine(&mirror).unwrap();
        world.apply_command(1, first);
        assert_eq!(world.mines().len(), 1);

        // Locally cooling down, nothing is sent
        assert!(controller.drop_mine(&mirror).is_none());

        // The authority rejects the same request on its own clock too
        world.apply_command(1, ClientCommand::DropMine);
        assert_eq!(world.mines().len(), 1);

        run_mirrored(&mut world, &mut mirror, 1.1);
        controller.advance(1.1);
        let second = controller.drop_mine(&mirror).unwrap();
        world.apply_command(1, second);
        assert_eq!(world.mines().len(), 2);

        run_mirrored(&mut world, &mut mirror, DT);
        assert_eq!(*mirror.local_kart().unwrap().mine_ammo.get(), 0);
        assert!(controller.drop_mine(&mirror).is_none());
    }

    /// Falling out of the arena is reported once and the authority recovers the kart
    #[test]
    fn fall_request_recovers_kart() {
        let (mut world, mut mirror, a, _) = mirrored_match(quiet_config());
        let mut controller = Controller::new();

        let kart = world.karts.get_mut(&a).unwrap();
        kart.body.position = Vec3::new(0.0, -12.0, 0.0);
        kart.grounded = false;
        let snapshot = world.snapshot(0);
        if let Packet::Snapshot {
            tick,
            state,
            karts,
            blades,
            mines,
            ..
        } = snapshot
        {
            mirror.apply_snapshot(tick, &state, &karts, &blades, &mines);
        }

        let request = controller.check_fall(&mirror).unwrap();
        assert!(controller.check_fall(&mirror).is_none());
        world.apply_command(1, request);
        sync(&mut world, &mut mirror);

        let kart = world.kart(a).unwrap();
        assert!(kart.body.position.y >= 0.0);
        assert_approx_eq!(kart.health.value(), 75.0);
        assert_approx_eq!(*mirror.local_kart().unwrap().health.get(), 75.0);
    }

    /// Arena layout loaded from TOML decides where karts spawn
    #[test]
    fn toml_spawn_points_used() {
        let config = ServerConfig::from_toml(
            r#"
            [arena]
            spawn_points = [
                { position = [5.0, 0.0, 5.0], yaw = 0.0 },
                { position = [-5.0, 0.0, -5.0], yaw = 3.14 },
            ]
            pickups = []
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        let mut world = GameState::new(config, 3);
        let a = world.add_player(1, "ana");
        let b = world.add_player(2, "bo");

        assert_eq!(world.kart(a).unwrap().body.position, Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(world.kart(b).unwrap().body.position, Vec3::new(-5.0, 0.0, -5.0));
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use server::network::Server;

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = vec![0u8; 65536];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for packet")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    /// Receives until a packet matches, skipping snapshots and unrelated events.
    async fn recv_until(socket: &UdpSocket, matches: impl Fn(&Packet) -> bool) -> Packet {
        for _ in 0..500 {
            let packet = recv_packet(socket).await;
            if matches(&packet) {
                return packet;
            }
        }
        panic!("Expected packet never arrived");
    }

    fn has_event(packet: &Packet, wanted: impl Fn(&ServerEvent) -> bool) -> bool {
        matches!(packet, Packet::Events { events, .. } if events.iter().any(wanted))
    }

    async fn send(socket: &UdpSocket, addr: SocketAddr, packet: &Packet) {
        socket.send_to(&serialize(packet).unwrap(), addr).await.unwrap();
    }

    async fn connect(addr: SocketAddr, name: &str) -> (UdpSocket, u32, EntityId) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send(
            &socket,
            addr,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
                display_name: name.to_string(),
            },
        )
        .await;

        match recv_until(&socket, |p| matches!(p, Packet::Connected { .. })).await {
            Packet::Connected {
                client_id,
                entity_id,
            } => (socket, client_id, entity_id),
            _ => unreachable!(),
        }
    }

    /// Runs a live server on an ephemeral port alongside the test body.
    async fn with_server<F, Fut>(body: F)
    where
        F: FnOnce(SocketAddr) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut server = Server::new(
            "127.0.0.1:0",
            Duration::from_millis(10),
            4,
            quiet_config(),
            0,
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();

        let server_loop = server.run();
        tokio::pin!(server_loop);

        tokio::select! {
            _ = &mut server_loop => panic!("Server loop exited"),
            _ = body(addr) => {}
        }
    }

    /// A new participant gets its kart and a full sync of the world
    #[tokio::test]
    async fn connect_receives_welcome_sync() {
        with_server(|addr| async move {
            let (socket, client_id, entity) = connect(addr, "ana").await;
            assert_eq!(client_id, 1);

            let welcome = recv_until(&socket, |p| {
                has_event(p, |e| matches!(e, ServerEvent::MatchPhaseChanged { .. }))
            })
            .await;

            let mut mirror = Mirror::new();
            mirror.set_local_entity(entity);
            if let Packet::Events { tick, events } = welcome {
                mirror.apply_events(tick, &events);
            }
            assert_eq!(mirror.phase(), MatchPhase::WaitingForPlayers);
            assert!(mirror.local_kart().unwrap().is_alive());
            assert_eq!(mirror.score(entity).unwrap().display_name, "ana");

            recv_until(&socket, |p| matches!(p, Packet::Snapshot { .. })).await;
        })
        .await;
    }

    /// Mismatched protocol versions are turned away
    #[tokio::test]
    async fn version_mismatch_rejected() {
        with_server(|addr| async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            send(
                &socket,
                addr,
                &Packet::Connect {
                    client_version: PROTOCOL_VERSION + 1,
                    display_name: "old".to_string(),
                },
            )
            .await;

            match recv_packet(&socket).await {
                Packet::Disconnected { reason } => assert!(reason.contains("version")),
                other => panic!("Expected rejection, got {:?}", other),
            }
        })
        .await;
    }

    /// Two participants start the countdown
    #[tokio::test]
    async fn second_player_starts_countdown() {
        with_server(|addr| async move {
            let (first, _, _) = connect(addr, "ana").await;
            let (_second, _, _) = connect(addr, "bo").await;

            recv_until(&first, |p| {
                has_event(p, |e| *e == ServerEvent::CountdownStep { remaining: 3 })
            })
            .await;
        })
        .await;
    }

    /// Leaving removes the kart for everyone else; the score row stays
    #[tokio::test]
    async fn disconnect_broadcasts_removal() {
        with_server(|addr| async move {
            let (first, _, _) = connect(addr, "ana").await;
            let (second, _, leaving) = connect(addr, "bo").await;

            send(&second, addr, &Packet::Disconnect).await;

            recv_until(&first, |p| {
                has_event(p, |e| *e == ServerEvent::KartRemoved { entity: leaving })
            })
            .await;
        })
        .await;
    }

    /// Commands are sequenced and drive the player's kart
    #[tokio::test]
    async fn drift_command_replicated() {
        with_server(|addr| async move {
            let (socket, _, entity) = connect(addr, "ana").await;

            send(
                &socket,
                addr,
                &Packet::Command {
                    sequence: 1,
                    command: ClientCommand::SetDrifting { drifting: true },
                },
            )
            .await;

            recv_until(&socket, |p| {
                has_event(p, |e| {
                    *e == ServerEvent::KartChanged {
                        entity,
                        field: KartField::Drifting(true),
                    }
                })
            })
            .await;
        })
        .await;
    }
}
