use crate::controller::Controller;
use crate::mirror::{Mirror, PresentationSignal};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{forward_from_yaw, rotate_about_vertical, ClientCommand, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// How often the bot decides what to do next.
const COMMAND_INTERVAL: Duration = Duration::from_millis(50);

/// Headless participant: mirrors the authority and drives a scripted kart.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    display_name: String,
    client_id: Option<u32>,
    connected: bool,

    mirror: Mirror,
    controller: Controller,
    rng: StdRng,
    steer: f32,

    ping_ms: u64,
    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        display_name: &str,
        fake_ping_ms: u64,
        seed: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            display_name: display_name.to_string(),
            client_id: None,
            connected: false,
            mirror: Mirror::new(),
            controller: Controller::new(),
            rng: StdRng::seed_from_u64(seed),
            steer: 0.0,
            ping_ms: 0,
            fake_ping_ms,
        })
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.display_name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            display_name: self.display_name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_command(&mut self, command: ClientCommand) -> Result<(), Box<dyn std::error::Error>> {
        let packet = self.controller.package(command);
        self.send_packet(&packet).await
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                entity_id,
            } => {
                info!("Connected! Client ID: {}, kart {}", client_id, entity_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.mirror.set_local_entity(entity_id);
            }

            Packet::Events { tick, events } => {
                debug!("Tick {}: {} events", tick, events.len());
                self.mirror.apply_events(tick, &events);
            }

            Packet::Snapshot {
                tick,
                timestamp,
                state,
                karts,
                blades,
                mines,
            } => {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_millis() as u64;

                if timestamp > 0 {
                    self.ping_ms = now.saturating_sub(timestamp);
                }

                self.mirror.apply_snapshot(tick, &state, &karts, &blades, &mines);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Logs what a presentation layer would show.
    fn present(&mut self) {
        for signal in self.mirror.take_signals() {
            match signal {
                PresentationSignal::EnterSpectator => info!("Kart destroyed, spectating"),
                PresentationSignal::LeaveSpectator => info!("Back in the arena"),
                PresentationSignal::CountdownStep(0) => info!("Go!"),
                PresentationSignal::CountdownStep(n) => info!("{}...", n),
                PresentationSignal::ControlsEnabled => info!("Controls enabled"),
                PresentationSignal::ShowResults { winner_name } => info!(
                    "Match over, winner: {}",
                    winner_name.as_deref().unwrap_or("nobody")
                ),
                PresentationSignal::Effect(effect) => debug!("Effect: {:?}", effect),
            }
        }
    }

    /// Picks this interval's requests: wander, use whatever weapon is
    /// equipped now and then, and recover from falls and deaths.
    fn decide(&mut self, dt: f32) -> Vec<ClientCommand> {
        self.controller.advance(dt);
        let mut commands = Vec::new();

        if let Some(command) = self.controller.check_fall(&self.mirror) {
            commands.push(command);
        }
        if let Some(command) = self.controller.request_respawn(&self.mirror) {
            commands.push(command);
        }
        if !self.mirror.controls_enabled() {
            // Neutral input doubles as a keep-alive while waiting
            commands.push(self.controller.drive(0.0, 0.0));
            return commands;
        }

        if self.rng.gen_bool(0.1) {
            self.steer = self.rng.gen_range(-1.0..=1.0);
        }
        commands.push(self.controller.drive(1.0, self.steer));

        if let Some(command) = self.controller.set_drifting(self.steer.abs() > 0.8) {
            commands.push(command);
        }

        if self.rng.gen_bool(0.2) {
            let yaw = self.mirror.local_kart().map(|k| k.yaw).unwrap_or(0.0);
            let aim = rotate_about_vertical(forward_from_yaw(yaw), self.rng.gen_range(-0.3..=0.3));
            if let Some(command) = self.controller.fire(&self.mirror, aim) {
                commands.push(command);
            }
        }
        if self.rng.gen_bool(0.05) {
            if let Some(command) = self.controller.drop_mine(&self.mirror) {
                commands.push(command);
            }
        }

        commands
    }

    /// Runs until the server disconnects us or `duration` elapses.
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let started = Instant::now();
        let mut command_interval = interval(COMMAND_INTERVAL);
        let dt = COMMAND_INTERVAL.as_secs_f32();
        let mut buffer = [0u8; 65536];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                            self.present();
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = command_interval.tick() => {
                    if duration.is_some_and(|d| started.elapsed() >= d) {
                        break;
                    }
                    if !self.connected {
                        if self.client_id.is_none() && started.elapsed() > Duration::from_secs(5) {
                            warn!("No response from server, giving up");
                            break;
                        }
                        continue;
                    }

                    for command in self.decide(dt) {
                        if let Err(e) = self.send_command(command).await {
                            error!("Error sending command: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        info!("Client finished (last ping {}ms)", self.ping_ms);

        Ok(())
    }
}
