//! Connection management and command queuing for the arena server
//!
//! This module handles the server-side bookkeeping for connected participants:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Per-client command queues, drained once per tick by the game loop
//! - Capacity limits and address tracking
//!
//! Commands are never applied here. The manager only buffers them so the game
//! loop can apply every queued request between ticks as the single writer.

use log::{debug, info};
use shared::ClientCommand;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Inactivity window after which a client is treated as disconnected.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected client and their queued requests
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    pub display_name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest command sequence already handed to the game loop
    pub last_processed_command: u32,
    /// Buffered commands waiting for the next tick, by sequence
    pub pending_commands: Vec<(u32, ClientCommand)>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, display_name: String) -> Self {
        Self {
            id,
            addr,
            display_name,
            last_seen: Instant::now(),
            last_processed_command: 0,
            pending_commands: Vec::new(),
        }
    }

    /// Queues a command, dropping duplicates and anything already processed.
    ///
    /// Returns false when the command was discarded.
    pub fn add_command(&mut self, sequence: u32, command: ClientCommand) -> bool {
        self.last_seen = Instant::now();

        if sequence <= self.last_processed_command
            || self.pending_commands.iter().any(|(s, _)| *s == sequence)
        {
            return false;
        }

        self.pending_commands.push((sequence, command));
        // UDP may reorder; the game sees each client's commands in send order
        self.pending_commands.sort_by_key(|(s, _)| *s);
        true
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks every connected client and enforces the capacity limit.
pub struct ClientManager {
    /// Ordered by id so draining is deterministic
    clients: BTreeMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, display_name: &str) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, display_name, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, display_name.to_string()));

        Some(client_id)
    }

    /// Removes a client. Returns false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Queues a command for a specific client. Returns false if the client
    /// is unknown or the command was stale.
    pub fn add_command(&mut self, client_id: u32, sequence: u32, command: ClientCommand) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                let queued = client.add_command(sequence, command);
                if !queued {
                    debug!("Dropping stale command {} from client {}", sequence, client_id);
                }
                queued
            }
            None => false,
        }
    }

    /// Refreshes the activity timestamp without queuing anything.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Takes every queued command, grouped by client in id order and in
    /// sequence order within a client, and marks them processed.
    pub fn drain_commands(&mut self) -> Vec<(u32, ClientCommand)> {
        let mut commands = Vec::new();

        for (client_id, client) in &mut self.clients {
            for (sequence, command) in client.pending_commands.drain(..) {
                client.last_processed_command = client.last_processed_command.max(sequence);
                commands.push((*client_id, command));
            }
        }

        commands
    }

    /// Removes clients that have been silent longer than the timeout and
    /// returns their ids for cleanup in the game world.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// All client ids and addresses, for broadcasting.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(1, test_addr(), "ana".to_string());

        assert_eq!(client.id, 1);
        assert_eq!(client.display_name, "ana");
        assert_eq!(client.last_processed_command, 0);
        assert!(client.pending_commands.is_empty());
    }

    #[test]
    fn test_commands_sorted_by_sequence() {
        let mut client = Client::new(1, test_addr(), "ana".to_string());

        assert!(client.add_command(2, ClientCommand::DropMine));
        assert!(client.add_command(1, ClientCommand::SetDrifting { drifting: true }));

        assert_eq!(client.pending_commands[0].0, 1);
        assert_eq!(client.pending_commands[1].0, 2);
    }

    #[test]
    fn test_duplicate_and_old_commands_dropped() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr(), "ana").unwrap();

        assert!(manager.add_command(id, 1, ClientCommand::DropMine));
        assert!(!manager.add_command(id, 1, ClientCommand::DropMine));
        assert_eq!(manager.drain_commands().len(), 1);

        assert!(!manager.add_command(id, 1, ClientCommand::DropMine));
        assert!(manager.add_command(id, 2, ClientCommand::RequestRespawn));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), "ana".to_string());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(2);
        let quiet = manager.add_client(test_addr(), "ana").unwrap();
        manager.add_client(test_addr2(), "bo").unwrap();
        manager.clients.get_mut(&quiet).unwrap().last_seen = Instant::now() - Duration::from_secs(10);

        assert_eq!(manager.check_timeouts(CLIENT_TIMEOUT), vec![quiet]);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert_eq!(manager.add_client(test_addr(), "ana"), Some(1));
        assert!(manager.add_client(test_addr2(), "bo").is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), "ana").unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr(), "ana").unwrap();
        manager.add_client(test_addr2(), "bo").unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
    }

    #[test]
    fn test_add_command_to_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.add_command(999, 1, ClientCommand::DropMine));
    }

    #[test]
    fn test_drain_groups_by_client_in_order() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr(), "ana").unwrap();
        let b = manager.add_client(test_addr2(), "bo").unwrap();

        manager.add_command(b, 1, ClientCommand::DropMine);
        manager.add_command(a, 2, ClientCommand::FireWeapon { aim: Vec3::Z });
        manager.add_command(a, 1, ClientCommand::Drive { throttle: 1.0, steer: 0.0 });

        let drained = manager.drain_commands();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], (a, ClientCommand::Drive { throttle: 1.0, steer: 0.0 }));
        assert_eq!(drained[1], (a, ClientCommand::FireWeapon { aim: Vec3::Z }));
        assert_eq!(drained[2], (b, ClientCommand::DropMine));

        assert!(manager.drain_commands().is_empty());
        assert_eq!(manager.get(a).unwrap().last_processed_command, 2);
    }
}
