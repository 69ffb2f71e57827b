//! Connection tracking for the session loop
//!
//! Every accepted TCP connection gets a slot holding its peer address, its
//! role in the current game and the bounded queue feeding its writer task.
//! The manager enforces the connection limit and fans encoded messages out to
//! every slot in ascending connection order. A slot whose queue is full or
//! closed is freed on the spot, so a peer that stops reading can never make
//! the server buffer without limit.

use log::{info, warn};
use shared::PlayerId;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type ConnectionId = u64;

/// Encoded message shared between every connection it is sent to.
pub type Outgoing = Arc<[u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connected but not taking part in the current game.
    Spectator,
    /// Joined the current game, or the lobby, under this id.
    Player(PlayerId),
}

/// One accepted connection.
#[derive(Debug)]
pub struct Client {
    /// Server-wide connection number, never reused.
    pub id: ConnectionId,
    /// Peer address as reported by the listener.
    pub addr: SocketAddr,
    /// Whether the connection plays or watches.
    pub role: Role,
    outgoing: mpsc::Sender<Outgoing>,
    tasks: Vec<JoinHandle<()>>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, outgoing: mpsc::Sender<Outgoing>) -> Self {
        Self {
            id,
            addr,
            role: Role::Spectator,
            outgoing,
            tasks: Vec::new(),
        }
    }

    /// Queues bytes for the writer task without waiting.
    ///
    /// Returns false when the writer is gone or has fallen so far behind that
    /// its queue is full; either way the connection should be dropped.
    pub fn send(&self, bytes: Outgoing) -> bool {
        self.outgoing.try_send(bytes).is_ok()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // a writer blocked on a peer that never reads would otherwise linger
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

pub struct ClientManager {
    clients: BTreeMap<ConnectionId, Client>,
    next_connection_id: ConnectionId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_connection_id: 0,
            max_clients,
        }
    }

    /// Returns the new connection id, or None when every slot is taken.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outgoing: mpsc::Sender<Outgoing>,
    ) -> Option<ConnectionId> {
        if self.is_full() {
            return None;
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Connection {} accepted from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, outgoing));
        Some(id)
    }

    /// Ties a connection task to the slot so it is aborted when the slot is
    /// freed. A task for an unknown slot is aborted immediately.
    pub fn attach_task(&mut self, id: ConnectionId, task: JoinHandle<()>) {
        match self.clients.get_mut(&id) {
            Some(client) => client.tasks.push(task),
            None => task.abort(),
        }
    }

    /// Frees the slot, aborting its reader and writer.
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<Client> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Role of a live connection.
    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.clients.get(&id).map(|client| client.role)
    }

    /// Returns false if the connection is gone.
    pub fn set_role(&mut self, id: ConnectionId, role: Role) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) => {
                client.role = role;
                true
            }
            None => false,
        }
    }

    /// Queues bytes for one connection, dropping it if it cannot keep up.
    ///
    /// Returns true if the bytes were queued.
    pub fn send(&mut self, id: ConnectionId, bytes: Outgoing) -> bool {
        let delivered = match self.clients.get(&id) {
            Some(client) => client.send(bytes),
            None => return false,
        };
        if !delivered {
            warn!("Connection {} is not draining its queue, dropping it", id);
            self.clients.remove(&id);
        }
        delivered
    }

    /// Queues bytes for every connection. Connections that cannot take them
    /// are dropped and their ids returned.
    pub fn broadcast(&mut self, bytes: &Outgoing) -> Vec<ConnectionId> {
        let mut dropped = Vec::new();
        self.clients.retain(|id, client| {
            let delivered = client.send(Arc::clone(bytes));
            if !delivered {
                warn!("Connection {} is not draining its queue, dropping it", id);
                dropped.push(*id);
            }
            delivered
        });
        dropped
    }

    /// Demotes every connection, used when a game ends.
    pub fn make_all_spectators(&mut self) {
        for client in self.clients.values_mut() {
            client.role = Role::Spectator;
        }
    }

    /// Number of connections currently holding a player id.
    pub fn players(&self) -> usize {
        self.clients
            .values()
            .filter(|client| matches!(client.role, Role::Player(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "[::1]:8081".parse().unwrap()
    }

    fn channel() -> (mpsc::Sender<Outgoing>, mpsc::Receiver<Outgoing>) {
        mpsc::channel(8)
    }

    /// A task that reports, through the returned receiver, when it is dropped.
    fn watched_task() -> (JoinHandle<()>, tokio::sync::oneshot::Receiver<()>) {
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        (task, alive_rx)
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = channel();
        let client = Client::new(3, test_addr(), tx);

        assert_eq!(client.id, 3);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.role, Role::Spectator);
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert!(!manager.is_full());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();

        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        let second = manager.add_client(test_addr2(), tx).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.is_full());
        assert!(manager.add_client(test_addr2(), tx.clone()).is_none());
        assert_eq!(manager.len(), 1);

        manager.remove_client(0);
        assert_eq!(manager.add_client(test_addr2(), tx), Some(1));
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        let removed = manager.remove_client(id).unwrap();
        assert_eq!(removed.addr, test_addr());
        assert!(manager.is_empty());
        assert!(manager.remove_client(id).is_none());
        assert!(manager.get(id).is_none());
    }

    #[test]
    fn test_roles() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();
        let a = manager.add_client(test_addr(), tx.clone()).unwrap();
        let b = manager.add_client(test_addr2(), tx).unwrap();

        assert!(manager.set_role(a, Role::Player(0)));
        assert!(manager.set_role(b, Role::Player(1)));
        assert!(!manager.set_role(99, Role::Player(2)));
        assert_eq!(manager.role(a), Some(Role::Player(0)));
        assert_eq!(manager.players(), 2);

        manager.make_all_spectators();
        assert_eq!(manager.role(a), Some(Role::Spectator));
        assert_eq!(manager.role(b), Some(Role::Spectator));
        assert_eq!(manager.players(), 0);
    }

    #[test]
    fn test_send_and_broadcast() {
        let mut manager = ClientManager::new(3);
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let a = manager.add_client(test_addr(), tx_a).unwrap();
        manager.add_client(test_addr2(), tx_b).unwrap();

        assert!(manager.send(a, Arc::from(vec![1u8])));
        manager.broadcast(&Arc::from(vec![2u8, 3]));

        assert_eq!(&*rx_a.try_recv().unwrap(), &[1]);
        assert_eq!(&*rx_a.try_recv().unwrap(), &[2, 3]);
        assert_eq!(&*rx_b.try_recv().unwrap(), &[2, 3]);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_send_to_closed_writer_frees_slot() {
        let mut manager = ClientManager::new(1);
        let (tx, rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        assert!(!manager.send(id, Arc::from(vec![0u8])));
        assert!(manager.get(id).is_none());
        assert!(!manager.send(42, Arc::from(vec![0u8])));
    }

    #[tokio::test]
    async fn test_removing_client_aborts_tasks() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        let (reader, reader_alive) = watched_task();
        let (writer, writer_alive) = watched_task();
        manager.attach_task(id, reader);
        manager.attach_task(id, writer);
        drop(manager.remove_client(id));

        // each sender is dropped together with its aborted task
        assert!(reader_alive.await.is_err());
        assert!(writer_alive.await.is_err());
    }

    #[tokio::test]
    async fn test_task_for_unknown_slot_is_aborted() {
        let mut manager = ClientManager::new(1);
        let (task, alive) = watched_task();
        manager.attach_task(7, task);
        assert!(alive.await.is_err());
    }

    #[tokio::test]
    async fn test_stalled_connection_is_dropped_on_broadcast() {
        let mut manager = ClientManager::new(2);
        let (stalled_tx, _stalled_rx) = mpsc::channel(2);
        let (live_tx, mut live_rx) = mpsc::channel(2);
        let stalled = manager.add_client(test_addr(), stalled_tx).unwrap();
        let live = manager.add_client(test_addr2(), live_tx).unwrap();

        // the stalled writer never drains; its stuck task goes with the slot
        let (writer, writer_alive) = watched_task();
        manager.attach_task(stalled, writer);

        for turn in 0u8..2 {
            assert!(manager.broadcast(&Arc::from(vec![turn])).is_empty());
            assert_eq!(&*live_rx.recv().await.unwrap(), &[turn]);
        }

        assert_eq!(manager.broadcast(&Arc::from(vec![2u8])), vec![stalled]);
        assert!(manager.get(stalled).is_none());
        assert!(manager.get(live).is_some());
        assert_eq!(&*live_rx.recv().await.unwrap(), &[2]);
        assert!(writer_alive.await.is_err());
    }
}
