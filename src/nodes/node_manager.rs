use crate::manager::ManagerConfig;
use crate::player::AudioPlayerManager;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;
use super::{Node, NodeConfig};

/// The set of nodes, keyed by host.
///
/// Replacing or removing a node closes the connection it supersedes.
pub struct NodeManager {
    settings: ManagerConfig,
    players: Weak<RefCell<AudioPlayerManager>>,
    nodes: RefCell<HashMap<String, Node>>,
}

impl NodeManager {
    pub(crate) fn new(settings: ManagerConfig, players: Weak<RefCell<AudioPlayerManager>>) -> Self {
        Self {
            nodes: RefCell::new(HashMap::new()),
            settings,
            players,
        }
    }

    /// Opens a connection to each of the nodes.
    pub fn launch_all<I: IntoIterator<Item = NodeConfig>>(&self, configs: I) {
        for config in configs {
            self.add(config);
        }
    }

    /// Adds a new node to be managed and starts connecting to it.
    ///
    /// An existing node with the same host is replaced and closed.
    pub fn add(&self, config: NodeConfig) -> Node {
        let node = Node::new(config, &self.settings, self.players.clone());
        node.open();

        let previous = self
            .nodes
            .borrow_mut()
            .insert(node.host().to_owned(), node.clone());

        if let Some(previous) = previous {
            debug!("Replacing node {}", previous.host());

            close(&previous);
        }

        node
    }

    /// Removes and closes a node by host.
    ///
    /// Returns whether a node with the host existed.
    pub fn remove(&self, host: &str) -> bool {
        let removed = self.nodes.borrow_mut().remove(host);

        match removed {
            Some(node) => {
                close(&node);

                true
            },
            None => false,
        }
    }

    pub fn get(&self, host: &str) -> Option<Node> {
        self.nodes.borrow().get(host).cloned()
    }

    /// Determines the ready node with the lowest load penalty, if any.
    pub fn best_node(&self) -> Option<Node> {
        let mut record = f64::MAX;
        let mut best = None;

        for node in self.nodes.borrow().values() {
            if !node.is_ready() {
                continue;
            }

            let total = node.penalty();

            if total < record {
                best = Some(node.clone());
                record = total;
            }
        }

        best
    }

    pub fn hosts(&self) -> Vec<String> {
        self.nodes.borrow().keys().cloned().collect()
    }

    /// Closes all of the nodes owned by the manager.
    ///
    /// This is also automatically called when the instance is dropped.
    pub fn close_all(&self) {
        self.nodes.borrow().values().for_each(close);
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, node: Node) {
        self.nodes.borrow_mut().insert(node.host().to_owned(), node);
    }
}

impl Drop for NodeManager {
    /// Drops the manager, closing all nodes if possible.
    fn drop(&mut self) {
        self.close_all();
    }
}

fn close(node: &Node) {
    if let Err(why) = node.close() {
        error!("Failed to close node {}: {:?}", node.host(), why);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeEvent, NodeState};
    use crate::test_utils::{connected_node, node_config};
    use futures::{FutureExt, StreamExt};
    use std::rc::Rc;
    use tokio::task::LocalSet;
    use tokio_tungstenite::tungstenite::Message;

    fn manager() -> NodeManager {
        NodeManager::new(ManagerConfig::default(), Weak::new())
    }

    #[tokio::test]
    async fn add_indexes_by_host_and_replaces_duplicates() {
        LocalSet::new()
            .run_until(async {
                let nodes = manager();
                let first = nodes.add(node_config("a"));
                let mut first_events = first.events();
                let second = nodes.add(node_config("a"));

                assert!(nodes.get("a").unwrap().ptr_eq(&second));
                assert!(!first.ptr_eq(&second));
                assert_eq!(first.state(), NodeState::Closed);
                assert_eq!(second.state(), NodeState::Connecting);
                assert!(matches!(
                    first_events.next().now_or_never(),
                    Some(Some(NodeEvent::Close { code: 1000, .. }))
                ));
                assert_eq!(nodes.hosts(), vec!["a".to_owned()]);
            })
            .await;
    }

    #[tokio::test]
    async fn remove_reports_whether_a_node_existed() {
        LocalSet::new()
            .run_until(async {
                let nodes = manager();
                let node = nodes.add(node_config("a"));

                assert!(nodes.remove("a"));
                assert!(!nodes.remove("a"));
                assert!(nodes.get("a").is_none());
                assert_eq!(node.state(), NodeState::Closed);
            })
            .await;
    }

    #[test]
    fn removing_a_ready_node_sends_a_close_frame() {
        let nodes = manager();
        let (node, mut rx) = connected_node("a", Weak::new());
        nodes.insert(node);

        assert!(nodes.remove("a"));

        assert!(matches!(rx.next().now_or_never(), Some(Some(Message::Close(Some(_))))));
    }

    #[test]
    fn best_node_prefers_the_least_loaded_ready_node() {
        let nodes = manager();
        let (busy, _busy_rx) = connected_node("busy", Weak::new());
        let (idle, _idle_rx) = connected_node("idle", Weak::new());
        busy.on_message(r#"{"op":"stats","players":10,"playingPlayers":10,"cpu":{"cores":4,"systemLoad":0.5,"lavalinkLoad":0.1}}"#);
        idle.on_message(r#"{"op":"stats","players":1,"playingPlayers":1,"cpu":{"cores":4,"systemLoad":0.1,"lavalinkLoad":0.1}}"#);
        nodes.insert(busy);
        nodes.insert(idle);

        assert_eq!(nodes.best_node().unwrap().host(), "idle");
    }

    #[test]
    fn best_node_skips_closed_nodes() {
        let nodes = manager();
        let (node, _rx) = connected_node("a", Weak::new());
        node.on_close(1006, None);
        nodes.insert(node);

        assert!(nodes.best_node().is_none());
    }

    #[test]
    fn dropping_the_manager_closes_nodes() {
        let players = Rc::new(RefCell::new(AudioPlayerManager::new()));
        let nodes = NodeManager::new(ManagerConfig::default(), Rc::downgrade(&players));
        let (node, mut rx) = connected_node("a", Weak::new());
        nodes.insert(node);

        drop(nodes);

        assert!(matches!(rx.next().now_or_never(), Some(Some(Message::Close(_)))));
    }
}
