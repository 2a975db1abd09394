use dashmap::DashMap;
use shoe_table_core::{ClientMessage, ServerMessage, Session};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

pub type ConnId = Uuid;

/// 发给桌面任务的命令。会话状态只在桌面任务里修改，所有输入都排进同一个队列。
#[derive(Debug)]
pub enum TableCommand {
    /// 牌靴读到的原始字节
    Bytes(Vec<u8>),
    /// 牌靴连接状态变化
    Device { connected: bool, detail: String },
    /// 新连接已注册到 `Hub`，需要发送欢迎消息
    Join { conn_id: ConnId },
    /// 客户端发来的消息
    Client { conn_id: ConnId, msg: ClientMessage },
}

/// 所有显示端连接
///
/// 连接处理任务负责注册和移除，桌面任务负责发送。
#[derive(Default)]
pub struct Hub {
    clients: DashMap<ConnId, mpsc::Sender<ServerMessage>>,
}

impl Hub {
    pub fn register(&self, conn_id: ConnId, sender: mpsc::Sender<ServerMessage>) {
        self.clients.insert(conn_id, sender);
    }

    pub fn remove(&self, conn_id: &ConnId) {
        self.clients.remove(conn_id);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// 发给单个连接；不等待，慢客户端只会丢消息，不会卡住桌面任务
    pub fn send_to(&self, conn_id: &ConnId, message: ServerMessage) {
        let Some(sender) = self.clients.get(conn_id).map(|entry| entry.value().clone()) else {
            return;
        };
        self.deliver(conn_id, &sender, message);
    }

    pub fn broadcast(&self, message: &ServerMessage) {
        // 先复制出发送端，避免持有 DashMap 的分片锁时再去修改它
        let targets: Vec<_> = self
            .clients
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (conn_id, sender) in targets {
            self.deliver(&conn_id, &sender, message.clone());
        }
    }

    fn deliver(&self, conn_id: &ConnId, sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("连接 {} 的发送队列已满，丢弃一条消息", conn_id),
            Err(TrySendError::Closed(_)) => {
                // 连接已断开，后续由其自己的 handle_socket 任务清理
                self.remove(conn_id);
            }
        }
    }
}

/// 桌面任务: 会话的唯一写入者
///
/// 按到达顺序逐条处理命令，直到所有命令发送端都被丢弃，然后返回会话。
pub async fn run_table(
    mut session: Session,
    hub: std::sync::Arc<Hub>,
    mut commands: mpsc::Receiver<TableCommand>,
) -> Session {
    let mut device: Option<ServerMessage> = None;

    while let Some(command) = commands.recv().await {
        match command {
            TableCommand::Bytes(chunk) => {
                for message in session.ingest(&chunk) {
                    hub.broadcast(&message);
                }
            }
            TableCommand::Device { connected, detail } => {
                let status = ServerMessage::DeviceStatus { connected, detail };
                hub.broadcast(&status);
                device = Some(status);
            }
            TableCommand::Join { conn_id } => {
                hub.send_to(&conn_id, ServerMessage::Welcome { game: session.kind(), snapshot: session.snapshot() });
                if let Some(status) = &device {
                    hub.send_to(&conn_id, status.clone());
                }
            }
            TableCommand::Client { conn_id, msg } => {
                for message in session.handle_client_message(msg) {
                    match &message {
                        // 快照和提示只发给请求者
                        ServerMessage::Snapshot(_) | ServerMessage::Info { .. } | ServerMessage::Error { .. } => {
                            hub.send_to(&conn_id, message);
                        }
                        _ => hub.broadcast(&message),
                    }
                }
            }
        }
    }

    info!("桌面任务已退出");
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoe_table_core::{CardIdentity, CardRegistry, GameKind, HistoryLedger, Slot, Tally, Winner};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time;

    fn start(kind: GameKind) -> (Arc<Hub>, mpsc::Sender<TableCommand>, tokio::task::JoinHandle<Session>) {
        let session = Session::new(Arc::new(CardRegistry::standard()), HistoryLedger::new(kind));
        let hub = Arc::new(Hub::default());
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(run_table(session, hub.clone(), rx));
        (hub, tx, task)
    }

    fn connect(hub: &Hub) -> (ConnId, mpsc::Receiver<ServerMessage>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        hub.register(conn_id, tx);
        (conn_id, rx)
    }

    async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("等待消息超时")
            .expect("通道已关闭")
    }

    #[tokio::test]
    async fn test_welcome_and_broadcast() {
        let (hub, tx, task) = start(GameKind::AndarBahar);
        let (alice, mut alice_rx) = connect(&hub);
        let (bob, mut bob_rx) = connect(&hub);

        tx.send(TableCommand::Device { connected: true, detail: "simulated shoe".into() }).await.unwrap();
        tx.send(TableCommand::Join { conn_id: alice }).await.unwrap();
        tx.send(TableCommand::Join { conn_id: bob }).await.unwrap();

        // 两个连接都先收到设备状态广播，然后是各自的欢迎消息和最近的设备状态
        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::DeviceStatus { connected: true, .. }));
        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::Welcome { game: GameKind::AndarBahar, .. }));
        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::DeviceStatus { connected: true, .. }));
        assert!(matches!(recv(&mut bob_rx).await, ServerMessage::DeviceStatus { .. }));
        assert!(matches!(recv(&mut bob_rx).await, ServerMessage::Welcome { .. }));
        assert!(matches!(recv(&mut bob_rx).await, ServerMessage::DeviceStatus { .. }));

        tx.send(TableCommand::Bytes(b"7S\r\n".to_vec())).await.unwrap();
        tx.send(TableCommand::Bytes(b"2C7H".to_vec())).await.unwrap();
        for rx in [&mut alice_rx, &mut bob_rx] {
            assert_eq!(recv(rx).await, ServerMessage::JokerSet { card: CardIdentity::new("spade_7") });
            assert!(matches!(recv(rx).await, ServerMessage::CardDealt { slot: Slot::Side(_), .. }));
            assert!(matches!(recv(rx).await, ServerMessage::CardDealt { .. }));
            match recv(rx).await {
                ServerMessage::RoundResolved { entry } => assert_eq!(entry.outcome.winner, Winner::Bahar),
                other => panic!("unexpected {:?}", other),
            }
        }

        drop(tx);
        let session = task.await.unwrap();
        assert_eq!(session.ledger().count(Tally::Bahar), 1);
    }

    #[tokio::test]
    async fn test_replies_go_to_requester_only() {
        let (hub, tx, task) = start(GameKind::Baccarat);
        let (alice, mut alice_rx) = connect(&hub);
        let (_bob, mut bob_rx) = connect(&hub);

        tx.send(TableCommand::Client { conn_id: alice, msg: ClientMessage::GetSnapshot }).await.unwrap();
        tx.send(TableCommand::Client { conn_id: alice, msg: Winner::Andar.into() }).await.unwrap();
        tx.send(TableCommand::Client { conn_id: alice, msg: Winner::Tie.into() }).await.unwrap();

        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::Snapshot(_)));
        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::Error { .. }));
        assert!(matches!(recv(&mut alice_rx).await, ServerMessage::RoundResolved { .. }));
        // 另一个连接只收到广播的结果
        assert!(matches!(recv(&mut bob_rx).await, ServerMessage::RoundResolved { .. }));

        drop(tx);
        let session = task.await.unwrap();
        assert_eq!(session.ledger().count(Tally::Tie), 1);
    }

    #[tokio::test]
    async fn test_closed_connection_is_removed() {
        let (hub, tx, task) = start(GameKind::AndarBahar);
        let (_alice, alice_rx) = connect(&hub);
        drop(alice_rx);
        assert_eq!(hub.len(), 1);

        tx.send(TableCommand::Client { conn_id: Uuid::new_v4(), msg: ClientMessage::Reset }).await.unwrap();
        drop(tx);
        task.await.unwrap();
        assert_eq!(hub.len(), 0);
    }
}
