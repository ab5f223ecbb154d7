#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use monster_battle_server::app::AppState;
use monster_battle_server::client::{BattleClient, ClientConfig};
use monster_battle_server::config::Config;
use monster_battle_server::game::Catalog;
use monster_battle_server::net;
use monster_battle_server::net::protocol::ServerMsg;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
    }
}

pub fn test_config() -> Config {
    Config {
        server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ..Config::default()
    }
}

pub async fn start_server(config: Config) -> TestServer {
    let listener = net::bind(config.server_addr).expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let (state, game_match) = AppState::new(config, Catalog::default());
    tokio::spawn(game_match.run());
    tokio::spawn(net::serve(listener, state.clone()));

    TestServer { addr, state }
}

pub async fn connect(addr: SocketAddr) -> BattleClient {
    let config = ClientConfig {
        server_addr: addr,
        ..ClientConfig::default()
    };
    BattleClient::connect(&config).await.expect("connect")
}

/// Read until a message matches, skipping everything else
pub async fn wait_for<F>(client: &mut BattleClient, mut pred: F) -> ServerMsg
where
    F: FnMut(&ServerMsg) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match client.recv().await {
                Some(msg) if pred(&msg) => return msg,
                Some(_) => continue,
                None => panic!("connection closed while waiting"),
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

/// Two clients connected and in the selection phase
pub async fn seated_pair(addr: SocketAddr) -> (BattleClient, BattleClient) {
    let mut first = connect(addr).await;
    wait_for(&mut first, |m| matches!(m, ServerMsg::PlayerId { .. })).await;
    let mut second = connect(addr).await;

    for client in [&mut first, &mut second] {
        wait_for(client, |m| matches!(m, ServerMsg::GameStart { .. })).await;
    }
    (first, second)
}
