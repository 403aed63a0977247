use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use serde_json::json;
use tokio::time::{Duration, sleep};

use vigil_core::app::{Observable, ObservableMembers, ObservatoryBuilder, ObserverOpts};
use vigil_core::domain::{ChangeEvent, EntityId, KeyPath};

#[derive(Debug, Serialize)]
struct DeliveryLog {
    entity: EntityId,
    path: String,
    old: Option<serde_json::Value>,
    new: Option<serde_json::Value>,
}

fn log_line(entity: EntityId, change: &ChangeEvent) -> String {
    let line = DeliveryLog {
        entity,
        path: change.path.to_string(),
        old: change.old.clone(),
        new: change.new.clone(),
    };
    serde_json::to_string(&line).unwrap_or_else(|e| format!("log encode failed: {e}"))
}

#[tokio::main]
async fn main() {
    // (A) Observatory を用意（dispatch worker 2 本）
    let observatory = ObservatoryBuilder::new()
        .dispatch_workers(2)
        .build()
        .expect("worker count is non-zero");

    // (B) entity を作って sync observer を登録
    let player = observatory.entity();
    player.set("score", json!(0)).expect("entity exists");

    player
        .add_observer(KeyPath::new("score"), ObserverOpts::sync(), |entity, change| {
            println!("sync  {}", log_line(entity, change));
        })
        .await
        .expect("register succeeds");

    // (C) setter を走らせる → closure は set が返る前に inline で走る
    player.set("score", json!(5)).expect("entity exists");

    // (D) observer を外すと以後は配送されない
    player
        .remove_observer(&KeyPath::new("score"))
        .await
        .expect("removal is a clean call")
        .expect("score observer was registered");
    player.set("score", json!(10)).expect("entity exists");
    println!("after removal: score={:?}", player.get("score").unwrap());

    // (E) async observer：worker 上でいずれ走る（順序保証なし）
    let delivered = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&delivered);
    player
        .add_observer(
            KeyPath::new("score"),
            ObserverOpts::asynchronous(),
            move |entity, change| {
                println!("async {}", log_line(entity, change));
                counter.fetch_add(1, Ordering::Relaxed);
            },
        )
        .await
        .expect("register succeeds");

    player.set("score", json!(99)).expect("entity exists");

    // 完了をポーリングで待つ
    while delivered.load(Ordering::Relaxed) == 0 {
        sleep(Duration::from_millis(10)).await;
    }

    // (F) コレクション観測：範囲 1..=2 のメンバーだけを見る
    let roster = observatory.list();
    let alice = roster.push().expect("list exists");
    let bob = roster.push().expect("list exists");
    let carol = roster.push().expect("list exists");

    roster
        .add_observer_to_members(
            KeyPath::new("score"),
            ObserverOpts::sync().with_range(1..=2),
            |entity, change| {
                println!(
                    "member[{}] {}",
                    change.member.expect("member-scoped delivery"),
                    log_line(entity, change)
                );
            },
        )
        .await
        .expect("register succeeds");

    alice.set("score", json!(1)).expect("member exists"); // position 0: not observed
    bob.set("score", json!(2)).expect("member exists"); // position 1: delivered
    carol.set("score", json!(3)).expect("member exists"); // position 2: delivered

    // (G) 後片付け：observer を全部外してから pool を止める
    let removed = player.remove_all_observers().await.expect("teardown");
    println!("removed {removed} remaining observer(s)");
    observatory.shutdown_and_join().await;
}
