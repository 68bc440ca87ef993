use std::time::Duration;

use futures::future;
use tokio::{net::TcpListener, time};

use worker::{AllReduce, TcpAllReduce, WorkerErr};

const WORLD_SIZE: usize = 3;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn tcp_world(world_size: usize) -> Vec<TcpAllReduce> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let root = tokio::spawn(TcpAllReduce::root(listener, world_size));
    let leaves: Vec<_> = (1..world_size)
        .map(|rank| {
            let addr = addr.to_string();
            tokio::spawn(async move { TcpAllReduce::connect(addr.as_str(), rank, world_size).await })
        })
        .collect();

    let (root, leaves) = time::timeout(TIMEOUT, future::join(root, future::join_all(leaves)))
        .await
        .unwrap();

    let mut world = vec![root.unwrap().unwrap()];
    for leaf in leaves {
        world.push(leaf.unwrap().unwrap());
    }

    world
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_ranks_get_the_sum() {
    let world = tcp_world(WORLD_SIZE).await;

    let handles = world.into_iter().map(|mut collective| {
        tokio::spawn(async move {
            let rank = collective.rank() as f32;
            let mut sums = Vec::new();

            for round in 0..3 {
                let mut buf = vec![rank, 1., round as f32];
                collective.reduce_sum(&mut buf).await.unwrap();
                sums.push(buf);
            }

            collective.shutdown().await.unwrap();
            sums
        })
    });

    let all = time::timeout(TIMEOUT, future::join_all(handles))
        .await
        .unwrap();

    for sums in all {
        let sums = sums.unwrap();
        let expected: Vec<_> = (0..3)
            .map(|round| vec![3., 3., 3. * round as f32])
            .collect();
        assert_eq!(sums, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_length_mismatch_fails_every_rank() {
    let world = tcp_world(2).await;

    let handles = world.into_iter().map(|mut collective| {
        tokio::spawn(async move {
            let mut buf = vec![1.; 2 + collective.rank()];
            collective.reduce_sum(&mut buf).await
        })
    });

    let all = time::timeout(TIMEOUT, future::join_all(handles))
        .await
        .unwrap();

    for ret in all {
        assert!(matches!(ret.unwrap(), Err(WorkerErr::Collective(_))));
    }
}

#[tokio::test]
async fn root_rejects_a_wrong_world_size() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let leaf = tokio::spawn(async move { TcpAllReduce::connect(addr.as_str(), 1, 3).await });
    let root = time::timeout(TIMEOUT, TcpAllReduce::root(listener, 2))
        .await
        .unwrap();

    assert!(matches!(root, Err(WorkerErr::Collective(_))));
    assert!(leaf.await.unwrap().is_ok());
}
