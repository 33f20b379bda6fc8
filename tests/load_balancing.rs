//! Selection behaviour through the public engine API.

use lb_proxy::load_balancer::ip_hash::IpHash;
use lb_proxy::load_balancer::LoadBalancerError;
use lb_proxy::{Algorithm, BackendId};

mod common;

fn port(id: Option<BackendId>) -> u16 {
    id.expect("expected a backend").port
}

#[test]
fn test_round_robin_full_cycle() {
    let engine = common::configured(Algorithm::RoundRobin, &[1, 1, 1]);

    let ports: Vec<u16> = (0..6).map(|_| port(engine.select("c").unwrap())).collect();
    assert_eq!(ports, vec![8080, 8081, 8082, 8080, 8081, 8082]);
}

#[test]
fn test_round_robin_skips_unhealthy_until_recovered() {
    let engine = common::configured(Algorithm::RoundRobin, &[1, 1, 1]);
    engine.mark_unhealthy("10.0.0.1", 8081);

    for _ in 0..30 {
        let picked = port(engine.select("c").unwrap());
        assert_ne!(picked, 8081);
    }

    engine.mark_healthy("10.0.0.1", 8081);
    let ports: Vec<u16> = (0..3).map(|_| port(engine.select("c").unwrap())).collect();
    assert!(ports.contains(&8081));
}

#[test]
fn test_weighted_round_robin_windows() {
    let engine = common::configured(Algorithm::WeightedRoundRobin, &[2, 1, 1]);

    let ports: Vec<u16> = (0..16).map(|_| port(engine.select("c").unwrap())).collect();
    assert_eq!(&ports[..4], &[8080, 8081, 8082, 8080]);

    for window in ports.windows(4) {
        let count = |p: u16| window.iter().filter(|&&x| x == p).count();
        assert_eq!(count(8080), 2, "window {window:?}");
        assert_eq!(count(8081), 1, "window {window:?}");
        assert_eq!(count(8082), 1, "window {window:?}");
    }
}

#[test]
fn test_least_connections_tie_break() {
    let engine = common::configured(Algorithm::LeastConnections, &[1, 1, 1]);

    assert_eq!(port(engine.select("c").unwrap()), 8080);
    engine.track_start("10.0.0.1", 8080);
    assert_eq!(port(engine.select("c").unwrap()), 8081);
    engine.track_start("10.0.0.1", 8081);
    assert_eq!(port(engine.select("c").unwrap()), 8082);

    engine.track_end("10.0.0.1", 8081);
    assert_eq!(port(engine.select("c").unwrap()), 8081);
}

#[test]
fn test_ip_hash_stability() {
    let engine = common::configured(Algorithm::IpHash, &[1, 1, 1, 1]);

    for client in ["192.168.1.10", "10.9.8.7", "172.16.0.1"] {
        let first = engine.select(client).unwrap();
        for _ in 0..10 {
            assert_eq!(engine.select(client).unwrap(), first);
        }
    }
}

#[test]
fn test_ip_hash_follows_reduced_healthy_set() {
    let engine = common::configured(Algorithm::IpHash, &[1, 1, 1]);

    // A client whose backend stays healthy when 8082 goes down.
    let client = (0..100)
        .map(|i| format!("10.20.0.{i}"))
        .find(|c| port(engine.select(c).unwrap()) != 8082)
        .unwrap();
    let before = port(engine.select(&client).unwrap());

    engine.mark_unhealthy("10.0.0.1", 8082);
    let after = port(engine.select(&client).unwrap());

    let healthy = [8080, 8081];
    let expected = healthy[(IpHash::hash_client(&client) % 2) as usize];
    assert_eq!(after, expected);
    assert_eq!(before, [8080, 8081, 8082][(IpHash::hash_client(&client) % 3) as usize]);
}

#[test]
fn test_connection_counter_floor() {
    let engine = common::configured(Algorithm::LeastConnections, &[1]);

    engine.track_start("10.0.0.1", 8080);
    engine.track_end("10.0.0.1", 8080);
    engine.track_end("10.0.0.1", 8080);
    engine.track_end("10.0.0.1", 8080);

    assert_eq!(engine.snapshot().backends[0].active_connections, 0);
}

#[test]
fn test_configure_resets_state() {
    let engine = common::configured(Algorithm::WeightedRoundRobin, &[3, 2, 1]);
    for _ in 0..5 {
        engine.select("c").unwrap();
    }
    engine.set_algorithm(Algorithm::RoundRobin);
    for _ in 0..2 {
        engine.select("c").unwrap();
    }
    engine.mark_unhealthy("10.0.0.1", 8080);
    engine.track_start("10.0.0.1", 8081);

    engine
        .configure(Algorithm::WeightedRoundRobin, &common::specs(&[3, 2, 1]))
        .unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.cursor, 0);
    assert_eq!(snapshot.healthy, 3);
    for backend in &snapshot.backends {
        assert_eq!(backend.current_weight, 0);
        assert_eq!(backend.active_connections, 0);
    }
}

#[test]
fn test_unavailable_for_every_algorithm() {
    for algorithm in Algorithm::ALL {
        let engine = common::configured(algorithm, &[1, 2]);
        engine.mark_unhealthy("10.0.0.1", 8080);
        engine.mark_unhealthy("10.0.0.1", 8081);

        assert_eq!(engine.select("10.0.0.5").unwrap(), None, "{algorithm}");
        assert!(engine.select_tracked("10.0.0.5").unwrap().is_none());
    }
}

#[test]
fn test_unconfigured_engine() {
    let engine = lb_proxy::LoadBalancer::default();
    assert_eq!(engine.select("c"), Err(LoadBalancerError::NotConfigured));

    // Ignored, not fatal.
    engine.mark_unhealthy("10.0.0.1", 8080);
    engine.track_start("10.0.0.1", 8080);
    assert!(!engine.snapshot().configured);
}

#[test]
fn test_unknown_algorithm_falls_back() {
    assert_eq!(Algorithm::parse_lenient("RANDOM"), Algorithm::RoundRobin);
    assert_eq!(
        Algorithm::parse_lenient("weighted_round_robin"),
        Algorithm::WeightedRoundRobin
    );
}
