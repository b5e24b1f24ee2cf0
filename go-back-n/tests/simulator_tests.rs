//! End-to-end runs of the discrete-event simulator.

use go_back_n::fault::FaultConfig;
use go_back_n::packet::Message;
use go_back_n::rtt::RttSampling;
use go_back_n::{ProtocolConfig, SimulationReport, Simulator, SimulatorConfig};

fn expected(count: usize) -> Vec<Message> {
    (0..count).map(|i| Message::filled(b'a' + (i % 26) as u8)).collect()
}

fn run(config: SimulatorConfig, protocol: ProtocolConfig) -> SimulationReport {
    Simulator::new(config, &protocol)
        .expect("valid configuration")
        .run()
}

#[test]
fn no_loss_burst_of_fifteen() {
    let report = run(
        SimulatorConfig {
            messages: 15,
            message_interval: 0.0,
            delay: 5.0,
            jitter: 0.0,
            ..Default::default()
        },
        ProtocolConfig::default(),
    );

    assert!(report.completed, "{report}");
    assert_eq!(report.delivered, expected(15));
    assert_eq!(report.final_base, 16);
    assert_eq!(report.final_expected_seq, 16);
    assert_eq!(report.sender.timeouts, 0);
    assert_eq!(report.sender.retransmissions, 0);
    // Five messages waited for the first ACKs to open the window.
    assert!(report.sender.rejected >= 5);
    assert_eq!(report.sender.accepted, 15);
}

#[test]
fn lossy_channel_still_delivers_everything_in_order() {
    for seed in [1, 7, 42, 1234] {
        let report = run(
            SimulatorConfig {
                messages: 40,
                faults: FaultConfig {
                    loss_rate: 0.2,
                    corrupt_rate: 0.0,
                    seed,
                },
                ..Default::default()
            },
            ProtocolConfig::default(),
        );
        assert!(report.completed, "seed {seed}: {report}");
        assert_eq!(report.delivered, expected(40), "seed {seed}");
        assert!(report.link.lost > 0, "seed {seed} lost nothing");
    }
}

#[test]
fn corrupting_channel_still_delivers_everything_in_order() {
    for seed in [3, 99] {
        let report = run(
            SimulatorConfig {
                messages: 40,
                faults: FaultConfig {
                    loss_rate: 0.1,
                    corrupt_rate: 0.2,
                    seed,
                },
                ..Default::default()
            },
            ProtocolConfig::default().with_rtt_sampling(RttSampling::SkipRetransmitted),
        );
        assert!(report.completed, "seed {seed}: {report}");
        assert_eq!(report.delivered, expected(40), "seed {seed}");
        assert!(report.link.corrupted > 0);
        assert!(report.receiver.corrupt + report.sender.corrupt_acks > 0);
    }
}

#[test]
fn same_seed_same_run() {
    let config = SimulatorConfig {
        messages: 30,
        faults: FaultConfig {
            loss_rate: 0.15,
            corrupt_rate: 0.15,
            seed: 2024,
        },
        ..Default::default()
    };
    let a = run(config.clone(), ProtocolConfig::default());
    let b = run(config, ProtocolConfig::default());

    assert_eq!(a.end_time, b.end_time);
    assert_eq!(a.sender, b.sender);
    assert_eq!(a.receiver, b.receiver);
    assert_eq!(a.link, b.link);
}

#[test]
fn small_window_completes() {
    let report = run(
        SimulatorConfig {
            messages: 25,
            faults: FaultConfig {
                loss_rate: 0.1,
                corrupt_rate: 0.1,
                seed: 5,
            },
            ..Default::default()
        },
        ProtocolConfig::default().with_window_size(1),
    );
    assert!(report.completed, "{report}");
    assert_eq!(report.delivered, expected(25));
}

#[test]
fn hopeless_channel_stops_at_max_time() {
    let report = run(
        SimulatorConfig {
            messages: 5,
            faults: FaultConfig {
                loss_rate: 1.0,
                corrupt_rate: 0.0,
                seed: 0,
            },
            max_time: 10_000.0,
            ..Default::default()
        },
        ProtocolConfig::default(),
    );
    assert!(!report.completed);
    assert!(report.delivered.is_empty());
    assert!(report.end_time <= 10_000.0);
    assert!(report.sender.timeouts > 0);
}

#[test]
fn invalid_configuration_is_rejected() {
    let bad_loss = SimulatorConfig {
        faults: FaultConfig {
            loss_rate: 2.0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(Simulator::new(bad_loss, &ProtocolConfig::default()).is_err());

    let bad_window = ProtocolConfig::default().with_window_size(0);
    assert!(Simulator::new(SimulatorConfig::default(), &bad_window).is_err());
}

#[test]
fn stepping_by_hand_shows_progress() {
    let mut sim = Simulator::new(
        SimulatorConfig {
            messages: 3,
            message_interval: 0.0,
            delay: 5.0,
            jitter: 0.0,
            ..Default::default()
        },
        &ProtocolConfig::default(),
    )
    .unwrap();

    let mut last = sim.now();
    while !sim.is_complete() && sim.step() {
        assert!(sim.now() >= last, "clock went backwards");
        last = sim.now();
        // B has delivered exactly the messages before the one it expects.
        assert_eq!(sim.receiver().expected_seq() as usize, sim.delivered().len() + 1);
        assert!(sim.sender().base() <= sim.receiver().expected_seq());
    }

    assert_eq!(sim.delivered(), expected(3).as_slice());
    assert_eq!(sim.sender().base(), 4);
    assert!(sim.sender().state().is_idle());
    // Sent at t=0, delivered at t=5, last ACK back at t=10.
    assert_eq!(sim.now(), 10.0);
}
