use lamport_process::{timestamped, LamportClock, ProcessCore};
use network::{LocalCluster, Transport};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Beat {
    timestamp: u64,
}

timestamped!(Beat => timestamp);

#[derive(Debug, Clone)]
enum Step {
    Local,
    Send(usize),
    Observe(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Local),
        (0usize..3).prop_map(Step::Send),
        (0u64..1_000).prop_map(Step::Observe),
    ]
}

proptest! {
    #[test]
    fn clock_never_decreases(start in 0u64..1_000, received in prop::collection::vec(0u64..5_000, 0..64)) {
        let mut clock = LamportClock::starting_at(start);
        for ts in received {
            let before = clock.current();
            let after = clock.observe(ts).unwrap();
            prop_assert!(after > before);
            prop_assert!(after > ts);
            prop_assert_eq!(after, before.max(ts) + 1);
        }
    }

    #[test]
    fn every_event_strictly_advances_a_process(steps in prop::collection::vec(step(), 1..48)) {
        let cluster = LocalCluster::new(3);
        let mut endpoints = cluster.endpoints().into_iter();
        let mut me = ProcessCore::new(endpoints.next().unwrap(), "observer");
        let peers: Vec<_> = endpoints.map(|e| ProcessCore::new(e, "peer")).collect();

        for step in steps {
            let before = me.clock();
            match step {
                Step::Local => {
                    me.advance_clock();
                }
                Step::Send(dest) => {
                    let mut beat = Beat::default();
                    me.send(&mut beat, dest, 1).unwrap();
                    prop_assert_eq!(beat.timestamp, me.clock());
                }
                Step::Observe(ts) => {
                    // Inject a frame stamped `ts` from rank 1 directly.
                    let payload = lamport_process::codec::encode(&Beat { timestamp: ts }).unwrap();
                    peers[0].transport().send(0, 2, payload).unwrap();
                    let (got, _) = me.receive::<Beat>(1, 2).unwrap();
                    prop_assert_eq!(got.timestamp, ts);
                    prop_assert_eq!(me.clock(), before.max(ts) + 1);
                }
            }
            prop_assert!(me.clock() > before);
        }
    }
}
