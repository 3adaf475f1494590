//! Property-based invariant tests for the popup lifecycle.
//!
//! ## Invariants
//!
//! 1. Observed states always follow the legal cycle: every emission is the
//!    successor of the previous one, never a repeat.
//! 2. A host surface is open iff the latest state is not `Hidden`.
//! 3. Opens and closes on the host strictly alternate per id.
//! 4. The registry never holds more than one record per id.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anchored_popup_core::{IntRect, IntSize, LifecycleState, PopupConfig, Timing};
use anchored_popup_runtime::{
    DismissHandle, HeadlessHost, HostCall, PopupRuntime, RuntimeSettings,
};
use proptest::prelude::*;

const IDS: [&str; 2] = ["a", "b"];

#[derive(Debug, Clone)]
enum Op {
    Open(usize),
    Close(usize),
    Dismiss(usize),
    Tap(usize),
    Measure(usize, i32, i32),
    Frame(usize, i32, i32),
    Advance(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..IDS.len()).prop_map(Op::Open),
        (0..IDS.len()).prop_map(Op::Close),
        (0..IDS.len()).prop_map(Op::Dismiss),
        (0..IDS.len()).prop_map(Op::Tap),
        (0..IDS.len(), 0i32..200, 0i32..200).prop_map(|(i, w, h)| Op::Measure(i, w, h)),
        (0..IDS.len(), 1i32..400, 1i32..400).prop_map(|(i, x, y)| Op::Frame(i, x, y)),
        (0u64..400).prop_map(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn observed_states_follow_cycle(ops in prop::collection::vec(arb_op(), 1..60)) {
        let rt = PopupRuntime::new(HeadlessHost::<DismissHandle>::new(), RuntimeSettings::default());
        let config = PopupConfig::new().timing(Timing::linear(Duration::from_millis(250)));

        let anchors: Vec<_> = IDS
            .iter()
            .map(|id| rt.attach_anchor(*id, config.clone(), |d| d.clone()))
            .collect();

        let logs: Vec<Rc<RefCell<Vec<LifecycleState>>>> =
            IDS.iter().map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let _subs: Vec<_> = IDS
            .iter()
            .zip(&logs)
            .map(|(id, log)| {
                let log = Rc::clone(log);
                rt.registry()
                    .state_changes(*id)
                    .subscribe(move |r| log.borrow_mut().push(r.state))
            })
            .collect();

        for op in ops {
            match op {
                Op::Open(i) => {
                    rt.open(IDS[i]);
                }
                Op::Close(i) => {
                    rt.close(IDS[i]);
                }
                Op::Dismiss(i) => {
                    let handle = rt.host().content(IDS[i]).cloned();
                    if let Some(handle) = handle {
                        handle.dismiss();
                    }
                }
                Op::Tap(i) => {
                    anchors[i].tap();
                }
                Op::Measure(i, w, h) => {
                    if let Some(visuals) = anchors[i].visuals() {
                        visuals.content_measured(IntSize::new(w, h));
                    }
                }
                Op::Frame(i, x, y) => anchors[i].report_frame(IntRect::new(x, y, 40, 20)),
                Op::Advance(dt) => {
                    rt.advance(Duration::from_millis(dt));
                }
            }

            for (i, id) in IDS.iter().enumerate() {
                let state = rt.registry().get(*id).map(|r| r.state).unwrap_or_default();
                prop_assert_eq!(rt.host().is_open(id), state.has_surface(), "id {}", id);
                prop_assert_eq!(anchors[i].is_surface_open(), state.has_surface());
            }
        }

        for log in &logs {
            for pair in log.borrow().windows(2) {
                prop_assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
            }
        }

        for id in IDS {
            let calls: Vec<_> = rt
                .host()
                .calls()
                .iter()
                .filter(|c| matches!(c, HostCall::Open(x) | HostCall::Close(x) if x.as_str() == id))
                .cloned()
                .collect();
            for (n, call) in calls.iter().enumerate() {
                let expect_open = n % 2 == 0;
                prop_assert_eq!(matches!(call, HostCall::Open(_)), expect_open);
            }
            let count = rt.registry().records().iter().filter(|r| r.id.as_str() == id).count();
            prop_assert!(count <= 1);
        }
    }
}
