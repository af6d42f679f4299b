//! Property: after every handled transition, each output equals its input
//! and the published mask describes both.

use iomux_common::mux::pins::PinMask;
use iomux_common::shm::names::SegmentNames;
use iomux_hal::PinEventLoop;
use iomux_hal::backends::PinBackend;
use iomux_hal::backends::simulation::SimulationBackend;
use iomux_shared_memory::SharedStateStore;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn outputs_mirror_inputs(transitions in proptest::collection::vec((0usize..4, any::<bool>()), 1..24)) {
        let names = SegmentNames::new(&format!("iomux_prop_{}", std::process::id()));
        let _ = SharedStateStore::unlink_names(&names);
        let store = Arc::new(SharedStateStore::attach(&names).unwrap());

        let mut backend = SimulationBackend::new();
        backend.request().unwrap();
        let pins = backend.handle();
        let mut pin_loop =
            PinEventLoop::new(Box::new(backend), Arc::clone(&store), Duration::from_millis(1)).unwrap();

        let mut published = 0u64;
        for (input, level) in transitions {
            pins.set_input(input, level);
            if pin_loop.cycle().unwrap() {
                published += 1;
            }

            let inputs = pins.inputs();
            prop_assert_eq!(pins.outputs(), inputs);
            let expected = PinMask::from_inputs(inputs).mirrored(0);
            prop_assert_eq!(store.read_pin_mask(), expected);
            prop_assert_eq!(pin_loop.current_mask(), expected);
        }
        prop_assert_eq!(u64::from(store.revision_count().unwrap()), published);
        prop_assert_eq!(pin_loop.stats().publishes, published);

        drop(pin_loop);
        drop(store);
        SharedStateStore::unlink_names(&names).unwrap();
    }
}
