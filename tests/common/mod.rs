#![allow(dead_code)]
#![allow(unused_imports)]

pub use triggerdag_test_utils::{builders, init_tracing, recorder, with_timeout};
