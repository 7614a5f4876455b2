mod link_pair;

#[allow(unused_imports)]
pub use link_pair::{LinkPair, default_test_config};
