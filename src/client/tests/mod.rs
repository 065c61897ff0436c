//! Unit tests for the pooled client, driven by the scripted dialer.


use std::{sync::Arc, time::Duration};

use rstest::fixture;

use super::{Pool, PoolConfig, test_support::ScriptedDialer};

const ADDRESS: &str = "10.0.0.1:7000";

#[fixture]
fn dialer() -> ScriptedDialer { ScriptedDialer::new() }

fn pool_with(dialer: &ScriptedDialer, max_idle: Duration) -> Pool<ScriptedDialer> {
    Pool::new(
        ADDRESS,
        Arc::new(dialer.clone()),
        PoolConfig::default().max_idle(max_idle),
    )
}
