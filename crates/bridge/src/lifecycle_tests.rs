// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::{LifecycleBus, LifecycleEvent, StartedTarget};
use crate::context::ContextRef;
use crate::parse::OutputParser;
use crate::source::AgentHandle;

#[yare::parameterized(
    same_context      = { StartedTarget::Context(ContextRef::epic(4)), ContextRef::epic(4), true },
    other_id          = { StartedTarget::Context(ContextRef::epic(4)), ContextRef::epic(5), false },
    other_type        = { StartedTarget::Context(ContextRef::epic(4)), ContextRef::task(4), false },
    legacy_task       = { StartedTarget::Task(9), ContextRef::task(9), true },
    legacy_other_id   = { StartedTarget::Task(9), ContextRef::task(8), false },
    legacy_not_epic   = { StartedTarget::Task(9), ContextRef::epic(9), false },
    legacy_not_project = { StartedTarget::Task(9), ContextRef::project(9), false },
)]
fn target_matching(target: StartedTarget, ctx: ContextRef, expected: bool) {
    assert_eq!(target.matches(&ctx), expected);
}

#[tokio::test]
async fn started_reaches_every_listener() -> anyhow::Result<()> {
    let bus = LifecycleBus::default();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();
    assert_eq!(bus.listener_count(), 2);

    let agent = AgentHandle::new(ContextRef::task(1), 8, Arc::new(OutputParser::new()?));
    bus.started(StartedTarget::Context(ContextRef::task(1)), Arc::clone(agent.source()));

    for rx in [&mut a, &mut b] {
        let LifecycleEvent::Started(started) = rx.recv().await?;
        assert_eq!(started.source.id(), agent.source().id());
    }
    Ok(())
}

#[test]
fn dropped_listener_is_released() {
    let bus = LifecycleBus::default();
    let rx = bus.subscribe();
    assert_eq!(bus.listener_count(), 1);
    drop(rx);
    assert_eq!(bus.listener_count(), 0);
}
