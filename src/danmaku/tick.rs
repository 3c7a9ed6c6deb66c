//! Traversal tick: advance every active instance and report the finished ones.

use super::{DanmakuInstance, InstanceId};
use std::collections::BTreeMap;
use std::time::Duration;

/// Advance instances up to `now`. When `advancing` is false the clock moves
/// on but the traversal does not. Returns the instances whose traversal just
/// completed.
pub(super) fn advance_instances(
    active: &mut BTreeMap<InstanceId, DanmakuInstance>,
    now: Duration,
    advancing: bool,
) -> Vec<InstanceId> {
    let mut finished = Vec::new();
    for (id, instance) in active.iter_mut() {
        let delta = now.saturating_sub(instance.last_seen);
        instance.last_seen = instance.last_seen.max(now);
        if advancing {
            instance.elapsed = (instance.elapsed + delta).min(instance.duration);
        }
        if instance.is_finished() {
            finished.push(*id);
        }
    }
    finished
}
