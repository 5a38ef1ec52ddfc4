//! Replay scheduling decisions, kept apart from cluster effects so they can
//! be exercised directly.

use crate::node::NodeRole;

/// Per-pod state the reconciler tracks for the life of the process. Records
/// live in a `Vec` because discovery order is the replay order within a
/// class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingRecord {
    pub pod_name: String,
    pub uid: String,
    pub last_phase: String,
    pub recreate_count: u32,
    pub redo_operations: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// First sighting of this pod name.
    Discovered,
    /// Same name, new UID: the pod was recreated.
    Recreated,
    /// Nothing identity-relevant changed.
    Steady,
}

/// Fold one pod event into the tracking table. A UID change dirties every
/// known node: veth endpoints die with either side, so the whole topology
/// is reconstructed.
pub fn observe(
    records: &mut Vec<TrackingRecord>,
    pod_name: &str,
    uid: &str,
    phase: &str,
) -> Observation {
    let Some(index) = records.iter().position(|r| r.pod_name == pod_name) else {
        records.push(TrackingRecord {
            pod_name: pod_name.to_string(),
            uid: uid.to_string(),
            last_phase: phase.to_string(),
            recreate_count: 0,
            redo_operations: false,
        });
        return Observation::Discovered;
    };
    let record = &mut records[index];
    record.last_phase = phase.to_string();
    if record.uid == uid {
        return Observation::Steady;
    }
    record.uid = uid.to_string();
    record.recreate_count += 1;
    mark_all_dirty(records);
    Observation::Recreated
}

pub fn mark_all_dirty(records: &mut [TrackingRecord]) {
    for record in records {
        record.redo_operations = true;
    }
}

/// Re-mark everything that is not a switch. Runs after a switch replay pass
/// so port re-attachment happens strictly after bridges are back.
pub fn mark_non_switches_dirty(
    records: &mut [TrackingRecord],
    is_switch: impl Fn(&str) -> bool,
) {
    for record in records {
        if !is_switch(&record.pod_name) {
            record.redo_operations = true;
        }
    }
}

pub fn any_dirty(records: &[TrackingRecord]) -> bool {
    records.iter().any(|record| record.redo_operations)
}

/// Dirty pods of the requested class, in discovery order.
pub fn dirty_pods(
    records: &[TrackingRecord],
    is_switch: impl Fn(&str) -> bool,
    switches: bool,
) -> Vec<String> {
    records
        .iter()
        .filter(|record| record.redo_operations && is_switch(&record.pod_name) == switches)
        .map(|record| record.pod_name.clone())
        .collect()
}

pub fn clear_dirty(records: &mut [TrackingRecord], pod_name: &str) {
    if let Some(record) = records.iter_mut().find(|r| r.pod_name == pod_name) {
        record.redo_operations = false;
    }
}

pub fn recreate_count(records: &[TrackingRecord], pod_name: &str) -> u32 {
    records
        .iter()
        .find(|record| record.pod_name == pod_name)
        .map(|record| record.recreate_count)
        .unwrap_or(0)
}

/// Fallback classification for pods observed before any facade registered
/// (labeled leftovers from an earlier run). The registered role is
/// authoritative when present.
pub fn name_looks_like_switch(pod_name: &str) -> bool {
    pod_name.starts_with('s')
}

pub fn role_is_switch(role: Option<NodeRole>, pod_name: &str) -> bool {
    match role {
        Some(role) => role == NodeRole::Switch,
        None => name_looks_like_switch(pod_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(records: &mut Vec<TrackingRecord>, pods: &[&str]) {
        for pod in pods {
            observe(records, pod, &format!("uid-{pod}"), "Running");
        }
    }

    #[test]
    fn first_event_bootstraps_a_clean_record() {
        let mut records = Vec::new();
        let seen = observe(&mut records, "h1-0", "uid-1", "Pending");
        assert_eq!(seen, Observation::Discovered);
        assert_eq!(records.len(), 1);
        assert!(!records[0].redo_operations);
        assert_eq!(records[0].recreate_count, 0);
    }

    #[test]
    fn uid_change_dirties_every_node() {
        let mut records = Vec::new();
        seed(&mut records, &["s1-0", "h1-0", "h2-0"]);
        let seen = observe(&mut records, "h1-0", "uid-new", "Running");
        assert_eq!(seen, Observation::Recreated);
        assert!(records.iter().all(|r| r.redo_operations));
    }

    #[test]
    fn recreate_count_is_monotonic() {
        let mut records = Vec::new();
        seed(&mut records, &["h1-0"]);
        observe(&mut records, "h1-0", "uid-b", "Running");
        observe(&mut records, "h1-0", "uid-c", "Running");
        assert_eq!(recreate_count(&records, "h1-0"), 2);
    }

    #[test]
    fn steady_events_leave_flags_alone() {
        let mut records = Vec::new();
        seed(&mut records, &["h1-0"]);
        let seen = observe(&mut records, "h1-0", "uid-h1-0", "Running");
        assert_eq!(seen, Observation::Steady);
        assert!(!any_dirty(&records));
    }

    #[test]
    fn phase_is_kept_current() {
        let mut records = Vec::new();
        observe(&mut records, "h1-0", "uid-1", "Pending");
        observe(&mut records, "h1-0", "uid-1", "Running");
        assert_eq!(records[0].last_phase, "Running");
    }

    #[test]
    fn switches_selected_in_discovery_order() {
        let mut records = Vec::new();
        seed(&mut records, &["h1-0", "s2-0", "s1-0", "h2-0"]);
        mark_all_dirty(&mut records);
        let switches = dirty_pods(&records, |name| name_looks_like_switch(name), true);
        assert_eq!(switches, vec!["s2-0".to_string(), "s1-0".to_string()]);
        let others = dirty_pods(&records, |name| name_looks_like_switch(name), false);
        assert_eq!(others, vec!["h1-0".to_string(), "h2-0".to_string()]);
    }

    #[test]
    fn remarking_spares_switches() {
        let mut records = Vec::new();
        seed(&mut records, &["s1-0", "h1-0"]);
        mark_non_switches_dirty(&mut records, |name| name_looks_like_switch(name));
        assert!(!records[0].redo_operations);
        assert!(records[1].redo_operations);
    }

    #[test]
    fn clearing_one_flag_keeps_the_rest() {
        let mut records = Vec::new();
        seed(&mut records, &["s1-0", "h1-0"]);
        mark_all_dirty(&mut records);
        clear_dirty(&mut records, "s1-0");
        assert!(!records[0].redo_operations);
        assert!(records[1].redo_operations);
        assert!(any_dirty(&records));
    }

    #[test]
    fn registered_role_beats_the_name_prefix() {
        // A host that happens to be named like a switch.
        assert!(!role_is_switch(Some(NodeRole::Host), "s9-0"));
        assert!(role_is_switch(Some(NodeRole::Switch), "edge-0"));
        // No registration: the prefix heuristic is all there is.
        assert!(role_is_switch(None, "s9-0"));
        assert!(!role_is_switch(None, "h9-0"));
    }
}
