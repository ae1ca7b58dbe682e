use crate::*;

fn group(id: &str, members: &[&str], parent: Option<&str>) -> ParsedGroup {
    let mut g = ParsedGroup::new(id, id, GroupType::Default);
    g.members = members.iter().map(|m| m.to_string()).collect();
    g.parent_id = parent.map(str::to_string);
    g
}

fn service(id: &str, group_ids: &[&str]) -> ResolvedService {
    let mut s = ResolvedService::stub(id);
    s.id = id.to_string();
    s.group_ids = group_ids.iter().map(|g| g.to_string()).collect();
    s
}

fn arch(services: Vec<ResolvedService>, groups: Vec<ParsedGroup>) -> ParsedArchitecture {
    ParsedArchitecture {
        services,
        groups,
        ..ParsedArchitecture::default()
    }
}

#[test]
fn two_group_cycle_is_cut_at_the_back_edge() {
    let a = arch(
        vec![service("svc-1", &[]), service("svc-2", &[])],
        vec![
            group("A", &["B", "svc-1"], Some("B")),
            group("B", &["A", "svc-2"], Some("A")),
        ],
    );
    let h = Hierarchy::resolve(&a);
    assert_eq!(h.roots().collect::<Vec<_>>(), vec!["A"]);
    assert_eq!(h.order().collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(h.parent_of("A"), None);
    assert_eq!(h.parent_of("B"), Some("A"));
    assert_eq!(h.depth_of("B"), Some(1));
    assert_eq!(h.cycle_edges().collect::<Vec<_>>(), vec![("B", "A")]);
    assert_eq!(h.service_parent("svc-1"), Some("A"));
    assert_eq!(h.service_parent("svc-2"), Some("B"));
}

#[test]
fn services_sit_in_their_innermost_group() {
    let a = arch(
        vec![service("vm", &["sub", "subnet"])],
        vec![
            group("sub", &["vnet"], None),
            group("vnet", &["subnet"], None),
            group("subnet", &[], None),
        ],
    );
    let h = Hierarchy::resolve(&a);
    assert_eq!(h.order().collect::<Vec<_>>(), vec!["sub", "vnet", "subnet"]);
    assert_eq!(h.depth_of("subnet"), Some(2));
    assert_eq!(h.service_parent("vm"), Some("subnet"));
}

#[test]
fn parent_ids_nest_groups_after_members() {
    let a = arch(
        Vec::new(),
        vec![
            group("root", &["x"], None),
            group("y", &[], Some("root")),
            group("x", &[], None),
        ],
    );
    let h = Hierarchy::resolve(&a);
    assert_eq!(h.order().collect::<Vec<_>>(), vec!["root", "x", "y"]);
    assert_eq!(h.parent_of("x"), Some("root"));
    assert_eq!(h.parent_of("y"), Some("root"));
}

#[test]
fn self_and_dangling_references_are_ignored() {
    let a = arch(
        vec![service("s", &["ghost"])],
        vec![group("g", &["g", "nobody"], Some("g"))],
    );
    let h = Hierarchy::resolve(&a);
    assert_eq!(h.roots().collect::<Vec<_>>(), vec!["g"]);
    assert_eq!(h.parent_of("g"), None);
    assert_eq!(h.cycle_edges().count(), 0);
    assert_eq!(h.service_parent("s"), None);
    assert!(!h.contains("ghost"));
}

#[test]
fn duplicate_group_ids_keep_the_first_entry() {
    let a = arch(
        Vec::new(),
        vec![group("g", &[], None), group("g", &[], Some("h")), group("h", &[], None)],
    );
    let h = Hierarchy::resolve(&a);
    assert_eq!(h.len(), 2);
    assert_eq!(h.parent_of("g"), None);
}

#[test]
fn long_rings_terminate() {
    let n = 500;
    let groups = (0..n)
        .map(|i| {
            let id = format!("g{i}");
            let next = format!("g{}", (i + 1) % n);
            let prev = format!("g{}", (i + n - 1) % n);
            group(&id, &[next.as_str()], Some(prev.as_str()))
        })
        .collect();
    let h = Hierarchy::resolve(&arch(Vec::new(), groups));
    assert_eq!(h.len(), n);
    assert_eq!(h.order().count(), n);
    assert_eq!(h.roots().collect::<Vec<_>>(), vec!["g0"]);
    assert_eq!(h.depth_of("g499"), Some(499));
    assert_eq!(h.cycle_edges().collect::<Vec<_>>(), vec![("g499", "g0")]);
}

#[test]
fn empty_architecture_has_an_empty_tree() {
    let h = Hierarchy::resolve(&ParsedArchitecture::default());
    assert!(h.is_empty());
    assert_eq!(h.order().count(), 0);
}
