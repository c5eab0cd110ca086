use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut::candidates::{
    compute_candidate_pairs, compute_candidate_pairs_brute_force, redistribute_cutter_elements,
    renumber_cutter_elements, CommunicationError, Communicator, SelfCommunicator, ThreadRing,
};
use xcut::element::ElementShape;
use xcut::mesh::procedural::{create_parametric_surface_cutter, create_unit_box_uniform_hex_discretization};
use xcut::mesh::Discretization;

fn wavy_cutter(shape: ElementShape) -> Discretization<f64> {
    create_parametric_surface_cutter(
        shape,
        5,
        4,
        |u: f64, v: f64| Point3::new(1.4 * u - 0.2, 1.4 * v - 0.2, 0.5 + 0.2 * (3.0 * u).sin() * (2.0 * v).cos()),
        "interface",
        0,
        0,
    )
    .unwrap()
}

/// Runs `f` on every rank of a ring of `size` threads and collects the results by rank.
fn run_on_ring<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadRing) -> R + Sync,
{
    std::thread::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = ThreadRing::create(size)
            .into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    })
}

#[test]
fn rtree_candidates_match_brute_force() {
    let xfem = create_unit_box_uniform_hex_discretization(4);
    for shape in [ElementShape::Tri3, ElementShape::Quad4, ElementShape::Quad9] {
        let cutter = wavy_cutter(shape);
        let candidates = compute_candidate_pairs(&xfem, &cutter).unwrap();
        let brute_force = compute_candidate_pairs_brute_force(&xfem, &cutter).unwrap();
        assert!(!candidates.is_empty());
        assert_eq!(candidates, brute_force);
    }
}

#[test]
fn touching_boxes_are_candidates() {
    let xfem = create_unit_box_uniform_hex_discretization(2);
    // A flat cutter lying exactly on the plane between the two layers of elements
    let cutter = create_parametric_surface_cutter(
        ElementShape::Quad4,
        1,
        1,
        |u: f64, v: f64| Point3::new(u, v, 0.5),
        "interface",
        0,
        0,
    )
    .unwrap();
    let candidates = compute_candidate_pairs(&xfem, &cutter).unwrap();
    assert_eq!(candidates.len(), 8);
    assert!(candidates.values().all(|ids| ids == &[0].into_iter().collect::<BTreeSet<_>>()));
}

#[test]
fn elements_outside_conditions_are_ignored() {
    let xfem = create_unit_box_uniform_hex_discretization(2);
    let cutter = wavy_cutter(ElementShape::Quad4);
    let claimed: BTreeSet<usize> = [0, 1, 2].into_iter().collect();

    // Keep every element, but let the condition claim only some of them
    let mut partially_claimed = cutter.restricted_to(&claimed).unwrap();
    for (id, element) in cutter.elements() {
        if !claimed.contains(id) {
            partially_claimed.insert_element(element.clone()).unwrap();
        }
    }
    for (id, x) in cutter.nodes() {
        partially_claimed.insert_node(*id, *x);
    }
    assert_eq!(partially_claimed.num_elements(), cutter.num_elements());

    let candidates = compute_candidate_pairs(&xfem, &partially_claimed).unwrap();
    assert!(!candidates.is_empty());
    assert!(candidates.values().flatten().all(|id| claimed.contains(id)));
}

#[test]
fn self_communicator_collectives() {
    let comm = SelfCommunicator;
    assert_eq!(comm.next_rank(), 0);
    assert_eq!(comm.previous_rank(), 0);
    assert_eq!(comm.all_gather(vec![1, 2, 3]).unwrap(), vec![vec![1, 2, 3]]);
    assert_eq!(comm.exclusive_prefix_sum(5).unwrap(), 0);
    assert_eq!(comm.all_reduce_sum(5).unwrap(), 5);
}

#[test]
fn thread_ring_collectives() {
    let results = run_on_ring(4, |comm| {
        let rank = comm.rank();
        let gathered = comm.all_gather(vec![rank as u8]).unwrap();
        let prefix = comm.exclusive_prefix_sum(rank + 1).unwrap();
        let total = comm.all_reduce_sum(rank + 1).unwrap();
        (gathered, prefix, total)
    });
    for (rank, (gathered, prefix, total)) in results.into_iter().enumerate() {
        assert_eq!(gathered, vec![vec![0], vec![1], vec![2], vec![3]]);
        assert_eq!(prefix, (1..=rank).sum::<usize>());
        assert_eq!(total, 10);
    }
}

#[test]
fn disconnected_ring_reports_error() {
    let mut ranks = ThreadRing::create(2);
    let second = ranks.pop().unwrap();
    drop(second);
    let first = ranks.pop().unwrap();
    let err = first.ring_exchange(vec![0]).unwrap_err();
    assert!(matches!(err, CommunicationError::Disconnected { .. }));
}

#[test]
fn renumbering_uses_prefix_sums_of_element_counts() {
    let cutter = wavy_cutter(ElementShape::Quad4);
    let partitions: Vec<Discretization<f64>> = [0..7, 7..12, 12..20]
        .into_iter()
        .map(|ids| cutter.restricted_to(&ids.collect()).unwrap())
        .collect();
    let results = run_on_ring(3, |comm| renumber_cutter_elements(&partitions[comm.rank()], &comm).unwrap());

    let mut all_new_ids = BTreeSet::new();
    for (rank, (renumbered, id_map)) in results.iter().enumerate() {
        let offset = [0, 7, 12][rank];
        let expected: BTreeSet<usize> = (offset..offset + partitions[rank].num_elements()).collect();
        assert_eq!(renumbered.elements().keys().copied().collect::<BTreeSet<_>>(), expected);
        assert_eq!(id_map.len(), partitions[rank].num_elements());
        for (old, new) in id_map {
            assert_eq!(renumbered.element(*new).unwrap().nodes(), cutter.element(*old).unwrap().nodes());
        }
        all_new_ids.extend(expected);
    }
    assert_eq!(all_new_ids.len(), 20);
}

#[test]
fn redistribution_gives_every_rank_the_whole_cutter() {
    let cutter = wavy_cutter(ElementShape::Tri3);
    let num_elements = cutter.num_elements();
    let displacements: BTreeMap<usize, Vector3<f64>> = cutter
        .nodes()
        .keys()
        .map(|node| (*node, Vector3::new(0.0, 0.0, 0.01 * *node as f64)))
        .collect();
    let partitions: Vec<Discretization<f64>> = (0..3)
        .map(|rank| {
            let ids = (0..num_elements).filter(|id| id % 3 == rank).collect();
            cutter.restricted_to(&ids).unwrap()
        })
        .collect();

    let results = run_on_ring(3, |comm| {
        redistribute_cutter_elements(&comm, &partitions[comm.rank()], &displacements).unwrap()
    });
    let serial = redistribute_cutter_elements(&SelfCommunicator, &cutter, &displacements).unwrap();

    for result in &results {
        assert_eq!(result.discretization.elements(), cutter.elements());
        assert_eq!(result.discretization.nodes(), cutter.nodes());
        assert_eq!(result.discretization.condition_elements().unwrap(), cutter.condition_elements().unwrap());
        assert_eq!(result.displacements, displacements);
        assert_eq!(
            result.discretization.displaced(&result.displacements),
            serial.discretization.displaced(&serial.displacements)
        );
    }
}
