use super::*;

fn b(x: i32, y: i32, w: i32, h: i32) -> PixelBox {
    PixelBox::new(x, y, w, h)
}

fn samples() -> Vec<Region> {
    vec![
        Region::new(),
        Region::from_box(b(0, 0, 10, 10)),
        Region::from_box(b(5, 5, 10, 10)),
        Region::from_boxes([b(0, 0, 4, 4), b(8, 0, 4, 4), b(2, 6, 8, 2)]),
        Region::from_boxes([b(-3, -3, 6, 20), b(20, 1, 1, 1)]),
    ]
}

#[test]
fn overlapping_boxes_normalize_to_disjoint_rects() {
    let r = Region::from_boxes([b(0, 0, 10, 10), b(5, 5, 10, 10)]);
    assert_eq!(r.area(), 100 + 100 - 25);
    for (i, a) in r.rects().iter().enumerate() {
        assert!(!a.is_empty());
        for c in &r.rects()[i + 1..] {
            assert!(a.intersect(*c).is_none(), "{a:?} overlaps {c:?}");
        }
    }
}

#[test]
fn equal_coverage_compares_equal_regardless_of_construction() {
    let split = Region::from_boxes([b(0, 0, 5, 10), b(5, 0, 5, 10)]);
    let whole = Region::from_box(b(0, 0, 10, 10));
    assert_eq!(split, whole);

    let stacked = Region::from_boxes([b(0, 0, 10, 3), b(0, 3, 10, 7)]);
    assert_eq!(stacked, whole);
    assert_eq!(whole.rects().len(), 1);
}

#[test]
fn degenerate_boxes_are_dropped() {
    let mut r = Region::new();
    r.add_box(b(3, 3, 0, 10));
    r.add_box(b(3, 3, 10, -1));
    assert!(r.is_empty());
    assert!(Region::from_box(b(1, 1, 0, 0)).is_empty());
}

#[test]
fn union_is_commutative_associative_idempotent() {
    let s = samples();
    for a in &s {
        assert_eq!(&a.union(a), a);
        for c in &s {
            assert_eq!(a.union(c), c.union(a));
            for d in &s {
                assert_eq!(a.union(c).union(d), a.union(&c.union(d)));
            }
        }
    }
}

#[test]
fn intersect_distributes_over_union() {
    let s = samples();
    for a in &s {
        for c in &s {
            for d in &s {
                assert_eq!(
                    a.intersect(&c.union(d)),
                    a.intersect(c).union(&a.intersect(d))
                );
            }
        }
    }
}

#[test]
fn xor_with_self_is_empty_and_matches_definition() {
    let s = samples();
    for a in &s {
        assert!(a.xor(a).is_empty());
        for c in &s {
            let expected = a.subtract(c).union(&c.subtract(a));
            assert_eq!(a.xor(c), expected);
        }
    }
}

#[test]
fn subtract_removes_exactly_the_overlap() {
    let a = Region::from_box(b(0, 0, 10, 10));
    let hole = Region::from_box(b(3, 3, 4, 4));
    let ring = &a - &hole;
    assert_eq!(ring.area(), 100 - 16);
    assert!(!ring.contains_point(4, 4));
    assert!(ring.contains_point(0, 0));
    assert!(ring.contains_point(9, 9));
    assert_eq!(&ring | &hole, a);
}

#[test]
fn xor_with_whole_box_is_complement_within_box() {
    let whole = b(0, 0, 100, 50);
    let mut pending = Region::from_box(b(10, 10, 10, 10));
    pending ^= whole;
    assert_eq!(pending.area(), 100 * 50 - 100);
    assert!(!pending.contains_point(15, 15));
    assert!(pending.contains_point(0, 0));
}

#[test]
fn operators_match_methods() {
    let a = Region::from_box(b(0, 0, 10, 10));
    let c = Region::from_box(b(5, 0, 10, 10));
    assert_eq!(&a | &c, a.union(&c));
    assert_eq!(&a & &c, a.intersect(&c));
    assert_eq!(&a ^ &c, a.xor(&c));

    let mut m = a.clone();
    m &= b(0, 0, 3, 3);
    assert_eq!(m, Region::from_box(b(0, 0, 3, 3)));
    m |= b(3, 0, 3, 3);
    assert_eq!(m, Region::from_box(b(0, 0, 6, 3)));
}

#[test]
fn extents_translate_expand() {
    let r = Region::from_boxes([b(0, 0, 2, 2), b(10, 5, 2, 2)]);
    assert_eq!(r.extents(), Some(b(0, 0, 12, 7)));
    assert_eq!(Region::new().extents(), None);
    assert_eq!(r.translate(5, -5).extents(), Some(b(5, -5, 12, 7)));
    assert_eq!(
        Region::from_box(b(10, 10, 10, 10)).expand(5),
        Region::from_box(b(5, 5, 20, 20))
    );
}

#[test]
fn transform_rotates_region() {
    let r = Region::from_box(b(0, 0, 10, 5));
    let t = r.transform(OutputTransform::Rotate90, 100, 50);
    assert_eq!(t, Region::from_box(b(45, 0, 5, 10)));
    assert_eq!(r.transform(OutputTransform::Normal, 100, 50), r);
}

#[test]
fn contains_region_is_subset_test() {
    let outer = Region::from_box(b(0, 0, 10, 10));
    let inner = Region::from_box(b(2, 2, 3, 3));
    assert!(outer.contains_region(&inner));
    assert!(!inner.contains_region(&outer));
    assert!(outer.contains_region(&Region::new()));
}
