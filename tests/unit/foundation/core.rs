use super::*;

#[test]
fn pixel_box_intersection_and_degenerate_cases() {
    let a = PixelBox::new(0, 0, 10, 10);
    let b = PixelBox::new(5, 5, 10, 10);
    assert_eq!(a.intersect(b), Some(PixelBox::new(5, 5, 5, 5)));

    let touching = PixelBox::new(10, 0, 5, 5);
    assert_eq!(a.intersect(touching), None);

    assert!(PixelBox::new(3, 3, 0, 4).is_empty());
    assert!(PixelBox::new(3, 3, 4, -1).is_empty());
    assert_eq!(PixelBox::new(3, 3, -4, 4).area(), 0);
}

#[test]
fn pixel_box_expand_and_translate() {
    let b = PixelBox::new(10, 10, 10, 10);
    assert_eq!(b.expand(5), PixelBox::new(5, 5, 20, 20));
    assert_eq!(b.translate(-10, 3), PixelBox::new(0, 13, 10, 10));
    assert!(b.contains_point(10, 19));
    assert!(!b.contains_point(20, 10));
}

#[test]
fn pixel_box_from_rect_rounds_outward() {
    let r = Rect::new(0.5, 1.2, 9.1, 9.9);
    assert_eq!(PixelBox::from_rect(r), PixelBox::new(0, 1, 10, 9));
    assert_eq!(PixelBox::new(1, 2, 3, 4).scaled(2.0), PixelBox::new(2, 4, 6, 8));
}

#[test]
fn transformed_box_roundtrips_through_inverse() {
    let (w, h) = (100, 60);
    let b = PixelBox::new(10, 5, 20, 7);
    for t in [
        OutputTransform::Normal,
        OutputTransform::Rotate90,
        OutputTransform::Rotate180,
        OutputTransform::Rotate270,
        OutputTransform::Flipped,
        OutputTransform::Flipped90,
        OutputTransform::Flipped180,
        OutputTransform::Flipped270,
    ] {
        let (tw, th) = if t.swaps_axes() { (h, w) } else { (w, h) };
        let there = t.transform_box(b, w, h);
        let back = t.invert().transform_box(there, tw, th);
        assert_eq!(back, b, "transform {t:?}");
    }
}

#[test]
fn rotate90_moves_top_left_to_top_right() {
    let b = PixelBox::new(0, 0, 10, 5);
    let t = OutputTransform::Rotate90.transform_box(b, 100, 50);
    assert_eq!(t, PixelBox::new(45, 0, 5, 10));
}

#[test]
fn straight_to_premul() {
    let c = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(c.a, 128);
    assert_eq!(c.r, 128);
    assert_eq!(c.g, 64);
    assert_eq!(c.b, 0);
    assert_eq!(Rgba8Premul::from_straight([1, 2, 3, 255]).to_array(), [1, 2, 3, 255]);
}
