use patchfill::{
    self as pf,
    image::{GrayImage, Luma, Rgb, RgbImage},
    Coord, Dims, Error, HoleMask, LabelGrid, Parameters,
};

fn square_hole(dims: Dims, min: u32, max: u32) -> HoleMask {
    HoleMask::from_fn(dims, |x, y| x >= min && x <= max && y >= min && y <= max)
}

fn bricks(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let row = y / 4;
        let offset = if row % 2 == 0 { 0 } else { 4 };
        if y % 4 == 0 || (x + offset) % 8 == 0 {
            Rgb([200, 200, 190])
        } else {
            Rgb([150 + (row % 3) as u8 * 10, 60, 40])
        }
    })
}

fn small_params() -> Parameters {
    Parameters {
        patch_w: 3,
        outer_iterations: 3,
        inner_iterations: 6,
        sigma: 9.0,
        ..Parameters::default()
    }
}

#[test]
fn constant_image_is_filled_exactly() {
    let dims = Dims::square(10);
    let img = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
    let hole = square_hole(dims, 4, 6);
    let params = Parameters {
        patch_w: 3,
        ..Parameters::default()
    };

    let filled = pf::complete(&img, &hole, None, &params).unwrap();
    for c in hole.iter_holes() {
        assert_eq!(filled.get_pixel(c.x, c.y).0, [100, 100, 100], "{:?}", c);
    }

    let completed = pf::Session::builder()
        .inpaint(img.clone(), hole.to_gray())
        .patch_size(3)
        .build()
        .unwrap()
        .run(None)
        .unwrap();
    assert_eq!(completed.as_ref(), &filled);

    // every placement whose patch touches the hole converged to a perfect match
    let nnf = completed.nnf().expect("the hole was not empty");
    let touching = nnf.mean_distance_in(|c: Coord| c.x + 2 >= 4 && c.x <= 6 && c.y + 2 >= 4 && c.y <= 6);
    assert_eq!(touching, Some(0.0));
}

#[test]
fn unsatisfiable_constraint_fails_instead_of_hanging() {
    let dims = Dims::square(16);
    let img = bricks(16, 16);
    let hole = square_hole(dims, 4, 11);
    let labels = LabelGrid::from_fn(dims, |x, y| {
        if !hole.is_hole(x, y) {
            1
        } else if (7..=8).contains(&x) && (7..=8).contains(&y) {
            2
        } else {
            0
        }
    });

    match pf::complete(&img, &hole, Some(&labels), &small_params()) {
        Err(Error::UnsatisfiableConstraint { label }) => assert_eq!(label, 2),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn label_reachable_only_at_full_resolution() {
    // label 2 covers part of the hole and a thin strip a few pixels to its
    // left, which every coarser level swallows into the excluded region
    let dims = Dims::square(64);
    let img = bricks(64, 64);
    let inside = |v: u32| v >= 24 && v <= 40;
    let hole = HoleMask::from_fn(dims, |x, y| inside(x) && inside(y));
    let labels = LabelGrid::from_fn(dims, |x, y| {
        let strip = (16..=18).contains(&x) && inside(y);
        if strip || (hole.is_hole(x, y) && x <= 32) {
            2
        } else {
            0
        }
    });
    let params = Parameters {
        patch_w: 5,
        start_scale: -2,
        ..small_params()
    };

    let filled = pf::complete(&img, &hole, Some(&labels), &params).unwrap();
    for (x, y, p) in img.enumerate_pixels() {
        if !hole.is_hole(x, y) {
            assert_eq!(filled.get_pixel(x, y), p);
        }
    }
}

#[test]
fn constrained_completion_draws_from_the_same_label() {
    // red on the left labeled 1, blue on the right labeled 2, with a hole
    // straddling the border
    let (w, h) = (40, 24);
    let img = RgbImage::from_fn(w, h, |x, _| {
        if x < w / 2 {
            Rgb([220, 30, 30])
        } else {
            Rgb([30, 30, 220])
        }
    });
    let hole = HoleMask::from_fn(Dims::new(w, h), |x, y| x >= 12 && x < 28 && y >= 8 && y < 16);
    let labels = LabelGrid::from_fn(Dims::new(w, h), |x, _| if x < w / 2 { 1 } else { 2 });

    let filled = pf::complete(&img, &hole, Some(&labels), &small_params()).unwrap();

    for y in 8..16 {
        let left = filled.get_pixel(13, y);
        assert!(left[0] > left[2], "left {:?}", left);
        let right = filled.get_pixel(27, y);
        assert!(right[2] > right[0], "right {:?}", right);
    }
}

#[test]
fn known_pixels_are_untouched() {
    let img = bricks(48, 40);
    let hole = HoleMask::from_fn(Dims::new(48, 40), |x, y| {
        (x as i32 - 20).pow(2) + (y as i32 - 22).pow(2) < 49
    });

    let filled = pf::complete(&img, &hole, None, &small_params()).unwrap();
    for (x, y, p) in img.enumerate_pixels() {
        if !hole.is_hole(x, y) {
            assert_eq!(filled.get_pixel(x, y), p);
        }
    }
}

macro_rules! thread_invariant {
    ($name:ident, $threads:expr, $mode:expr) => {
        #[test]
        fn $name() {
            let img = bricks(40, 32);
            let hole = square_hole(Dims::new(40, 32), 14, 21);

            let run = |threads| {
                pf::complete(
                    &img,
                    &hole,
                    None,
                    &Parameters {
                        max_thread_count: Some(threads),
                        exclusion_mode: $mode,
                        seed: 77,
                        ..small_params()
                    },
                )
                .unwrap()
            };

            // We always compare against a single thread, the matching is
            // sequential and the voting must not depend on the split
            assert_eq!(run(1), run($threads));
        }
    };
}

thread_invariant!(two_threads, 2, pf::ExclusionMode::Dilated);
thread_invariant!(seven_threads, 7, pf::ExclusionMode::Dilated);
thread_invariant!(many_threads_box, 32, pf::ExclusionMode::BoundingBox);

#[test]
fn builder_rejects_invalid_parameters() {
    let img = bricks(16, 16);
    let mask = square_hole(Dims::square(16), 5, 9).to_gray();

    let builders = vec![
        pf::Session::builder().patch_size(0),
        pf::Session::builder().patch_size(100),
        pf::Session::builder().sigma(-1.0),
        pf::Session::builder().start_scale(2),
        pf::Session::builder().convergence_threshold(-0.1),
        pf::Session::builder().outer_iterations(0),
        pf::Session::builder().inner_iterations(0),
        pf::Session::builder().random_search_cap(0),
        pf::Session::builder().max_thread_count(0),
    ];

    for builder in builders {
        match builder.inpaint(img.clone(), mask.clone()).build() {
            Err(Error::InvalidRange(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("invalid parameters were accepted"),
        }
    }
}

#[test]
fn builder_rejects_bad_inputs() {
    let img = bricks(16, 16);
    let mask = square_hole(Dims::square(16), 5, 9).to_gray();

    assert!(matches!(
        pf::Session::builder().build(),
        Err(Error::NoInput)
    ));

    let small_mask = GrayImage::from_pixel(16, 15, Luma([0]));
    assert!(matches!(
        pf::Session::builder().inpaint(img.clone(), small_mask).build(),
        Err(Error::SizeMismatch(_))
    ));

    let small_labels = GrayImage::from_pixel(15, 16, Luma([1]));
    assert!(matches!(
        pf::Session::builder()
            .inpaint(img.clone(), mask.clone())
            .constraint_map(small_labels)
            .build(),
        Err(Error::SizeMismatch(_))
    ));

    let mut colored = RgbImage::from_pixel(16, 16, Rgb([4, 4, 4]));
    colored.put_pixel(3, 5, Rgb([4, 9, 4]));
    assert!(matches!(
        pf::Session::builder()
            .inpaint(img.clone(), mask.clone())
            .constraint_map(colored)
            .build(),
        Err(Error::MalformedLabel { x: 3, y: 5, .. })
    ));

    assert!(matches!(
        pf::Session::builder()
            .inpaint(img, mask)
            .patch_size(17)
            .build(),
        Err(Error::PatchTooLarge { .. })
    ));
}

#[test]
fn empty_mask_returns_the_image() {
    let img = bricks(20, 20);
    let completed = pf::Session::builder()
        .inpaint(img.clone(), GrayImage::new(20, 20))
        .build()
        .unwrap()
        .run(None)
        .unwrap();

    assert!(completed.nnf().is_none());
    assert_eq!(completed.into_image().to_rgb(), img);
}
