use patchfill as pf;

fn main() -> Result<(), pf::Error> {
    let source = pf::image::RgbImage::from_fn(96, 64, |x, y| {
        pf::image::Rgb([(x * 2) as u8, (y * 3) as u8, ((x ^ y) * 4) as u8])
    });
    // the same content, moved 10 pixels to the left
    let target = pf::image::RgbImage::from_fn(96, 64, |x, y| *source.get_pixel((x + 10).min(95), y));

    let params = pf::Parameters {
        patch_w: 5,
        outer_iterations: 6,
        ..pf::Parameters::default()
    };
    let nnf = pf::match_patches(&source, &target, &pf::mask::NoExclusion, &params)?;

    let shifted = nnf
        .iter()
        .filter(|(s, m)| s.x >= 10 && m.target == pf::Coord::new(s.x - 10, s.y))
        .count();
    println!(
        "{} of {} patches found their shifted copy, mean distance {:.1}",
        shifted,
        nnf.iter().count(),
        nnf.mean_distance()
    );

    std::fs::create_dir_all("out")?;
    nnf.offset_map().save("out/02_offsets.png")?;
    Ok(())
}
