use patchfill as pf;

fn main() -> Result<(), pf::Error> {
    // a tiled pattern with a round hole punched into it
    let img = pf::image::RgbImage::from_fn(160, 120, |x, y| {
        let tile = ((x / 16) + (y / 16)) % 2;
        let shade = if tile == 0 { 70 } else { 180 };
        pf::image::Rgb([shade, shade / 2 + (x % 16) as u8 * 4, 90])
    });
    let mask = pf::image::GrayImage::from_fn(160, 120, |x, y| {
        let (dx, dy) = (x as i32 - 80, y as i32 - 60);
        pf::image::Luma([if dx * dx + dy * dy < 20 * 20 { 255 } else { 0 }])
    });

    let session = pf::Session::builder()
        // the image to complete and a mask where white marks the hole
        .inpaint(img, mask)
        .patch_size(7)
        // start at a quarter of the size
        .start_scale(-2)
        .seed(7)
        .build()?;

    let completed = session.run(Some(Box::new(|update: pf::ProgressUpdate<'_>| {
        println!(
            "level {}/{} iteration {}/{}: change {:.3}",
            update.level.current,
            update.level.total,
            update.iteration.current,
            update.iteration.total,
            update.change
        );
    })))?;

    completed.save_debug("out/01_debug")?;
    //save the result to the disk
    completed.save("out/01.png")
}
