use crossbeam::channel;
use fracgen::bitmap::{read_file, write_file};
use fracgen::{
    Config, Coordinator, Fractal, Outcome, Oversample, Pixel, RenderRequest, Session,
    ShaderSettings,
};
use rand::Rng;
use std::path::Path;
use std::time::Duration;

fn config(dir: &Path, viewport: usize, capacity: usize) -> Config {
    Config {
        threads: 4,
        viewport_size: viewport,
        panel_capacity: capacity,
        viewport_poll: Duration::from_millis(5),
        render_poll: Duration::from_millis(5),
        ..Config::default()
    }
    .with_output_dir(dir)
}

fn viewport_pixels(dir: &Path) -> Vec<Pixel> {
    let (tx, _rx) = channel::unbounded();
    let mut c = Coordinator::new(config(dir, 100, 10_000), ShaderSettings::default(), tx).unwrap();
    let request = RenderRequest {
        coord: fracgen::Coordinate::new(
            num::Complex::new(-0.5, 0.25),
            num::Complex::new(1.5, 1.5),
        )
        .unwrap(),
        oversample: Oversample::None,
        ..RenderRequest::home(Fractal::Mandelbrot, 50)
    };
    assert_eq!(c.render(&request).unwrap(), Outcome::Finished);
    c.viewport_pixels()
}

#[test]
fn viewport_renders_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first = viewport_pixels(dir.path());
    let second = viewport_pixels(dir.path());
    assert_eq!(first.len(), 100 * 100);
    assert_eq!(first, second);
    assert!(first.iter().any(|p| *p == Pixel::BLACK));
    assert!(first.iter().any(|p| *p != Pixel::BLACK));
}

#[test]
fn tiled_render_is_readable_by_the_image_crate() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new(config(dir.path(), 16, 150 * 24), ShaderSettings::default()).unwrap();
    let request = RenderRequest {
        oversample: Oversample::Four,
        ..RenderRequest::home(Fractal::Mandelbrot, 60)
    }
    .full(150);
    session.start_render(request).unwrap();
    assert_eq!(session.wait(), Outcome::Finished);

    let path = dir.path().join("render.bmp");
    let ours = read_file(&path).unwrap();
    assert_eq!((ours.width, ours.height), (150, 150));

    let theirs = image::open(&path).unwrap().to_rgb8();
    assert_eq!(theirs.dimensions(), (150, 150));
    for (x, y, p) in theirs.enumerate_pixels() {
        let q = ours.get(x as usize, y as usize);
        assert_eq!(p.0, [q.r, q.g, q.b]);
    }

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("render.bmp")]);
}

#[test]
fn random_bitmaps_decode_the_same_in_the_image_crate() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand::thread_rng();
    for n in 0..8 {
        let (width, height) = (rng.gen_range(1..40), rng.gen_range(1..40));
        let pixels: Vec<Pixel> = (0..width * height)
            .map(|_| Pixel::rgb(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let path = dir.path().join(format!("random_{}.bmp", n));
        write_file(&path, &pixels, width, height).unwrap();

        let theirs = image::open(&path).unwrap().to_rgb8();
        for (x, y, p) in theirs.enumerate_pixels() {
            let q = pixels[y as usize * width + x as usize];
            assert_eq!(p.0, [q.r, q.g, q.b]);
        }
    }
}

#[test]
fn session_reshade_follows_a_viewport_render() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new(config(dir.path(), 32, 10_000), ShaderSettings::default()).unwrap();
    session
        .start_render(RenderRequest::home(Fractal::Julia, 80))
        .unwrap();
    assert_eq!(session.wait(), Outcome::Finished);
    let before = session.viewport();

    let mut grey = ShaderSettings::default();
    grey.greyscale = true;
    session.reshade(grey).unwrap();
    assert_eq!(session.wait(), Outcome::Reshaded);
    let after = session.viewport();
    assert_ne!(before, after);
    assert!(after.iter().all(|p| p.r == p.g && p.g == p.b));
}
