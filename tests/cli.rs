use assert_cmd::Command;
use image::GenericImageView;
use predicates::prelude::*;

fn fracgen() -> Command {
    let mut cmd = Command::cargo_bin("fracgen").unwrap();
    cmd.args(&["--threads", "2", "--dwell", "40"]);
    cmd
}

#[test]
fn view_writes_a_png() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("view.png");
    fracgen()
        .args(&["--fractal", "julia", "view", "--size", "48", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote"));
    let image = image::open(&output).unwrap();
    assert_eq!(image.dimensions(), (48, 48));
}

#[test]
fn render_stitches_panels_into_render_bmp() {
    let dir = tempfile::tempdir().unwrap();
    fracgen()
        .args(&[
            "--center",
            "-0.75,0.1",
            "--span",
            "1.0,0.5",
            "--scheme",
            "spline",
            "render",
            "--width",
            "64",
            "--panel-capacity",
            "512",
            "--output-dir",
        ])
        .arg(dir.path())
        .assert()
        .success();
    let image = fracgen::bitmap::read_file(dir.path().join("render.bmp")).unwrap();
    assert_eq!((image.width, image.height), (64, 32));
    assert!(!dir.path().join("panel_0001.bmp").exists());
}

#[test]
fn oversized_renders_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    fracgen()
        .args(&["render", "--width", "1000", "--panel-capacity", "500", "--output-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("too large"));
}

#[test]
fn widths_are_validated() {
    fracgen()
        .args(&["render", "--width", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Width must be between"));
}

#[test]
fn viewport_sizes_are_bounded() {
    fracgen()
        .args(&["view", "--size", "10000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Viewport size must be between 1 and 2048"));
}

#[test]
fn bad_schemes_are_rejected() {
    fracgen()
        .args(&["--scheme", "plaid", "view"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plaid"));
}

#[test]
fn palette_strips_match_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("palette.bmp");
    fracgen()
        .args(&["--scheme", "linear", "palette", "--height", "4", "-o"])
        .arg(&output)
        .assert()
        .success();
    let strip = fracgen::bitmap::read_file(&output).unwrap();
    assert_eq!((strip.width, strip.height), (320, 4));

    fracgen()
        .args(&["--scheme", "monochrome", "palette"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no palette table"));
}
