use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fracgen::{EscapeSample, Fractal, FractalValue, Scheme, Shader, ShaderSettings};

fn iterate(c: &mut Criterion) {
    c.bench_function("mandelbrot seahorse valley", |b| {
        b.iter(|| Fractal::Mandelbrot.iterate(black_box(-0.7435), black_box(0.1314), 1000))
    });
    c.bench_function("mandelbrot interior", |b| {
        b.iter(|| Fractal::Mandelbrot.iterate(black_box(-0.1), black_box(0.1), 1000))
    });
    c.bench_function("julia", |b| {
        b.iter(|| Fractal::Julia.iterate(black_box(0.3), black_box(-0.2), 1000))
    });
}

fn shade(c: &mut Criterion) {
    let mut value = FractalValue::default();
    for (i, slot) in value.samples.iter_mut().enumerate() {
        *slot = EscapeSample {
            iterations: 20 + i as u32,
            modulus_sq: 40.0 + i as f64,
        };
    }
    value.count = 9;

    for scheme in Scheme::ALL.iter() {
        let shader = Shader::new(ShaderSettings {
            scheme: *scheme,
            ..ShaderSettings::default()
        });
        c.bench_function(&format!("shade 9 samples, {}", scheme), |b| {
            b.iter(|| shader.color(black_box(&value)))
        });
    }
}

criterion_group!(benches, iterate, shade);
criterion_main!(benches);
