extern crate clap;
extern crate env_logger;
extern crate fracgen;
extern crate image;
extern crate num;
extern crate num_cpus;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use fracgen::bitmap;
use fracgen::config::{MAX_THREADS, MAX_VIEWPORT_SIZE};
use fracgen::job::{megapixels, rows_for, MAX_RENDER_WIDTH, MIN_RENDER_WIDTH};
use fracgen::{
    Config, Coordinate, Event, Fractal, Outcome, Oversample, Progress, RenderError, RenderRequest,
    Scheme, Session, Severity, Shader, ShaderSettings,
};
use image::ColorType;
use num::Complex;
use std::io::Write;
use std::process;
use std::str::FromStr;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_parse<T: FromStr<Err = String>>(s: &str) -> Result<(), String> {
    T::from_str(s).map(|_| ())
}

fn parse_invert(s: &str) -> Result<(bool, bool, bool), String> {
    let mut channels = (false, false, false);
    for channel in s.split(',').map(str::trim) {
        match channel {
            "r" => channels.0 = true,
            "g" => channels.1 = true,
            "b" => channels.2 = true,
            "all" | "rgb" => channels = (true, true, true),
            other => return Err(format!("Unknown channel '{}'; use r, g, b or all", other)),
        }
    }
    Ok(channels)
}

const THREADS: &str = "threads";
const DWELL: &str = "dwell";
const FRACTAL: &str = "fractal";
const CENTER: &str = "center";
const SPAN: &str = "span";
const OVERSAMPLE: &str = "oversample";
const SCHEME: &str = "scheme";
const HUE: &str = "hue";
const INVERT: &str = "invert";
const GREYSCALE: &str = "greyscale";
const VERBOSE: &str = "verbose";
const OUTPUT: &str = "output";
const SIZE: &str = "size";
const WIDTH: &str = "width";
const CAPACITY: &str = "panel-capacity";
const OUTPUT_DIR: &str = "output-dir";
const HEIGHT: &str = "height";

fn args<'a>() -> ArgMatches<'a> {
    App::new("fracgen")
        .version("0.1.0")
        .about("Mandelbrot and Julia renderer for images of any size")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_THREADS,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", MAX_THREADS),
                    )
                })
                .help("Number of worker threads (default: one per core)"),
        )
        .arg(
            Arg::with_name(DWELL)
                .long(DWELL)
                .short("d")
                .takes_value(true)
                .default_value("100")
                .validator(|s| {
                    validate_range(
                        &s,
                        1u32,
                        10_000_000,
                        "Could not parse dwell",
                        "Dwell must be between 1 and 10000000",
                    )
                })
                .help("Iterations before a point is taken to be inside the set"),
        )
        .arg(
            Arg::with_name(FRACTAL)
                .long(FRACTAL)
                .short("f")
                .takes_value(true)
                .default_value("mandelbrot")
                .validator(|s| validate_parse::<Fractal>(&s))
                .help("Fractal family: mandelbrot or julia"),
        )
        .arg(
            Arg::with_name(CENTER)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse center point"))
                .help("Center of the view as RE,IM (default: the fractal's home view)"),
        )
        .arg(
            Arg::with_name(SPAN)
                .long(SPAN)
                .short("s")
                .takes_value(true)
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse span"))
                .help("Width and height of the view as RE,IM"),
        )
        .arg(
            Arg::with_name(OVERSAMPLE)
                .long(OVERSAMPLE)
                .short("x")
                .takes_value(true)
                .default_value("0")
                .validator(|s| validate_parse::<Oversample>(&s))
                .help("Samples per pixel: 0, 4 or 9"),
        )
        .arg(
            Arg::with_name(SCHEME)
                .long(SCHEME)
                .takes_value(true)
                .default_value("default")
                .validator(|s| validate_parse::<Scheme>(&s))
                .help("Color scheme: default, fixed-hue, linear, monochrome or spline"),
        )
        .arg(
            Arg::with_name(HUE)
                .long(HUE)
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        0.0f64,
                        1.0,
                        "Could not parse hue",
                        "Hue must be between 0 and 1",
                    )
                })
                .help("Hue used by the fixed-hue scheme"),
        )
        .arg(
            Arg::with_name(INVERT)
                .long(INVERT)
                .takes_value(true)
                .validator(|s| parse_invert(&s).map(|_| ()))
                .help("Channels to invert, e.g. r,b or all"),
        )
        .arg(
            Arg::with_name(GREYSCALE)
                .long(GREYSCALE)
                .help("Collapse colors to grey"),
        )
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .help("Log job progress"),
        )
        .subcommand(
            SubCommand::with_name("view")
                .about("Render the square viewport to an image file")
                .arg(
                    Arg::with_name(OUTPUT)
                        .long(OUTPUT)
                        .short("o")
                        .takes_value(true)
                        .default_value("viewport.png")
                        .help("Output file; the extension picks the format"),
                )
                .arg(
                    Arg::with_name(SIZE)
                        .long(SIZE)
                        .takes_value(true)
                        .default_value("800")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1usize,
                                MAX_VIEWPORT_SIZE,
                                "Could not parse viewport size",
                                &format!("Viewport size must be between 1 and {}", MAX_VIEWPORT_SIZE),
                            )
                        })
                        .help("Side of the viewport in pixels"),
                ),
        )
        .subcommand(
            SubCommand::with_name("render")
                .about("Render a large image in panels and stitch it into render.bmp")
                .arg(
                    Arg::with_name(WIDTH)
                        .long(WIDTH)
                        .short("w")
                        .takes_value(true)
                        .default_value("4000")
                        .validator(|s| {
                            validate_range(
                                &s,
                                MIN_RENDER_WIDTH,
                                MAX_RENDER_WIDTH,
                                "Could not parse width",
                                &format!(
                                    "Width must be between {} and {}",
                                    MIN_RENDER_WIDTH, MAX_RENDER_WIDTH
                                ),
                            )
                        })
                        .help("Width of the final image in pixels"),
                )
                .arg(
                    Arg::with_name(CAPACITY)
                        .long(CAPACITY)
                        .takes_value(true)
                        .validator(|s| {
                            validate_range(
                                &s,
                                4usize,
                                usize::max_value(),
                                "Could not parse panel capacity",
                                "Panel capacity must be at least 4 pixels",
                            )
                        })
                        .help("Pixels the working buffer may hold"),
                )
                .arg(
                    Arg::with_name(OUTPUT_DIR)
                        .long(OUTPUT_DIR)
                        .takes_value(true)
                        .default_value(".")
                        .help("Directory for panel files and render.bmp"),
                ),
        )
        .subcommand(
            SubCommand::with_name("palette")
                .about("Write the active palette as a bitmap strip")
                .arg(
                    Arg::with_name(OUTPUT)
                        .long(OUTPUT)
                        .short("o")
                        .takes_value(true)
                        .default_value("palette.bmp")
                        .help("Output file"),
                )
                .arg(
                    Arg::with_name(HEIGHT)
                        .long(HEIGHT)
                        .takes_value(true)
                        .default_value("32")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1usize,
                                4096,
                                "Could not parse height",
                                "Height must be between 1 and 4096",
                            )
                        })
                        .help("Rows in the strip"),
                ),
        )
        .get_matches()
}

// clap has run the validators by the time these are called.
fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Option<T> {
    matches.value_of(name).and_then(|s| T::from_str(s).ok())
}

fn base_config(matches: &ArgMatches) -> Config {
    let mut config = Config::default();
    config.threads = value(matches, THREADS).unwrap_or_else(|| num_cpus::get().max(1).min(MAX_THREADS));
    if let Some(dwell) = value(matches, DWELL) {
        config.dwell = dwell;
    }
    config
}

fn shader_settings(matches: &ArgMatches) -> ShaderSettings {
    let mut settings = ShaderSettings {
        scheme: value(matches, SCHEME).unwrap_or_default(),
        greyscale: matches.is_present(GREYSCALE),
        ..ShaderSettings::default()
    };
    if let Some(hue) = value::<f64>(matches, HUE) {
        settings.fixed_hue = hue;
    }
    if let Some(Ok((r, g, b))) = matches.value_of(INVERT).map(parse_invert) {
        settings.invert_r = r;
        settings.invert_g = g;
        settings.invert_b = b;
    }
    settings
}

fn request(matches: &ArgMatches, config: &Config) -> Result<RenderRequest, RenderError> {
    let fractal: Fractal = value(matches, FRACTAL).unwrap_or_default();
    let home = fractal.home();
    let center = matches
        .value_of(CENTER)
        .and_then(parse_complex)
        .unwrap_or(home.center);
    let span = matches
        .value_of(SPAN)
        .and_then(parse_complex)
        .unwrap_or(home.span);
    Ok(RenderRequest {
        coord: Coordinate::new(center, span).map_err(RenderError::BadDimensions)?,
        oversample: value(matches, OVERSAMPLE).unwrap_or_default(),
        ..config.home_request(fractal)
    })
}

fn report(event: &Event) {
    match event {
        Event::Progress(Progress::Percent(p)) => {
            eprint!("\r{:3}%", p);
            let _ = std::io::stderr().flush();
        }
        Event::Progress(Progress::Stitching) => eprintln!("\rStitching panels"),
        Event::Progress(Progress::Aborting) => eprintln!("\rAborting"),
        Event::Progress(Progress::Aborted) => eprintln!("\rAborted"),
        Event::Progress(Progress::Finished) => eprintln!("\rFinished"),
        Event::Log(Severity::Info, message) => eprintln!("\r{}", message),
        Event::Log(Severity::Warning, message) => eprintln!("\rWarning: {}", message),
        Event::Log(Severity::Error, message) => eprintln!("\rError: {}", message),
        Event::Completion(_) => {}
    }
}

fn run(session: &Session, request: RenderRequest) -> Result<(), String> {
    session.start_render(request).map_err(|e| e.to_string())?;
    match session.wait_with(report) {
        Outcome::Finished | Outcome::Reshaded => Ok(()),
        Outcome::Aborted => Err("Render aborted".to_string()),
        Outcome::Failed(message) => Err(message),
    }
}

fn view(matches: &ArgMatches, sub: &ArgMatches) -> Result<(), String> {
    let size: usize = value(sub, SIZE).unwrap_or(800);
    let config = Config {
        viewport_size: size,
        ..base_config(matches)
    };
    let request = request(matches, &config).map_err(|e| e.to_string())?;
    let session = Session::new(config, shader_settings(matches)).map_err(|e| e.to_string())?;
    run(&session, request)?;

    let rgb: Vec<u8> = session
        .viewport()
        .iter()
        .flat_map(|p| vec![p.r, p.g, p.b])
        .collect();
    let output = sub.value_of(OUTPUT).unwrap_or("viewport.png");
    image::save_buffer(output, &rgb, size as u32, size as u32, ColorType::Rgb8)
        .map_err(|e| format!("Could not write {}: {}", output, e))?;
    eprintln!("Wrote {}", output);
    Ok(())
}

fn render(matches: &ArgMatches, sub: &ArgMatches) -> Result<(), String> {
    let width: usize = value(sub, WIDTH).unwrap_or(4000);
    let mut config = base_config(matches).with_output_dir(sub.value_of(OUTPUT_DIR).unwrap_or("."));
    if let Some(capacity) = value(sub, CAPACITY) {
        config.panel_capacity = capacity;
    }
    let request = request(matches, &config).map_err(|e| e.to_string())?.full(width);
    eprintln!(
        "Rendering a {}x{} image ({})",
        width,
        rows_for(width, &request.coord),
        megapixels(rows_for(width, &request.coord), width)
    );

    let output = config.render_path();
    let session = Session::new(config, shader_settings(matches)).map_err(|e| e.to_string())?;
    run(&session, request)?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

fn palette(matches: &ArgMatches, sub: &ArgMatches) -> Result<(), String> {
    let shader = Shader::new(shader_settings(matches));
    let height: usize = value(sub, HEIGHT).unwrap_or(32);
    let output = sub.value_of(OUTPUT).unwrap_or("palette.bmp");
    match shader.palette_strip(height) {
        None => Err(format!(
            "The {} scheme has no palette table",
            shader.settings().scheme
        )),
        Some((width, pixels)) => {
            bitmap::write_file(output, &pixels, width, height).map_err(|e| e.to_string())?;
            eprintln!("Wrote {}", output);
            Ok(())
        }
    }
}

fn main() {
    let matches = args();
    let level = if matches.is_present(VERBOSE) {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match matches.subcommand() {
        ("view", Some(sub)) => view(&matches, sub),
        ("render", Some(sub)) => render(&matches, sub),
        ("palette", Some(sub)) => palette(&matches, sub),
        _ => Err("Unknown command".to_string()),
    };
    if let Err(e) = result {
        eprintln!("Render failure: {}", e);
        process::exit(1);
    }
}
