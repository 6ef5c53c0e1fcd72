mod args;

use args::Args;
use screen_auto_run::game_automation::{load_directory, Template};
use screen_auto_run::template_matching::{self, Region};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = Args::parse() else {
        return;
    };
    if let Err(e) = run(&args) {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

/// Re-run the production matcher over a saved frame so template tolerances
/// can be tuned without a live capture session.
fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let frame = image::open(&args.frame)?.to_rgba8();
    println!(
        "📸 Frame {} ({}x{})",
        args.frame.display(),
        frame.width(),
        frame.height()
    );

    let templates = load_directory(&args.templates)?;
    if templates.is_empty() {
        return Err(format!("no template PNGs in {}", args.templates.display()).into());
    }

    let region = args.region.map(|(x, y, w, h)| Region::new(x, y, w, h));
    if let Some(r) = region {
        println!("🔍 Scanning region {},{} {}x{}", r.x, r.y, r.width, r.height);
    }

    for template in &templates {
        println!(
            "\n=== {} ({}x{}, priority {}) ===",
            template.name,
            template.width(),
            template.height(),
            template.priority
        );

        for &tolerance in &args.tolerances {
            let matches = match region {
                Some(r) => {
                    template_matching::find_all_in_region(&frame, &template.image, r, tolerance)
                }
                None => template_matching::find_all(&frame, &template.image, tolerance),
            };

            print!("  tolerance {:.0}: {} match(es)", tolerance, matches.len());
            if !matches.is_empty() {
                let positions: Vec<String> = matches
                    .iter()
                    .take(8)
                    .map(|m| format!("({}, {})", m.x, m.y))
                    .collect();
                print!(" -> {}", positions.join(" "));
                if matches.len() > 8 {
                    print!(" ...");
                }
            }
            println!();
        }

        if args.cross_check {
            cross_check(&frame, template);
        }
    }

    Ok(())
}

/// Report imageproc's best normalized cross-correlation for the template,
/// as a second opinion when the tolerance matcher disagrees with the eye.
/// Grayscale NCC knows nothing about wildcard pixels, so transparent
/// templates score lower here by design of the metric.
fn cross_check(frame: &image::RgbaImage, template: &Template) {
    use imageproc::template_matching::{match_template, MatchTemplateMethod};

    if template.width() > frame.width() || template.height() > frame.height() {
        println!("  ncc cross-check: template larger than frame, skipped");
        return;
    }

    let frame_gray = image::DynamicImage::ImageRgba8(frame.clone()).to_luma8();
    let template_gray = image::DynamicImage::ImageRgba8(template.image.clone()).to_luma8();

    let result = match_template(
        &frame_gray,
        &template_gray,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );

    // CrossCorrelationNormalized scores are in [-1, 1], 1.0 = perfect.
    let mut best = f32::MIN;
    let mut best_pos = (0u32, 0u32);
    for (x, y, pixel) in result.enumerate_pixels() {
        if pixel[0] > best {
            best = pixel[0];
            best_pos = (x, y);
        }
    }
    println!(
        "  ncc cross-check: best {:.4} at ({}, {})",
        best, best_pos.0, best_pos.1
    );
}
