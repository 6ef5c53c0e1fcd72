use std::env;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Args {
    /// Saved frame to scan.
    pub frame: PathBuf,
    /// Directory of template PNGs to look for.
    pub templates: PathBuf,
    /// Tolerances to try, in order.
    pub tolerances: Vec<f32>,
    /// Optional x,y,w,h sub-region to restrict the scan to.
    pub region: Option<(i32, i32, u32, u32)>,
    /// Also report imageproc's best NCC score per template.
    pub cross_check: bool,
}

impl Args {
    pub fn parse() -> Option<Self> {
        let args: Vec<String> = env::args().collect();

        let mut frame: Option<PathBuf> = None;
        let mut templates: Option<PathBuf> = None;
        let mut tolerances: Vec<f32> = Vec::new();
        let mut region: Option<(i32, i32, u32, u32)> = None;
        let mut cross_check = false;

        for arg in args.iter().skip(1) {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Screen Auto Run v{} (build {})",
                    env!("APP_VERSION_DISPLAY"),
                    env!("APP_BUILD_YEAR")
                );
                return None;
            } else if arg == "--cross-check" {
                cross_check = true;
            } else if let Some(val) = arg.strip_prefix("--match=") {
                frame = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--templates=") {
                templates = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--tolerance=") {
                match val.parse::<f32>() {
                    Ok(t) => tolerances.push(t),
                    Err(_) => {
                        eprintln!("❌ Invalid tolerance value: {}", val);
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--region=") {
                match parse_region(val) {
                    Some(r) => region = Some(r),
                    None => {
                        eprintln!("❌ Invalid region '{}', expected x,y,w,h", val);
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        let (Some(frame), Some(templates)) = (frame, templates) else {
            print_help();
            return None;
        };

        if tolerances.is_empty() {
            tolerances = vec![60.0, 80.0];
        }

        Some(Args {
            frame,
            templates,
            tolerances,
            region,
            cross_check,
        })
    }
}

fn parse_region(val: &str) -> Option<(i32, i32, u32, u32)> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    Some((
        parts[0].trim().parse().ok()?,
        parts[1].trim().parse().ok()?,
        parts[2].trim().parse().ok()?,
        parts[3].trim().parse().ok()?,
    ))
}

fn print_help() {
    println!("🔍 Screen Auto Run — offline match debugger");
    println!();
    println!("USAGE:");
    println!("    screen-auto-run --match=<frame.png> --templates=<dir> [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --match=<file>      Saved frame (screenshot) to scan");
    println!("    --templates=<dir>   Directory of template PNGs");
    println!("    --tolerance=<n>     RGB tolerance to try; repeatable (default: 60 and 80)");
    println!("    --region=x,y,w,h    Restrict the scan to a sub-region");
    println!("    --cross-check       Also report the best NCC score per template");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    screen-auto-run --match=debug_entry_screen.png --templates=assets/targets/entry");
    println!("    screen-auto-run --match=frame.png --templates=entry --tolerance=45 --region=0,0,800,600");
}
