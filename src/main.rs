use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use styled_qr::service::{GenerateResponse, QrService};
use styled_qr::style::GenerateRequest;
use styled_qr::{config, output};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once; called a single time at startup.
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "styled-qr")]
#[command(about = "Render styled QR codes as PNG or SVG")]
#[command(long_about = "\
Render styled QR codes as PNG or SVG

Requests are JSON objects using the generator's field names:

  {
    \"qrCategory\": \"url\",
    \"text\": \"https://example.com\",
    \"size\": 500,                     # 200, 500 or 1000
    \"qrFormat\": \"png\",             # png or svg
    \"colorDark\": \"#000000\",
    \"backgroundColor\": \"#ffffff\",
    \"gradient\": true,
    \"grdType\": \"radial\",           # linear, upDown, diagonal1, diagonal2, radial
    \"color01\": \"#ff0000\",
    \"color02\": \"#0000ff\",
    \"eye_color\": true,
    \"eye_color01\": \"#111111\",
    \"eye_color02\": \"#222222\",
    \"eye_outer\": \"eyeOuter2\",
    \"eye_inner\": \"eyeInner1\",
    \"logo\": \"https://example.com/logo.png\",
    \"frame\": \"frame2\",
    \"frameColor\": \"#000000\",
    \"frameText\": \"SCAN ME\"
  }

Rendered files, the cache manifest and the generation history live in the
output directory. Identical requests are served from the cache.

Run 'styled-qr gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Service configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Output directory (overrides the config file)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one QR code from a JSON request (`-` reads stdin)
    Generate {
        request: PathBuf,
        /// Client address to rate limit against
        #[arg(long)]
        client: Option<IpAddr>,
        /// Also copy the image to this file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the JSON boundary response instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Generate every request in a JSON array
    Bulk {
        requests: PathBuf,
        /// Client address to rate limit against
        #[arg(long)]
        client: Option<IpAddr>,
    },
    /// Validate a request without rendering it
    Check { request: PathBuf },
    /// List recent generations, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Generate {
            request,
            client,
            out,
            json,
        } => {
            let service = open_service(&cli)?;
            let request: GenerateRequest = serde_json::from_str(&read_input(request)?)?;
            let result = service.generate(&request, *client);
            if *json {
                let response = GenerateResponse::from_result(&result);
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::print_result(&result);
            }
            service.persist_cache()?;
            let generated = result?;
            if let Some(out) = out {
                std::fs::write(out, &generated.bytes)?;
            }
        }
        Command::Bulk { requests, client } => {
            let service = open_service(&cli)?;
            let requests: Vec<GenerateRequest> = serde_json::from_str(&read_input(requests)?)?;
            let results = service.generate_bulk(&requests, *client)?;
            output::print_bulk(&results);
            service.persist_cache()?;
            println!("{}", output::format_cache_stats(&service.cache_stats()));
        }
        Command::Check { request } => {
            let service = open_service(&cli)?;
            let request: GenerateRequest = serde_json::from_str(&read_input(request)?)?;
            match service.check(&request) {
                Ok(checked) => output::print_check(&checked),
                Err(failure) => {
                    output::print_result(&Err(failure.clone()));
                    return Err(failure.into());
                }
            }
        }
        Command::History { limit } => {
            let service = open_service(&cli)?;
            let records = service.history(*limit)?;
            output::print_history(&records);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config, apply CLI overrides, size the worker pool and build the
/// service.
fn open_service(cli: &Cli) -> Result<QrService, Box<dyn std::error::Error>> {
    let mut service_config = config::load_config(&cli.config)?;
    if let Some(dir) = &cli.output_dir {
        service_config.output_dir = dir.clone();
    }
    init_thread_pool(&service_config.processing);
    Ok(QrService::new(service_config)?)
}

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
