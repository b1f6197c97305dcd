use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use blogcast::cli::{Cli, Commands};
use blogcast::config::Config;
use blogcast::gateway::{JobStatusApi, JobStatusGateway};
use blogcast::{output, server, wizard, ApiClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a .env file in the working directory or a parent
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    // The file named by --config may not exist yet
    if let Commands::Config { init: true, .. } = cli.command {
        let path = Config::default().save(cli.config.as_deref())?;
        println!("Configuration written to: {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            server::serve(&config).await?;
        }
        Commands::Generate(args) => {
            tracing::info!("Starting generation workflow");

            match wizard::run_generate(&config, &args, cli.quiet).await? {
                Some(report) => {
                    output::print_to_console(&report, &args.format)?;
                    if !report.succeeded() {
                        std::process::exit(1);
                    }
                }
                None => println!("Cancelled; no video was generated."),
            }
        }
        Commands::Status {
            video_id,
            server,
            format,
        } => {
            let report = match server {
                Some(server) => ApiClient::new(&server)?.job_status(&video_id).await?,
                None => JobStatusGateway::new(&config.video).job_status(&video_id).await?,
            };
            println!("{}", output::format_status(&report, &format)?);
        }
        Commands::Config { show, .. } => {
            if show {
                config.display();
            } else {
                match Config::config_path() {
                    Some(path) => println!("Config file: {}", path.display()),
                    None => println!("Could not determine config directory"),
                }
                println!("Use --show to print the effective configuration or --init to write defaults.");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "blogcast=debug,tower_http=debug"
    } else {
        "blogcast=info,tower_http=info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so `--format json` output stays clean
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
