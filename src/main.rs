mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use tc_core::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tidecast=trace,tc_server=trace,tc_av=debug,tc_db=debug,tower_http=debug".to_string()
        } else {
            "tidecast=info,tc_server=debug,tc_av=info,tc_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config } => validate_config(config.or(cli.config).as_deref()),
        Commands::Version => {
            println!("tidecast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting tidecast on {}:{}",
        config.server.host,
        config.server.port
    );

    tc_server::start(config).await?;
    Ok(())
}

fn probe_file(file: &std::path::Path, json: bool) -> Result<()> {
    use tc_av::Prober;

    let config = Config::default();
    let tools = tc_av::ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require("ffprobe")?;
    let prober = tc_av::FfprobeProber::new(ffprobe.path.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let profile = rt.block_on(prober.probe(file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Duration: {:.1}s", profile.duration_seconds);
        for (n, v) in profile.video.iter().enumerate() {
            println!(
                "Video #{n}: {}x{} @ {}",
                v.width,
                v.height,
                v.frame_rate
                    .map(|f| format!("{f:.3} fps"))
                    .unwrap_or_else(|| "unknown fps".into())
            );
        }
        for (n, a) in profile.audio.iter().enumerate() {
            println!(
                "Audio #{n}: {} [{}]{}",
                a.codec.as_deref().unwrap_or("unknown"),
                a.language.as_deref().unwrap_or("und"),
                if a.default { " (default)" } else { "" }
            );
        }
        for (n, s) in profile.subtitles.iter().enumerate() {
            println!(
                "Subtitle #{n}: {} [{}]",
                s.codec.as_deref().unwrap_or("unknown"),
                s.language.as_deref().unwrap_or("und")
            );
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let tools = tc_av::ToolRegistry::discover(&config.tools);

    for info in tools.check_all() {
        if info.available {
            println!(
                "✓ {} — {} ({})",
                info.name,
                info.path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            println!("✗ {} — not found", info.name);
        }
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = path else {
        anyhow::bail!("no config file specified");
    };

    let contents = std::fs::read_to_string(path)?;
    let config = Config::from_json(&contents).map_err(|e| anyhow::anyhow!("{e}"))?;

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Config OK");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }

    Ok(())
}
