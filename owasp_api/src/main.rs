use clap::Parser;

use owasp_api::{config::Settings, logging, server, Lesson};

/// Run one OWASP workshop server.
#[derive(Debug, Parser)]
#[command(name = "owasp-workshop", version)]
struct Cli {
    /// Which server to start
    #[arg(value_enum)]
    lesson: Lesson,

    /// Overrides the lesson's default port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    if let Err(e) = server::run(cli.lesson, cli.port, &settings).await {
        tracing::error!(error = %e, "server stopped");
        return Err(e);
    }

    Ok(())
}
