use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;

use ollama_chat::server::config_routes;
use ollama_chat::util::{cors_config_from_env, env_bind_addr, init_tracing, AppState};

/// Browser chat front end for a local Ollama server.
#[derive(Debug, Parser)]
#[command(name = "ollama-chat", version, about)]
struct Args {
    /// Address to listen on (defaults to BIND_ADDR or 0.0.0.0:5000)
    #[arg(long)]
    bind: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    /// Model to chat with
    #[arg(long, env = "OLLAMA_CHAT_MODEL")]
    model: Option<String>,

    /// SQLite database URL for conversation history
    #[arg(long, env = "OLLAMA_CHAT_DATABASE_URL")]
    database_url: Option<String>,
}

impl Args {
    /// Flags win over the environment; modules read their settings from env.
    fn export(&self) {
        let overrides = [
            ("OLLAMA_HOST", &self.ollama_host),
            ("OLLAMA_CHAT_MODEL", &self.model),
            ("OLLAMA_CHAT_DATABASE_URL", &self.database_url),
        ];
        for (key, value) in overrides {
            if let Some(v) = value {
                std::env::set_var(key, v);
            }
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // --help / --version exit here, before any .env loading or logging
    let args = Args::parse();
    init_tracing();
    args.export();

    let bind = args.bind.clone().unwrap_or_else(env_bind_addr);
    let state = web::Data::new(AppState::from_env().await?);

    tracing::info!("ollama-chat listening on http://{}", bind);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors_config_from_env())
            .app_data(state.clone())
            .configure(config_routes)
    })
    .bind(&bind)?
    .run()
    .await?;

    Ok(())
}
