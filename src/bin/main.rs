#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postboard=info,actix_web=info".into()),
        )
        .init();

    postboard::server::run(postboard::config::Settings::from_env()).await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
