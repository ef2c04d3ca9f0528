use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::Parser;
use plant_advisor::{cli, config, invoker, pipeline, server};
use plant_advisor_common::{AnalysisResponse, LocationCoordinate};
use cli::{Cli, Commands};
use config::{Config, Provider};
use pipeline::{AnalyzeRequest, Analyzer};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            println!("🌱 plant-advisor - サーバー起動 ({})\n", config.bind_addr);
            server::serve(&config).await?;
        }

        Commands::Analyze { image, lat, lng, alt, output } => {
            println!("🌱 plant-advisor - 写真解析\n");

            // 1. 画像読み込み
            println!("[1/2] 写真を読み込み中...");
            let bytes = std::fs::read(&image)
                .with_context(|| format!("写真を読み込めません: {}", image.display()))?;
            println!("✔ {} ({} bytes)\n", image.display(), bytes.len());

            // 2. AI解析
            println!("[2/2] AI解析中... (Ctrl-Cで中断)");
            let analyzer = Analyzer::new(invoker::create_invoker(&config)?, config.timeout());
            let request = AnalyzeRequest::new(STANDARD.encode(&bytes), LocationCoordinate::new(lat, lng, alt));
            let cancel = async {
                let _ = tokio::signal::ctrl_c().await;
            };

            let (response, failure) = match analyzer.analyze_until(&request, cancel).await {
                Ok(result) => (AnalysisResponse::success(result), None),
                Err(e) => (e.to_response(), Some(e)),
            };

            let json = serde_json::to_string_pretty(&response)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("✔ 結果を保存: {}", path.display());
                }
                None => println!("{}", json),
            }

            if let Some(e) = failure {
                anyhow::bail!("解析に失敗しました (HTTP {}): {}", e.status_code(), e.message());
            }
            println!("\n✅ 解析完了 ({}件の植物)", response.result.plants.len());
        }

        Commands::Check => {
            println!("🔌 plant-advisor - 接続確認\n");
            match config.provider {
                Provider::Fake => println!("✔ fakeプロバイダ（ネットワーク不要）"),
                Provider::Gemini => {
                    let client = invoker::GeminiClient::from_config(&config)?;
                    let models = client
                        .validate_connection()
                        .await
                        .context("Gemini APIに接続できません")?;
                    println!("✔ 接続OK（利用可能なモデル: {}件）", models);
                    println!("  使用モデル: {}", config.model);
                }
            }
        }

        Commands::Config { set_api_key, show } => {
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  プロバイダ: {:?}", config.provider);
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  待ち受けアドレス: {}", config.bind_addr);
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}
