use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plant-advisor")]
#[command(about = "撮影場所の写真と座標から育てやすい植物を推薦するAI解析ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTPサーバーを起動（POST /answer, GET /health）
    Serve {
        /// 待ち受けアドレス（デフォルト: 設定の bind_addr）
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// 写真1枚を解析してJSONを出力
    Analyze {
        /// 写真ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 緯度
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// 経度
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// 高度
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        alt: f64,

        /// 出力JSONファイル（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Gemini APIへの接続確認
    Check,

    /// 設定を表示/変更
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
